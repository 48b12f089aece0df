pub mod commands;
pub mod pipeline;
