//! Indel-aware realignment of short reads.
//!
//! A chromosome's candidate indels are indexed once into an [IndelCatalog](catalog::IndelCatalog).
//! Each read is then handed to an [Evaluator](evaluator::Evaluator), which looks up nearby indels,
//! tries to place one, two or three of them into the read, and rewrites the alignment when an
//! [AlignmentComparer](comparer::AlignmentComparer) accepts the result.
pub mod catalog;
pub mod chromosome;
pub mod co_occurrence;
pub mod comparer;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod evidence;
pub mod pair_indels;
pub mod position_map;
pub mod reference;
pub mod search;
pub mod summary;
#[macro_use]
extern crate log;

pub use catalog::IndelCatalog;
pub use chromosome::{realign_chromosome, realign_dataset, snowball, ChromosomeOutput, OutcomeTally};
pub use config::RealignConfig;
pub use error::{RealignError, Result};
pub use evaluator::{Evaluation, Evaluator, Outcome};
pub use evidence::EvidenceCounts;
pub use reference::{ReferenceSequence, SnippetSource};
