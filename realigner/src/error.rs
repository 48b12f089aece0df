//! Errors raised while building the indel catalog or realigning reads.
//!
//! Expected negative outcomes (no nearby indels, a combination that does not fit the read)
//! are not errors; they are `None` or an empty vector.

#[derive(Debug, thiserror::Error)]
pub enum RealignError {
    #[error("malformed co-occurrence group {group:?}: {reason}")]
    MalformedGroup { group: Vec<String>, reason: String },
    #[error("invalid candidate indel {key}: {reason}")]
    InvalidIndel { key: String, reason: String },
    #[error("malformed alignment record {name}: {reason}")]
    MalformedRecord { name: String, reason: String },
    #[error("invariant violated while realigning {name}: {reason}")]
    Invariant { name: String, reason: String },
}

impl RealignError {
    /// Fatal errors abort the whole chromosome. Only a malformed record
    /// is confined to the read it came from.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, RealignError::MalformedRecord { .. })
    }
}

impl From<RealignError> for std::io::Error {
    fn from(why: RealignError) -> Self {
        std::io::Error::new(std::io::ErrorKind::InvalidData, why)
    }
}

pub type Result<T> = std::result::Result<T, RealignError>;
