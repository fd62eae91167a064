use thiserror::Error;

/// Rejected spellings of the closed vocabularies carried by every unit.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("unknown schema version `{0}`")]
    UnknownVersion(String),
    #[error("unknown unit level `{0}`")]
    UnknownLevel(String),
}
