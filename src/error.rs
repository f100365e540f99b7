use std::fmt;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::validate::ValidationError;

pub type Result<T> = std::result::Result<T, OperationError>;

/// Table privilege an operation needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privilege {
    Select,
    Insert,
    Update,
    Delete,
}

impl Privilege {
    pub const fn as_str(self) -> &'static str {
        match self {
            Privilege::Select => "SELECT",
            Privilege::Insert => "INSERT",
            Privilege::Update => "UPDATE",
            Privilege::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side of a movie's foreign keys was dangling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reference {
    Owner,
    Studio,
    Unknown,
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Owner => f.write_str("owner"),
            Reference::Studio => f.write_str("studio"),
            Reference::Unknown => f.write_str("owner or studio"),
        }
    }
}

/// Storage-detected failure. The transaction it came from has been rolled back.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum WriteError {
    #[error("relation {relation} does not exist")]
    UndefinedRelation { relation: String },
    #[error("{key} already exists")]
    UniqueViolation { key: String },
    #[error("the referenced {reference} does not exist")]
    ForeignKeyViolation { reference: Reference },
    #[error("{field} is required")]
    NotNullViolation { field: String },
    #[error("{field} is outside its allowed bounds")]
    CheckViolation { field: String },
    #[error("{field} exceeds the maximum the storage can hold")]
    NumericOutOfRange { field: String },
    #[error("the row was modified concurrently by another session, retry the operation")]
    SerializationConflict,
    #[error("permission denied: {privilege} on table {table} is required")]
    PermissionDenied { table: String, privilege: Privilege },
    #[error("unclassified database error {code}: {message}")]
    Unclassified { code: String, message: String },
}

impl WriteError {
    pub fn internal_code(&self) -> &'static str {
        match self {
            WriteError::UndefinedRelation { .. } => "UR-00500",
            WriteError::UniqueViolation { .. } => "UV-00409",
            WriteError::ForeignKeyViolation { .. } => "FK-00409",
            WriteError::NotNullViolation { .. } => "NN-00400",
            WriteError::CheckViolation { .. } => "CV-00400",
            WriteError::NumericOutOfRange { .. } => "NR-00400",
            WriteError::SerializationConflict => "SC-00409",
            WriteError::PermissionDenied { .. } => "PD-00403",
            WriteError::Unclassified { .. } => "DE-00500",
        }
    }

    /// Only a serialization conflict leaves the caller's change worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WriteError::SerializationConflict)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Write(#[from] WriteError),
}

impl OperationError {
    pub fn internal_code(&self) -> &'static str {
        match self {
            OperationError::Validation(_) => "VE-00400",
            OperationError::Write(e) => e.internal_code(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            OperationError::Validation(_) => false,
            OperationError::Write(e) => e.is_retryable(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub message: String,
    pub internal_code: String,
    pub retryable: bool,
    pub timestamp: NaiveDateTime,
}

impl From<&OperationError> for ErrorReport {
    fn from(value: &OperationError) -> Self {
        Self {
            message: value.to_string(),
            internal_code: value.internal_code().to_string(),
            retryable: value.is_retryable(),
            timestamp: chrono::Utc::now().naive_utc(),
        }
    }
}
