//! Query pipeline error types.
//!
//! Every error names the offending dataset, field, or value so a caller can
//! report it verbatim. Client errors are never logged as faults; storage
//! faults and timeouts are logged where they occur.

use thiserror::Error;

use crate::storage::StorageError;

/// Error kinds exposed to callers, independent of message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UnknownDataset,
    UnknownField,
    InvalidValue,
    InvalidRange,
    InvalidSort,
    PageSize,
    CursorDecode,
    Storage,
    Timeout,
}

impl ErrorKind {
    /// Stable identifier used in serialized error payloads.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::UnknownDataset => "unknown_dataset",
            ErrorKind::UnknownField => "unknown_field",
            ErrorKind::InvalidValue => "invalid_value",
            ErrorKind::InvalidRange => "invalid_range",
            ErrorKind::InvalidSort => "invalid_sort",
            ErrorKind::PageSize => "page_size",
            ErrorKind::CursorDecode => "cursor_decode",
            ErrorKind::Storage => "storage",
            ErrorKind::Timeout => "timeout",
        }
    }
}

/// Errors raised while validating, composing, or executing a query.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("unknown dataset '{dataset}'")]
    UnknownDataset { dataset: String },

    #[error("dataset '{dataset}': unknown field '{field}'")]
    UnknownField { dataset: String, field: String },

    #[error("field '{field}': '{value}' is not {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },

    #[error("invalid range: {min_field}={min} is greater than {max_field}={max}")]
    InvalidRange {
        min_field: String,
        max_field: String,
        min: String,
        max: String,
    },

    #[error("invalid sort on '{field}': {reason}")]
    InvalidSort { field: String, reason: String },

    #[error("per_page {requested} is out of range (1..={max})")]
    PageSize { requested: u32, max: u32 },

    #[error("invalid cursor: {reason}")]
    CursorDecode { reason: String },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("dataset '{dataset}': query exceeded {timeout_ms}ms deadline")]
    Timeout { dataset: String, timeout_ms: u64 },
}

impl QueryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            QueryError::UnknownDataset { .. } => ErrorKind::UnknownDataset,
            QueryError::UnknownField { .. } => ErrorKind::UnknownField,
            QueryError::InvalidValue { .. } => ErrorKind::InvalidValue,
            QueryError::InvalidRange { .. } => ErrorKind::InvalidRange,
            QueryError::InvalidSort { .. } => ErrorKind::InvalidSort,
            QueryError::PageSize { .. } => ErrorKind::PageSize,
            QueryError::CursorDecode { .. } => ErrorKind::CursorDecode,
            QueryError::Storage(_) => ErrorKind::Storage,
            QueryError::Timeout { .. } => ErrorKind::Timeout,
        }
    }

    /// Caused by the request rather than the system.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, QueryError::Storage(_) | QueryError::Timeout { .. })
    }

    /// The same request may succeed if tried again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, QueryError::Storage(_) | QueryError::Timeout { .. })
    }

    /// HTTP status an outer serving layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::UnknownDataset => 404,
            ErrorKind::Storage => 503,
            ErrorKind::Timeout => 504,
            _ => 400,
        }
    }

    pub(crate) fn cursor(reason: impl Into<String>) -> Self {
        QueryError::CursorDecode {
            reason: reason.into(),
        }
    }

    pub(crate) fn sort(field: impl Into<String>, reason: impl Into<String>) -> Self {
        QueryError::InvalidSort {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Invalid dataset registration. Fatal at startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("dataset '{dataset}' is registered twice")]
    DuplicateDataset { dataset: String },

    #[error("dataset '{dataset}': field '{field}' is declared more than once")]
    DuplicateField { dataset: String, field: String },

    #[error("dataset '{dataset}': column '{column}' is declared more than once")]
    DuplicateColumn { dataset: String, column: String },

    #[error("dataset '{dataset}': {context} references unknown column '{column}'")]
    UnknownColumn {
        dataset: String,
        column: String,
        context: String,
    },

    #[error("dataset '{dataset}': index column '{column}' must be a declared integer column")]
    InvalidIndexColumn { dataset: String, column: String },

    #[error("dataset '{dataset}': field '{field}' needs a {expected} column, '{column}' is not")]
    ColumnKindMismatch {
        dataset: String,
        field: String,
        column: String,
        expected: String,
    },

    #[error("dataset '{dataset}': default sort '{field}' is not sortable in that direction")]
    InvalidDefaultSort { dataset: String, field: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_are_not_retryable() {
        let err = QueryError::InvalidRange {
            min_field: "min_amount".into(),
            max_field: "max_amount".into(),
            min: "100".into(),
            max: "50".into(),
        };
        assert!(err.is_client_error());
        assert!(!err.is_retryable());
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.kind().as_str(), "invalid_range");
        let msg = err.to_string();
        assert!(msg.contains("min_amount=100"));
        assert!(msg.contains("max_amount=50"));
    }

    #[test]
    fn timeout_is_distinct_from_storage() {
        let timeout = QueryError::Timeout {
            dataset: "schedule_b".into(),
            timeout_ms: 20,
        };
        let storage = QueryError::from(StorageError::Unavailable("pool closed".into()));
        assert_ne!(timeout.kind(), storage.kind());
        assert!(timeout.is_retryable());
        assert!(storage.is_retryable());
        assert_eq!(timeout.status_code(), 504);
        assert_eq!(storage.status_code(), 503);
    }

    #[test]
    fn unknown_field_names_dataset_and_field() {
        let err = QueryError::UnknownField {
            dataset: "schedule_b".into(),
            field: "bogus".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("schedule_b"));
        assert!(msg.contains("bogus"));
    }
}
