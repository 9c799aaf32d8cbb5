use std::fmt;
use std::path::PathBuf;

use crate::model::IssueId;

/// Machine-readable error codes surfaced to the CLI and to UI notices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    IssueNotFound,
    InvalidLocation,
    InvalidField,
    InvalidEnumValue,
    CorruptStore,
    StoreUnavailable,
    PhotoEncodingFailed,
    StoreWriteFailed,
    LockContention,
    SubmissionInFlight,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::IssueNotFound => "E2001",
            Self::InvalidLocation => "E2002",
            Self::InvalidField => "E2003",
            Self::InvalidEnumValue => "E2004",
            Self::CorruptStore => "E3001",
            Self::StoreUnavailable => "E4001",
            Self::PhotoEncodingFailed => "E4002",
            Self::StoreWriteFailed => "E5001",
            Self::LockContention => "E5002",
            Self::SubmissionInFlight => "E5003",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Project not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::IssueNotFound => "Issue not found",
            Self::InvalidLocation => "Invalid location",
            Self::InvalidField => "Invalid report field",
            Self::InvalidEnumValue => "Invalid status value",
            Self::CorruptStore => "Stored issue collection is corrupt",
            Self::StoreUnavailable => "Issue store unavailable",
            Self::PhotoEncodingFailed => "Photo could not be encoded",
            Self::StoreWriteFailed => "Issue store write failed",
            Self::LockContention => "Lock contention",
            Self::SubmissionInFlight => "A submission is already in progress",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint shown next to the message.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `rw init` to initialize this directory."),
            Self::ConfigParseError => Some("Fix syntax in .roadwatch/config.toml and retry."),
            Self::IssueNotFound => Some("The issue may have been removed; refresh and retry."),
            Self::InvalidLocation => {
                Some("Enter coordinates as \"lat, lng\" with lat in [-90,90] and lng in [-180,180].")
            }
            Self::InvalidField => Some("Fill in the required fields and resubmit."),
            Self::InvalidEnumValue => Some("Use one of: Received, In Progress, Resolved."),
            Self::CorruptStore => Some("Inspect or remove the stored collection file."),
            Self::StoreUnavailable => Some("Check connectivity and retry."),
            Self::PhotoEncodingFailed => Some("Choose a different photo or submit without one."),
            Self::StoreWriteFailed => Some("Check disk space and write permissions."),
            Self::LockContention => Some("Retry after the other `rw` process releases its lock."),
            Self::SubmissionInFlight => Some("Wait for the current submission to finish."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Bad or missing user input. Raised before any persistence attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {field} '{value}': {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub value: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: &'static str, value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self.field {
            "location" => ErrorCode::InvalidLocation,
            "status" => ErrorCode::InvalidEnumValue,
            _ => ErrorCode::InvalidField,
        }
    }
}

/// Failure turning a user-selected photo into a storable payload.
#[derive(Debug, thiserror::Error)]
pub enum EncodingError {
    #[error("photo {path} is unreadable: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("photo is {bytes} bytes, limit is {max}")]
    TooLarge { bytes: u64, max: u64 },
    #[error("photo is empty")]
    Empty,
}

impl EncodingError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        ErrorCode::PhotoEncodingFailed
    }
}

/// Errors returned by every [`IssueStore`](crate::store::IssueStore) implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("issue {id} not found")]
    NotFound { id: IssueId },

    /// The remote store could not be reached. Safe to retry.
    #[error("issue store unavailable: {reason}")]
    Transient { reason: String },

    #[error("stored collection under '{key}' is corrupt: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Persist(#[from] crate::store::kv::KvError),
}

impl StoreError {
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation(err) => err.code(),
            Self::NotFound { .. } => ErrorCode::IssueNotFound,
            Self::Transient { .. } => ErrorCode::StoreUnavailable,
            Self::Corrupt { .. } => ErrorCode::CorruptStore,
            Self::Persist(err) => err.code(),
        }
    }

    /// Whether the caller may retry the same operation unchanged.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::{ErrorCode, StoreError, ValidationError};
    use crate::model::IssueId;
    use std::collections::HashSet;

    #[test]
    fn all_codes_are_unique() {
        let all = [
            ErrorCode::NotInitialized,
            ErrorCode::ConfigParseError,
            ErrorCode::IssueNotFound,
            ErrorCode::InvalidLocation,
            ErrorCode::InvalidField,
            ErrorCode::InvalidEnumValue,
            ErrorCode::CorruptStore,
            ErrorCode::StoreUnavailable,
            ErrorCode::PhotoEncodingFailed,
            ErrorCode::StoreWriteFailed,
            ErrorCode::LockContention,
            ErrorCode::SubmissionInFlight,
            ErrorCode::InternalUnexpected,
        ];

        let mut seen = HashSet::new();
        for code in all {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::StoreUnavailable.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('E'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn validation_error_code_follows_field() {
        let loc = ValidationError::new("location", "x", "bad");
        assert_eq!(loc.code(), ErrorCode::InvalidLocation);
        let ty = ValidationError::new("type", "", "must not be empty");
        assert_eq!(ty.code(), ErrorCode::InvalidField);
        assert_eq!(ty.to_string(), "invalid type '': must not be empty");
    }

    #[test]
    fn only_transient_errors_are_retryable() {
        let transient = StoreError::Transient {
            reason: "offline".into(),
        };
        assert!(transient.is_retryable());
        assert_eq!(transient.code(), ErrorCode::StoreUnavailable);

        let missing = StoreError::NotFound {
            id: IssueId::new_unchecked("r_1_abc"),
        };
        assert!(!missing.is_retryable());
        assert_eq!(missing.code(), ErrorCode::IssueNotFound);
    }
}
