//! Error taxonomy for address queries.
//!
//! "Nothing matched" is never an error: it is an empty list or an empty
//! object. A reference that cannot be batch-loaded is handled by omitting the
//! dependent fields, so it has no variant here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// A required filter was absent or blank.
    #[error("Missing parameter: {name}")]
    MissingParameter { name: String },

    /// A filter failed type conversion.
    #[error("Parameter {name} must be {expected}")]
    InvalidInput { name: String, expected: &'static str },

    /// A required lookup key has no known mapping.
    #[error("{0}")]
    NotFound(String),

    /// Deadline exceeded or store unavailable. Safe to retry.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Store error: {0:#}")]
    Store(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn missing(name: &str) -> Self {
        ServiceError::MissingParameter { name: name.to_string() }
    }

    pub fn invalid(name: &str, expected: &'static str) -> Self {
        ServiceError::InvalidInput { name: name.to_string(), expected }
    }

    /// Logical status, independent of transport.
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::MissingParameter { .. } | ServiceError::InvalidInput { .. } => 400,
            ServiceError::NotFound(_) => 404,
            ServiceError::Unavailable(_) => 503,
            ServiceError::Store(_) => 500,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::MissingParameter { .. } => "missing_parameter",
            ServiceError::InvalidInput { .. } => "invalid_input",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::Unavailable(_) => "unavailable",
            ServiceError::Store(_) => "store",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Unavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ServiceError::missing("kommune").status_code(), 400);
        assert_eq!(ServiceError::invalid("vej", "a uuid").status_code(), 400);
        assert_eq!(ServiceError::NotFound("x".into()).status_code(), 404);
        assert_eq!(ServiceError::Unavailable("x".into()).status_code(), 503);
        assert_eq!(ServiceError::from(anyhow::anyhow!("disk")).status_code(), 500);
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            ServiceError::missing("kommune").to_string(),
            "Missing parameter: kommune"
        );
        assert_eq!(
            ServiceError::invalid("kommune", "a number").to_string(),
            "Parameter kommune must be a number"
        );
        assert!(ServiceError::Unavailable("timeout".into()).is_retryable());
        assert!(!ServiceError::missing("vej").is_retryable());
    }
}
