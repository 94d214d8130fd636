//! Backend API error types.

use thiserror::Error;

/// Error from an EmailSort backend call.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The backend rejected the credentials. Uniform across endpoints: the
    /// caller must clear the session and force re-login.
    #[error("Unauthorized on {endpoint}")]
    Unauthorized { endpoint: String },

    /// Non-401 error response from the backend.
    #[error("API error on {endpoint}: HTTP {status}: {detail}")]
    Api {
        endpoint: String,
        status: u16,
        detail: String,
    },

    /// Transport-level failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ApiError {
    /// Returns true if the backend rejected the credentials.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }
}

/// Result type alias using ApiError.
pub type ApiResult<T> = Result<T, ApiError>;

/// Failure of the sequential unsubscribe loop.
///
/// Items before the failing one are already applied on the backend; `applied`
/// records how many.
#[derive(Error, Debug)]
#[error("Unsubscribe failed after {applied} item(s): {source}")]
pub struct UnsubscribeError {
    /// Number of items successfully processed before the failure.
    pub applied: usize,
    #[source]
    pub source: ApiError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_classification() {
        let err = ApiError::Unauthorized {
            endpoint: "emails".to_string(),
        };
        assert!(err.is_unauthorized());

        let err = ApiError::Api {
            endpoint: "emails".to_string(),
            status: 500,
            detail: "boom".to_string(),
        };
        assert!(!err.is_unauthorized());
    }

    #[test]
    fn test_unsubscribe_error_exposes_progress() {
        let err = UnsubscribeError {
            applied: 2,
            source: ApiError::Unauthorized {
                endpoint: "emails/unsubscribe/m3".to_string(),
            },
        };
        assert_eq!(err.applied, 2);
        assert!(err.source.is_unauthorized());
        assert!(err.to_string().contains("after 2 item(s)"));
    }
}
