// 🚨 Error taxonomy - every orchestration failure carries a category
//
// Validation failures are raised before any external call. Upstream failures
// keep the operation name plus the external status/message when one exists.

use thiserror::Error;

pub type BffResult<T> = Result<T, BffError>;

#[derive(Debug, Error)]
pub enum BffError {
    /// No caller credential, or one that cannot be decoded
    #[error("unauthorized")]
    Unauthorized,

    /// Authenticated, but not entitled (ownership mismatch, cross-user payment)
    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed payload: missing id, bad enum value, self-follow
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Request body over the configured upload cap
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    /// External data is missing fields this layer depends on
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("payment not completed (status: {status})")]
    PaymentNotCompleted { status: String },

    #[error("{operation} failed: {message}")]
    UpstreamFailure {
        operation: String,
        status: Option<u16>,
        message: String,
    },

    #[error("resolution failed for {kind}:{name}")]
    ResolutionFailed {
        kind: String,
        name: String,
        #[source]
        source: Box<BffError>,
    },

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl BffError {
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::PayloadTooLarge(message.into())
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    pub fn upstream(
        operation: impl Into<String>,
        status: Option<u16>,
        message: impl Into<String>,
    ) -> Self {
        Self::UpstreamFailure {
            operation: operation.into(),
            status,
            message: message.into(),
        }
    }

    /// Short machine-readable category name, used in response bodies and logs
    pub fn category(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::PayloadTooLarge(_) => "payload_too_large",
            Self::InvalidState(_) => "invalid_state",
            Self::PaymentNotCompleted { .. } => "payment_not_completed",
            Self::UpstreamFailure { .. } => "upstream_failure",
            Self::ResolutionFailed { source, .. } => source.category(),
            Self::Configuration(_) => "configuration",
        }
    }

    /// HTTP status the client-facing layer should answer with
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Unauthorized => 401,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::InvalidArgument(_) => 400,
            Self::PayloadTooLarge(_) => 413,
            Self::InvalidState(_) => 422,
            Self::PaymentNotCompleted { .. } => 402,
            Self::UpstreamFailure { status, .. } => match status {
                Some(code) if (400..600).contains(code) => *code,
                _ => 502,
            },
            Self::ResolutionFailed { source, .. } => source.status_code(),
            Self::Configuration(_) => 500,
        }
    }

    /// Re-label an upstream failure with the orchestration step that issued it.
    /// Non-upstream errors pass through untouched.
    pub fn during(self, operation: &str) -> Self {
        match self {
            Self::UpstreamFailure {
                operation: inner,
                status,
                message,
            } => Self::UpstreamFailure {
                operation: format!("{operation}: {inner}"),
                status,
                message,
            },
            other => other,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_follow_taxonomy() {
        assert_eq!(BffError::Unauthorized.status_code(), 401);
        assert_eq!(BffError::forbidden("x").status_code(), 403);
        assert_eq!(BffError::not_found("x").status_code(), 404);
        assert_eq!(BffError::invalid_argument("x").status_code(), 400);
        assert_eq!(BffError::invalid_state("x").status_code(), 422);
        assert_eq!(BffError::payload_too_large("x").status_code(), 413);
        assert_eq!(BffError::payload_too_large("x").category(), "payload_too_large");
        assert_eq!(
            BffError::PaymentNotCompleted {
                status: "pending".into()
            }
            .status_code(),
            402
        );
    }

    #[test]
    fn test_upstream_keeps_external_status() {
        let err = BffError::upstream("create item", Some(409), "duplicate");
        assert_eq!(err.status_code(), 409);

        let unreachable = BffError::upstream("create item", None, "connection refused");
        assert_eq!(unreachable.status_code(), 502);
    }

    #[test]
    fn test_resolution_failure_names_kind_and_name() {
        let err = BffError::ResolutionFailed {
            kind: "category".into(),
            name: "Mecha".into(),
            source: Box::new(BffError::upstream("find categories", Some(503), "down")),
        };

        assert_eq!(err.to_string(), "resolution failed for category:Mecha");
        assert_eq!(err.status_code(), 503);
        assert_eq!(err.category(), "upstream_failure");
    }

    #[test]
    fn test_during_prefixes_operation() {
        let err = BffError::upstream("PUT items/4", Some(500), "boom").during("toggle like");
        match err {
            BffError::UpstreamFailure { operation, .. } => {
                assert_eq!(operation, "toggle like: PUT items/4");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let untouched = BffError::Unauthorized.during("toggle like");
        assert!(matches!(untouched, BffError::Unauthorized));
    }
}
