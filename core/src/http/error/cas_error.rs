use actix_web::{error, http::StatusCode, HttpResponse, HttpResponseBuilder};
use derive_more::{Display, Error};

/// Error taxonomy for the CAS client.
///
/// `Configuration` is a startup-time error: constructors return it and the
/// process is expected to refuse to start. The remaining variants are
/// per-request and are always contained within the request that produced
/// them.
#[derive(Debug, Clone, Display, Error)]
pub enum CasError {
    /// Missing or conflicting settings detected while building a component.
    #[display("configuration error: {message}")]
    Configuration { message: String },

    /// The CAS server rejected the ticket (invalid, expired, consumed, or
    /// service mismatch).
    #[display("ticket validation failure [{code}]: {message}")]
    ValidationFailure { code: String, message: String },

    /// Network or TLS error while talking to the CAS server.
    #[display("transport failure: {message}")]
    Transport { message: String },

    /// A proxy-granting ticket expected in the store was not there.
    #[display("proxy-granting ticket store inconsistency: {message}")]
    StoreInconsistency { message: String },
}

impl CasError {
    pub fn configuration(message: impl Into<String>) -> Self {
        CasError::Configuration {
            message: message.into(),
        }
    }

    pub fn validation_failure(code: impl Into<String>, message: impl Into<String>) -> Self {
        CasError::ValidationFailure {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        CasError::Transport {
            message: message.into(),
        }
    }

    pub fn store_inconsistency(message: impl Into<String>) -> Self {
        CasError::StoreInconsistency {
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for CasError {
    fn from(err: reqwest::Error) -> Self {
        CasError::Transport {
            message: err.to_string(),
        }
    }
}

impl error::ResponseError for CasError {
    fn status_code(&self) -> StatusCode {
        match *self {
            // Validation and transport failures are indistinguishable to the
            // caller: the request is not authenticated.
            CasError::ValidationFailure { .. } | CasError::Transport { .. } => {
                StatusCode::FORBIDDEN
            }
            CasError::Configuration { .. } | CasError::StoreInconsistency { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponseBuilder::new(self.status_code()).body(self.to_string())
    }
}
