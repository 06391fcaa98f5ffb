use crate::submission::SubmissionError;
use hyper::StatusCode;
use thiserror::Error;

/// Result type alias for contact-relay operations
pub type Result<T, E = RelayError> = std::result::Result<T, E>;

/// Errors that end a contact request before or after dispatch
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Method Not Allowed")]
    MethodNotAllowed,

    #[error("Not Found")]
    NotFound,

    #[error("Request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    #[error("Failed to read request body: {0}")]
    RequestBodyError(String),

    #[error(transparent)]
    InvalidSubmission(#[from] SubmissionError),

    #[error("{0} is not set")]
    Misconfigured(&'static str),

    /// At least one recipient failed; carries the first failure's cause
    #[error("{0}")]
    DeliveryFailed(String),

    #[error("Response serialization error: {0}")]
    ResponseSerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpClientError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a single recipient did not get the notification
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    /// The Bot API answered `ok: false`
    #[error("{0}")]
    Rejected(String),

    #[error("unexpected non-JSON response (status {status}): {body}")]
    UnexpectedResponse { status: u16, body: String },

    #[error("malformed response (status {status}): {reason}")]
    MalformedResponse { status: u16, reason: String },

    #[error("{0}")]
    Transport(String),

    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    #[error("delivery task failed: {0}")]
    TaskFailed(String),
}

impl RelayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            RelayError::NotFound => StatusCode::NOT_FOUND,
            RelayError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            RelayError::RequestBodyError(_) | RelayError::InvalidSubmission(_) => {
                StatusCode::BAD_REQUEST
            }
            RelayError::Misconfigured(_)
            | RelayError::DeliveryFailed(_)
            | RelayError::ResponseSerializationError(_)
            | RelayError::HttpClientError(_)
            | RelayError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short, caller-facing summary. The detailed cause goes in `details`.
    pub fn summary(&self) -> &'static str {
        match self {
            RelayError::MethodNotAllowed => "Method Not Allowed",
            RelayError::NotFound => "Not Found",
            RelayError::PayloadTooLarge(_) => "Payload Too Large",
            RelayError::RequestBodyError(_) | RelayError::InvalidSubmission(_) => {
                "Invalid request"
            }
            RelayError::Misconfigured(_) => "Server misconfigured",
            _ => "Failed to process request",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            RelayError::MethodNotAllowed.status_code(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            RelayError::InvalidSubmission(SubmissionError::MissingField("email")).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            RelayError::Misconfigured("TELEGRAM_BOT_TOKEN").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            RelayError::DeliveryFailed("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_misconfigured_message() {
        let err = RelayError::Misconfigured("TELEGRAM_CHAT_IDS");
        assert_eq!(err.to_string(), "TELEGRAM_CHAT_IDS is not set");
        assert_eq!(err.summary(), "Server misconfigured");
    }
}
