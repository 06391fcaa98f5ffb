//! Parsing and validation of contact form submissions.

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::LazyLock;
use thiserror::Error;

static EMAIL_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@.]+$").expect("email pattern compiles")
});

#[derive(Error, Debug, PartialEq)]
pub enum SubmissionError {
    #[error("Invalid JSON in request body: {0}")]
    InvalidJson(String),

    #[error("Request body must be a JSON object")]
    NotAnObject,

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Field {0} must be a string")]
    InvalidType(&'static str),

    #[error("Invalid email address")]
    InvalidEmail,
}

/// A validated contact form submission. All fields are trimmed.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SubmissionRequest {
    pub name: String,
    pub email: String,
    pub message: String,
}

impl SubmissionRequest {
    /// Parses and validates a raw request body.
    ///
    /// An empty body is treated as an empty object, so it fails on the first
    /// missing field rather than as malformed JSON. Fields are checked in
    /// `name`, `email`, `message` order and the first violation is reported.
    pub fn from_body(body: &[u8]) -> Result<Self, SubmissionError> {
        let value = if body.trim_ascii().is_empty() {
            Value::Object(Map::new())
        } else {
            serde_json::from_slice::<Value>(body)
                .map_err(|e| SubmissionError::InvalidJson(e.to_string()))?
        };

        let Value::Object(fields) = value else {
            return Err(SubmissionError::NotAnObject);
        };

        let name = required_field(&fields, "name")?;
        let email = required_field(&fields, "email")?;
        let message = required_field(&fields, "message")?;

        if !EMAIL_SHAPE.is_match(&email) {
            return Err(SubmissionError::InvalidEmail);
        }

        Ok(Self {
            name,
            email,
            message,
        })
    }
}

fn required_field(fields: &Map<String, Value>, key: &'static str) -> Result<String, SubmissionError> {
    match fields.get(key) {
        None | Some(Value::Null) => Err(SubmissionError::MissingField(key)),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Err(SubmissionError::MissingField(key))
            } else {
                Ok(trimmed.to_string())
            }
        }
        Some(_) => Err(SubmissionError::InvalidType(key)),
    }
}
