// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Send request validator.
//!
//! Resolves the JSON body of a send request against the configured defaults:
//! - Missing, `null`, empty, `false` or zero fields take the default
//! - `to` may be a single address or an array of addresses
//! - Every address must look like `local@domain.tld`

use crate::config::MessageDefaults;
use crate::mailer::OutgoingEmail;
use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid JSON body: {0}")]
    MalformedBody(String),

    #[error("Request body must be a JSON object")]
    NotAnObject,

    #[error("Invalid email format for '{field}': {value}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("Invalid email format in 'to' array: {0}")]
    InvalidListAddress(String),

    #[error("'to' array must not be empty")]
    EmptyRecipients,
}

/// Send request validator.
pub struct SendRequestValidator {
    email: Regex,
    defaults: MessageDefaults,
}

impl SendRequestValidator {
    /// Create a new validator falling back to `defaults`.
    pub fn new(defaults: MessageDefaults) -> Result<Self, regex::Error> {
        Ok(Self {
            email: Regex::new(EMAIL_PATTERN)?,
            defaults,
        })
    }

    pub fn is_valid_email(&self, address: &str) -> bool {
        self.email.is_match(address)
    }

    /// Parse a request body. An empty body is an empty object.
    pub fn parse_body(&self, raw: &[u8]) -> Result<Map<String, Value>, ValidationError> {
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(Map::new());
        }

        match serde_json::from_slice::<Value>(raw) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(ValidationError::NotAnObject),
            Err(e) => Err(ValidationError::MalformedBody(e.to_string())),
        }
    }

    /// Resolve and validate a message. The body is still an unrendered template.
    pub fn resolve(&self, params: &Map<String, Value>) -> Result<OutgoingEmail, ValidationError> {
        let from = field(params, "from").unwrap_or_else(|| self.defaults.from.clone());
        if !self.is_valid_email(&from) {
            debug!(from = %from, "Invalid email format for 'from'");
            return Err(ValidationError::InvalidAddress {
                field: "from",
                value: from,
            });
        }

        let to = self.recipients(params)?;

        Ok(OutgoingEmail {
            from,
            to,
            subject: field(params, "subject").unwrap_or_else(|| self.defaults.subject.clone()),
            body: field(params, "body").unwrap_or_else(|| self.defaults.body.clone()),
        })
    }

    fn recipients(&self, params: &Map<String, Value>) -> Result<Vec<String>, ValidationError> {
        if let Some(Value::Array(items)) = params.get("to") {
            if items.is_empty() {
                return Err(ValidationError::EmptyRecipients);
            }
            return items
                .iter()
                .map(|item| match item {
                    Value::String(s) if self.is_valid_email(s) => Ok(s.clone()),
                    Value::String(s) => Err(ValidationError::InvalidListAddress(s.clone())),
                    other => Err(ValidationError::InvalidListAddress(other.to_string())),
                })
                .collect::<Result<Vec<_>, _>>()
                .map_err(|err| {
                    debug!(error = %err, "Invalid email format in 'to' array");
                    err
                });
        }

        let to = field(params, "to").unwrap_or_else(|| self.defaults.to.clone());
        if !self.is_valid_email(&to) {
            debug!(to = %to, "Invalid email format for 'to'");
            return Err(ValidationError::InvalidAddress {
                field: "to",
                value: to,
            });
        }
        Ok(vec![to])
    }
}

/// A request field as text, or `None` when it should take the default.
fn field(params: &Map<String, Value>, key: &str) -> Option<String> {
    match params.get(key)? {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
