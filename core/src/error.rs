//! Error types for the Mailchimp API client.
//!
//! # Design
//! `Unauthorized` gets a dedicated variant because a bad API key is the one
//! failure a host usually wants to tell apart from everything else. Every
//! other unsuccessful status lands in `Api` with the remote `detail` message
//! and, when the API supplied them, the per-field validation errors.

use serde::Deserialize;
use thiserror::Error;

/// Result type for Mailchimp client operations.
pub type Result<T> = std::result::Result<T, MailchimpError>;

/// A single field-level validation error reported by the API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FieldError {
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub message: String,
}

/// Errors returned by `Client` and the resource factories.
#[derive(Debug, Error)]
pub enum MailchimpError {
    /// The API returned 401; the key is missing, wrong, or revoked.
    #[error("unauthorized: {detail}")]
    Unauthorized { detail: String },

    /// The API returned a status of 300 or above other than 401.
    #[error("API error (HTTP {status}): {detail}")]
    Api {
        status: u16,
        detail: String,
        errors: Vec<FieldError>,
    },

    /// An HTTP verb outside GET/POST/PATCH/DELETE was requested.
    #[error("HTTP \"{0}\" is not handled by this client")]
    UnhandledMethod(String),

    /// The request never produced a response (DNS, TLS, timeout, ...).
    #[error("transport error: {0}")]
    Transport(String),

    /// The request parameters could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    Deserialization(String),
}

impl MailchimpError {
    /// HTTP status behind this error, if it came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            MailchimpError::Unauthorized { .. } => Some(401),
            MailchimpError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Field-level validation errors attached to an `Api` error.
    pub fn errors(&self) -> &[FieldError] {
        match self {
            MailchimpError::Api { errors, .. } => errors,
            _ => &[],
        }
    }
}
