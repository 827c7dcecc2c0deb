//! Error types for provider access and configuration.

use thiserror::Error;

/// Errors produced by places providers.
///
/// Provider statuses other than `OK` are not errors; they travel in the
/// [`crate::Reply`]. Everything except the construction-time variants is a
/// per-request failure that callers degrade to an empty result (see
/// [`crate::degrade`]).
#[derive(Debug, Error)]
pub enum PlacesError {
    /// Network or TLS failure from the underlying HTTP client.
    #[cfg(feature = "http")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {message}")]
    Deserialize { context: String, message: String },

    /// The configured base URL cannot be parsed.
    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    /// No API key configured. Fatal for the whole session.
    #[error("no places API key configured")]
    MissingCredential,

    /// Transport failure reported by a non-HTTP provider.
    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

impl PlacesError {
    /// `true` when the session cannot recover by re-issuing requests.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::MissingCredential | Self::InvalidBaseUrl { .. })
    }
}

/// Errors raised while reading configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
