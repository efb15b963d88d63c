//! Error types for the session engine.
//!
//! The variants follow the failure classes the UI distinguishes: transport
//! failures, malformed backend payloads, local storage failures, and role
//! ambiguity. Backend rejections keep the server's own message so it can be
//! shown verbatim in an alert.

use rentnest_store::StorageError;
use thiserror::Error;

use crate::models::Role;
use crate::verification::ResendStatus;

/// A type alias for `Result<T, AuthError>`.
pub type Result<T> = std::result::Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Timeout or unreachable backend. Surfaced to the user, never retried.
    #[error("Network error: {0}")]
    Network(String),

    /// The backend answered with a payload we cannot use.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The backend rejected the request with a non-2xx status.
    #[error("Request failed ({status}): {message}")]
    Api { status: u16, message: String },

    /// Reading or writing the local key/value store failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// More than one role is plausible and the user has to pick.
    #[error("Ambiguous role, candidates: {0:?}")]
    RoleAmbiguous(Vec<Role>),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Input rejected before any request was sent.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The same operation is already running.
    #[error("{0} already in progress")]
    InFlight(&'static str),

    #[error("Resend unavailable: {0:?}")]
    ResendUnavailable(ResendStatus),

    /// A role choice arrived for a login that a newer one replaced.
    #[error("Login superseded by a newer sign-in")]
    LoginSuperseded,

    /// An authenticated call was made without a stored session.
    #[error("Not signed in")]
    NotAuthenticated,
}

impl AuthError {
    /// Text suitable for a user-facing alert.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::Network(_) => {
                "Unable to reach the server. Check your connection and try again.".to_string()
            }
            AuthError::InvalidResponse(_) => {
                "The server sent an unexpected response. Please try again.".to_string()
            }
            AuthError::Api { message, .. } => message.clone(),
            AuthError::Storage(_) => {
                "Could not save your session on this device. Please try again.".to_string()
            }
            AuthError::RoleAmbiguous(_) => {
                "Choose whether to continue as a landlord or a tenant.".to_string()
            }
            AuthError::Serialization(_) => "Something went wrong. Please try again.".to_string(),
            AuthError::Validation(message) => message.clone(),
            AuthError::InFlight(_) => "Please wait, still working on it.".to_string(),
            AuthError::ResendUnavailable(status) => status
                .disabled_reason()
                .unwrap_or_else(|| "Cannot resend the code right now.".to_string()),
            AuthError::LoginSuperseded => {
                "This sign-in has expired. Please sign in again.".to_string()
            }
            AuthError::NotAuthenticated => "Please sign in again.".to_string(),
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, AuthError::Network(_))
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            AuthError::InvalidResponse(e.to_string())
        } else {
            AuthError::Network(e.to_string())
        }
    }
}
