//! Client for the Veolia Eau residential web API.
//!
//! This crate drives the provider's private login sequence (a PKCE-style
//! authorization-code flow spread over several redirect hops), exchanges the
//! resulting authorization code for a bearer token, and exposes typed calls
//! for water-consumption and alert data.
//!
//! The flow is strictly sequential: each step's redirect decides the next
//! step, so one [`VeoliaClient`] runs one flow at a time. Independent client
//! instances (different accounts) can run concurrently.

mod client;
pub mod constants;
mod data;
mod flow;
mod models;
pub mod pkce;
mod token;

pub use client::{Endpoints, VeoliaClient};
pub use models::{AccountData, AlertSettings, ConsumptionKind};

/// Error type for every client operation.
///
/// All variants are terminal for the operation that produced them; nothing is
/// retried automatically. The one self-healing path is token expiry, which
/// triggers a full re-login inside the data-access calls instead of
/// surfacing an error.
#[derive(Debug, thiserror::Error)]
pub enum VeoliaError {
    /// The password step answered 400, or no credentials were supplied.
    #[error("invalid username or password")]
    InvalidCredentials,

    /// A flow step answered a status other than the one its descriptor
    /// declares.
    #[error("login flow call to {url} failed with status {status}")]
    FlowStepFailed { url: String, status: reqwest::StatusCode },

    /// A redirect pointed at a path that is not part of the login flow.
    #[error("redirect to unknown flow step: {0}")]
    UnknownFlowStep(String),

    /// A `Location` header could not be parsed as a URL.
    #[error("invalid redirect location: {0}")]
    InvalidRedirect(String),

    /// A required field was absent from a response.
    #[error("required field `{0}` missing from response")]
    MissingField(&'static str),

    /// A flow step was declared with a verb the engine does not issue.
    #[error("unsupported HTTP method: {0}")]
    UnsupportedMethod(reqwest::Method),

    /// A token, account or data call answered an unexpected status.
    #[error("{endpoint} call failed with status {status}")]
    ApiCallFailed {
        endpoint: &'static str,
        status: reqwest::StatusCode,
    },

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, VeoliaError>;
