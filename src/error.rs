//! Error types for the session subsystem.
//!
//! Failures inside the subsystem are absorbed by the session context and turned
//! into state transitions or navigation; these types exist so that the seams
//! between components can tell the cases apart without inspecting messages.

use reqwest::StatusCode;
use thiserror::Error;

/// Errors raised by an identity session client.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// `initialize` was invoked on a client that already ran its handshake.
    #[error("identity client is already initialized")]
    AlreadyInitialized,

    /// The refresh token is missing, expired or was revoked.
    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    /// The provider answered the authorization request with an error.
    #[error("authorization denied: {0}")]
    AuthorizationDenied(String),

    /// The redirect back from the provider could not be matched to a login.
    #[error("invalid login callback: {0}")]
    InvalidCallback(String),

    /// The token endpoint rejected a grant.
    #[error("token endpoint returned {status}: {message}")]
    TokenEndpoint { status: StatusCode, message: String },

    /// A token could not be parsed or was already expired on arrival.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// The provider URL or a redirect URI is malformed.
    #[error("invalid identity configuration: {0}")]
    InvalidConfig(String),

    #[error("session store error: {0}")]
    Store(String),

    #[error("identity provider request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Errors surfaced to callers of the API client.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The gateway answered 401; a login (or reload) has been triggered.
    #[error("request was rejected as unauthenticated")]
    Unauthorized,

    /// The gateway answered 403; the app has been sent to the unauthorized page.
    #[error("request was rejected as forbidden")]
    Forbidden,

    /// The token could not be refreshed before dispatch; a login has been triggered.
    #[error("request aborted, token refresh failed: {0}")]
    RefreshFailed(String),

    /// A non-success status returned through one of the JSON helpers.
    #[error("request failed with status {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("invalid API path '{0}'")]
    InvalidPath(String),

    #[error("API request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Errors raised while wiring the application together.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error(transparent)]
    Api(#[from] ApiError),
}
