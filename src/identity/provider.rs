use chrono::{DateTime, Utc};

use crate::error::IdentityError;
use crate::models::Claims;

/// Inputs to the passive session check performed at boot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitOptions {
    /// The location the application was opened at. When the provider sent the
    /// browser back after a login, it carries `code` and `state`.
    pub callback_url: Option<String>,
}

impl InitOptions {
    pub fn with_callback(url: impl Into<String>) -> Self {
        Self {
            callback_url: Some(url.into()),
        }
    }
}

/// The identity provider as seen by the session context.
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// A descriptive name for logs.
    fn get_name(&self) -> &str;

    /// Looks for an existing session without ever forcing an interactive login.
    /// Resolves to whether the user is authenticated.
    ///
    /// May run once; later calls fail with [`IdentityError::AlreadyInitialized`].
    async fn initialize(&self, options: &InitOptions) -> Result<bool, IdentityError>;

    /// Sends the browser to the provider login screen.
    async fn login(&self) -> Result<(), IdentityError>;

    /// Ends the session and sends the browser to `redirect_uri` via the provider.
    async fn logout(&self, redirect_uri: &str) -> Result<(), IdentityError>;

    /// Ensures the token stays valid for `min_validity_secs`. Resolves to `true`
    /// if it had to be renewed, `false` if it was still valid.
    async fn refresh(&self, min_validity_secs: u32) -> Result<bool, IdentityError>;

    /// True once `initialize` has completed successfully.
    fn is_ready(&self) -> bool;
    fn is_authenticated(&self) -> bool;
    fn token(&self) -> Option<String>;
    fn token_expiry(&self) -> Option<DateTime<Utc>>;
    fn claims(&self) -> Option<Claims>;
}
