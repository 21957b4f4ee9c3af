use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::claims::Claims;

/// A realm role as issued by the identity provider.
///
/// Roles are opaque: anything the provider sends is kept, and a guard only
/// looks at the roles it names.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct Role(String);

impl Role {
    pub const ADMIN: &'static str = "ADMIN";
    /// Granted to every registered shopper.
    pub const CLIENT: &'static str = "CLIENT";

    pub fn new(name: impl Into<String>) -> Self {
        Role(name.into())
    }

    pub fn admin() -> Self {
        Role::new(Self::ADMIN)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_admin(&self) -> bool {
        self.0 == Self::ADMIN
    }
}

impl From<&str> for Role {
    fn from(name: &str) -> Self {
        Role::new(name)
    }
}

impl From<String> for Role {
    fn from(name: String) -> Self {
        Role(name)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The user's session as seen by the rest of the application.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub authenticated: bool,
    pub token: Option<String>,
    pub token_expiry: Option<DateTime<Utc>>,
    pub claims: Option<Claims>,
    pub roles: BTreeSet<Role>,
    pub username: Option<String>,
}

impl Session {
    /// A session with no user.
    pub fn anonymous() -> Self {
        Session::default()
    }

    /// Builds a session from what the identity client currently holds.
    ///
    /// The result is only authenticated when the token is non-empty and has
    /// not expired yet; anything else collapses to an anonymous session.
    pub fn from_credentials(
        token: Option<String>,
        token_expiry: Option<DateTime<Utc>>,
        claims: Option<Claims>,
    ) -> Self {
        let (token, expiry) = match (token, token_expiry) {
            (Some(token), Some(expiry)) if !token.is_empty() && expiry > Utc::now() => {
                (token, expiry)
            }
            _ => return Session::anonymous(),
        };

        let roles = claims
            .as_ref()
            .map(|c| c.realm_roles().iter().cloned().map(Role::from).collect())
            .unwrap_or_default();
        let username = claims
            .as_ref()
            .and_then(|c| c.username())
            .map(str::to_string);

        Session {
            authenticated: true,
            token: Some(token),
            token_expiry: Some(expiry),
            claims,
            roles,
            username,
        }
    }

    pub fn has_role(&self, role: &Role) -> bool {
        self.roles.contains(role)
    }

    /// True if the session holds at least one of `roles`.
    pub fn has_any_role<'a>(&self, roles: impl IntoIterator<Item = &'a Role>) -> bool {
        roles.into_iter().any(|role| self.roles.contains(role))
    }

    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(Role::is_admin)
    }
}

/// Progress of the one-time identity provider handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InitializationState {
    #[default]
    NotStarted,
    InFlight,
    Ready,
    Failed,
}

impl InitializationState {
    /// `Ready` and `Failed` both end the handshake and unblock rendering.
    pub fn is_terminal(self) -> bool {
        matches!(self, InitializationState::Ready | InitializationState::Failed)
    }
}

/// What the application may render right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppGate {
    /// The handshake has not settled; show the "connecting" spinner only.
    Placeholder,
    /// Render the application; guards decide per screen.
    Ready,
}

/// The snapshot published to session subscribers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub init: InitializationState,
    pub session: Session,
}

impl SessionState {
    pub fn gate(&self) -> AppGate {
        if self.init.is_terminal() {
            AppGate::Ready
        } else {
            AppGate::Placeholder
        }
    }
}
