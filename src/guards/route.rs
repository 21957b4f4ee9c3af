use std::collections::BTreeSet;

use tracing::debug;

use crate::config::NavigationConfig;
use crate::models::{Role, Session};
use crate::navigation::{Navigation, Navigator};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    Render,
    /// Not signed in. `return_to` is where the user was headed, kept so a
    /// later login can resume there.
    RedirectHome { return_to: String },
    RedirectUnauthorized,
}

/// Navigation-time check for a protected screen.
#[derive(Debug, Clone, Default)]
pub struct RouteGuard {
    required_roles: Option<BTreeSet<Role>>,
}

impl RouteGuard {
    /// Any signed-in user passes.
    pub fn authenticated() -> Self {
        Self::default()
    }

    pub fn requiring<I, R>(roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<Role>,
    {
        Self {
            required_roles: Some(roles.into_iter().map(Into::into).collect()),
        }
    }

    pub fn decide(&self, session: &Session, destination: &str) -> RouteDecision {
        if !session.authenticated {
            return RouteDecision::RedirectHome {
                return_to: destination.to_string(),
            };
        }
        match &self.required_roles {
            Some(required) if !required.is_empty() && !session.has_any_role(required) => {
                RouteDecision::RedirectUnauthorized
            }
            _ => RouteDecision::Render,
        }
    }

    /// Decides and performs the redirect, if any.
    pub fn enforce(
        &self,
        session: &Session,
        destination: &str,
        paths: &NavigationConfig,
        navigator: &dyn Navigator,
    ) -> RouteDecision {
        let decision = self.decide(session, destination);
        match &decision {
            RouteDecision::Render => {}
            RouteDecision::RedirectHome { return_to } => {
                debug!(return_to = %return_to, "Route requires a session");
                navigator.navigate(Navigation::Navigate(paths.home_path.clone()));
            }
            RouteDecision::RedirectUnauthorized => {
                debug!(destination, "Route requires a role the session lacks");
                navigator.navigate(Navigation::Navigate(paths.unauthorized_path.clone()));
            }
        }
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Claims, RolesContainer};
    use crate::navigation::RecordingNavigator;
    use chrono::{Duration, Utc};

    fn signed_in(roles: &[&str]) -> Session {
        Session::from_credentials(
            Some("token".to_string()),
            Some(Utc::now() + Duration::minutes(5)),
            Some(Claims {
                realm_access: Some(RolesContainer {
                    roles: roles.iter().map(|r| r.to_string()).collect(),
                }),
                ..Claims::default()
            }),
        )
    }

    #[test]
    fn test_anonymous_is_sent_home_with_destination() {
        let guard = RouteGuard::requiring([Role::ADMIN]);
        assert_eq!(
            guard.decide(&Session::anonymous(), "/admin/orders"),
            RouteDecision::RedirectHome {
                return_to: "/admin/orders".to_string()
            }
        );
    }

    #[test]
    fn test_matching_role_renders() {
        let guard = RouteGuard::requiring([Role::ADMIN, "MANAGER"]);
        assert_eq!(guard.decide(&signed_in(&["ADMIN"]), "/admin"), RouteDecision::Render);
    }

    #[test]
    fn test_missing_role_is_unauthorized() {
        let guard = RouteGuard::requiring([Role::ADMIN]);
        assert_eq!(
            guard.decide(&signed_in(&["CLIENT", "offline_access"]), "/admin"),
            RouteDecision::RedirectUnauthorized
        );
    }

    #[test]
    fn test_no_required_roles_only_needs_a_session() {
        let session = signed_in(&[]);
        assert_eq!(RouteGuard::authenticated().decide(&session, "/cart"), RouteDecision::Render);
        let empty = RouteGuard::requiring(Vec::<Role>::new());
        assert_eq!(empty.decide(&session, "/cart"), RouteDecision::Render);
    }

    #[test]
    fn test_enforce_navigates() {
        let navigator = RecordingNavigator::new();
        let paths = NavigationConfig::default();
        let guard = RouteGuard::requiring([Role::ADMIN]);

        guard.enforce(&signed_in(&["CLIENT"]), "/admin", &paths, &navigator);
        guard.enforce(&Session::anonymous(), "/admin", &paths, &navigator);
        guard.enforce(&signed_in(&["ADMIN"]), "/admin", &paths, &navigator);

        assert_eq!(
            navigator.history(),
            vec![
                Navigation::Navigate("/unauthorized".to_string()),
                Navigation::Navigate("/".to_string()),
            ]
        );
    }
}
