use std::collections::BTreeSet;

use crate::models::{Role, Session};

/// Hides a piece of UI unless the session holds one of the required roles.
/// There is no fallback content.
#[derive(Debug, Clone)]
pub struct InlineGuard {
    required_roles: BTreeSet<Role>,
}

impl InlineGuard {
    pub fn new<I, R>(roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<Role>,
    {
        Self {
            required_roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    pub fn allows(&self, session: &Session) -> bool {
        session.authenticated && session.has_any_role(&self.required_roles)
    }

    pub fn render<T>(&self, session: &Session, children: impl FnOnce() -> T) -> Option<T> {
        self.allows(session).then(children)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Claims, RolesContainer};
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
    fn test_renders_for_matching_role() {
        let guard = InlineGuard::new([Role::ADMIN]);
        assert_eq!(guard.render(&signed_in(&["ADMIN"]), || "delete"), Some("delete"));
    }

    #[test]
    fn test_hidden_without_role() {
        let guard = InlineGuard::new([Role::ADMIN]);
        assert_eq!(guard.render(&signed_in(&["CLIENT"]), || "delete"), None);
    }

    #[test]
    fn test_hidden_when_anonymous() {
        let session = Session::anonymous();
        assert!(!InlineGuard::new([Role::ADMIN]).allows(&session));
        assert!(!InlineGuard::new([Role::CLIENT, Role::ADMIN]).allows(&session));
        assert!(!InlineGuard::new(Vec::<Role>::new()).allows(&session));
    }

    #[test]
    fn test_empty_role_set_hides() {
        assert!(!InlineGuard::new(Vec::<Role>::new()).allows(&signed_in(&["ADMIN"])));
    }
}
