//! The session context: owner of the one-time identity handshake and of the
//! session state every other component reads.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::error::IdentityError;
use crate::identity::{IdentityProvider, InitOptions};
use crate::models::{AppGate, InitializationState, Role, Session, SessionState};

/// Owns the session for the lifetime of the application.
///
/// State is published through a `watch` channel; consumers either take a
/// snapshot or subscribe and re-evaluate on every change. Only the context
/// writes it.
pub struct SessionContext {
    identity: Arc<dyn IdentityProvider>,
    options: InitOptions,
    post_logout_redirect_uri: String,
    mounted: AtomicBool,
    state: watch::Sender<SessionState>,
}

impl SessionContext {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        options: InitOptions,
        post_logout_redirect_uri: impl Into<String>,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            identity,
            options,
            post_logout_redirect_uri: post_logout_redirect_uri.into(),
            mounted: AtomicBool::new(false),
            state,
        }
    }

    /// Runs the identity handshake on first call. Any later call, including
    /// ones racing the first, starts nothing and waits for that handshake to
    /// settle. Resolves to the terminal state.
    pub async fn mount(&self) -> InitializationState {
        if self
            .mounted
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Session context already mounted; awaiting the running handshake");
            return self.ready().await;
        }

        self.state
            .send_modify(|state| state.init = InitializationState::InFlight);
        info!(
            "Connecting to identity provider '{}'",
            self.identity.get_name()
        );

        match self.identity.initialize(&self.options).await {
            Ok(authenticated) => {
                let session = if authenticated {
                    self.live_session()
                } else {
                    Session::anonymous()
                };
                info!(
                    authenticated = session.authenticated,
                    username = session.username.as_deref().unwrap_or(""),
                    "Session ready"
                );
                self.publish(InitializationState::Ready, session);
            }
            Err(IdentityError::AlreadyInitialized) if !self.identity.is_ready() => {
                warn!("Identity provider was initialized elsewhere and failed; continuing anonymous");
                self.publish(InitializationState::Failed, Session::anonymous());
            }
            Err(IdentityError::AlreadyInitialized) => {
                let session = self.live_session();
                info!(
                    authenticated = session.authenticated,
                    "Identity provider was already initialized; adopting its live state"
                );
                self.publish(InitializationState::Ready, session);
            }
            Err(e) => {
                error!("Identity provider initialization failed: {}", e);
                self.publish(InitializationState::Failed, Session::anonymous());
            }
        }

        self.init_state()
    }

    /// Waits until the handshake reaches `Ready` or `Failed`.
    pub async fn ready(&self) -> InitializationState {
        let mut rx = self.state.subscribe();
        let result = rx.wait_for(|state| state.init.is_terminal()).await;
        match result {
            Ok(state) => state.init,
            // The sender lives in `self`, so this cannot close while we wait.
            Err(_) => InitializationState::Failed,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn session(&self) -> Session {
        self.state.borrow().session.clone()
    }

    pub fn init_state(&self) -> InitializationState {
        self.state.borrow().init
    }

    pub fn gate(&self) -> AppGate {
        self.state.borrow().gate()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().session.authenticated
    }

    pub fn token(&self) -> Option<String> {
        self.state.borrow().session.token.clone()
    }

    pub fn roles(&self) -> BTreeSet<Role> {
        self.state.borrow().session.roles.clone()
    }

    pub fn username(&self) -> Option<String> {
        self.state.borrow().session.username.clone()
    }

    /// Whether the identity client finished its handshake and can start a login.
    pub fn identity_ready(&self) -> bool {
        self.identity.is_ready()
    }

    /// Makes sure the token is valid for `min_validity_secs` and republishes the
    /// session, which on failure is now anonymous.
    pub async fn refresh(&self, min_validity_secs: u32) -> Result<bool, IdentityError> {
        let result = self.identity.refresh(min_validity_secs).await;
        match &result {
            Ok(true) => debug!("Token refreshed"),
            Ok(false) => {}
            Err(e) => warn!("Token refresh failed: {}", e),
        }
        let init = self.init_state();
        self.publish(init, self.live_session());
        result
    }

    /// Starts an interactive login. Failures are logged, never returned.
    pub async fn login(&self) {
        if let Err(e) = self.identity.login().await {
            error!("Failed to start login: {}", e);
        }
    }

    /// Ends the session at the provider and publishes an anonymous session.
    pub async fn logout(&self) {
        if let Err(e) = self
            .identity
            .logout(&self.post_logout_redirect_uri)
            .await
        {
            error!("Failed to log out: {}", e);
        }
        let init = self.init_state();
        self.publish(init, Session::anonymous());
    }

    fn live_session(&self) -> Session {
        if !self.identity.is_authenticated() {
            return Session::anonymous();
        }
        Session::from_credentials(
            self.identity.token(),
            self.identity.token_expiry(),
            self.identity.claims(),
        )
    }

    fn publish(&self, init: InitializationState, session: Session) {
        let next = SessionState { init, session };
        self.state.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            *state = next;
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Claims, RolesContainer};
    use chrono::{DateTime, Duration, Utc};
    use futures::future::join_all;
    use std::sync::atomic::AtomicUsize;

    #[derive(Clone, Copy)]
    enum Outcome {
        Authenticated,
        Anonymous,
        AlreadyInitialized,
        AlreadyFailed,
        Unreachable,
    }

    /// Identity provider double that counts handshakes and logins.
    struct FakeProvider {
        outcome: Outcome,
        live: bool,
        roles: Vec<String>,
        handshakes: AtomicUsize,
        logins: AtomicUsize,
        ready: AtomicBool,
    }

    impl FakeProvider {
        fn new(outcome: Outcome, live: bool, roles: &[&str]) -> Self {
            Self {
                outcome,
                live,
                roles: roles.iter().map(|r| r.to_string()).collect(),
                handshakes: AtomicUsize::new(0),
                logins: AtomicUsize::new(0),
                ready: AtomicBool::new(false),
            }
        }
    }

    #[async_trait::async_trait]
    impl IdentityProvider for FakeProvider {
        fn get_name(&self) -> &str {
            "fake"
        }

        async fn initialize(&self, _options: &InitOptions) -> Result<bool, IdentityError> {
            self.handshakes.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            match self.outcome {
                Outcome::Authenticated => {
                    self.ready.store(true, Ordering::SeqCst);
                    Ok(true)
                }
                Outcome::Anonymous => {
                    self.ready.store(true, Ordering::SeqCst);
                    Ok(false)
                }
                Outcome::AlreadyInitialized => {
                    self.ready.store(true, Ordering::SeqCst);
                    Err(IdentityError::AlreadyInitialized)
                }
                Outcome::AlreadyFailed => Err(IdentityError::AlreadyInitialized),
                Outcome::Unreachable => Err(IdentityError::InvalidConfig("unreachable".into())),
            }
        }

        async fn login(&self) -> Result<(), IdentityError> {
            self.logins.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn logout(&self, _redirect_uri: &str) -> Result<(), IdentityError> {
            Ok(())
        }

        async fn refresh(&self, _min_validity_secs: u32) -> Result<bool, IdentityError> {
            Ok(false)
        }

        fn is_ready(&self) -> bool {
            self.ready.load(Ordering::SeqCst)
        }

        fn is_authenticated(&self) -> bool {
            self.live
        }

        fn token(&self) -> Option<String> {
            self.live.then(|| "live-token".to_string())
        }

        fn token_expiry(&self) -> Option<DateTime<Utc>> {
            self.live.then(|| Utc::now() + Duration::minutes(5))
        }

        fn claims(&self) -> Option<Claims> {
            self.live.then(|| Claims {
                preferred_username: Some("alice".to_string()),
                realm_access: Some(RolesContainer {
                    roles: self.roles.clone(),
                }),
                ..Claims::default()
            })
        }
    }

    fn context(provider: Arc<FakeProvider>) -> Arc<SessionContext> {
        Arc::new(SessionContext::new(
            provider,
            InitOptions::default(),
            "http://localhost:3000/",
        ))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_mounts_run_one_handshake() {
        let provider = Arc::new(FakeProvider::new(Outcome::Authenticated, true, &["CLIENT"]));
        let ctx = context(provider.clone());

        let mounts = (0..16).map(|_| {
            let ctx = ctx.clone();
            tokio::spawn(async move { ctx.mount().await })
        });
        let results = join_all(mounts).await;

        assert_eq!(provider.handshakes.load(Ordering::SeqCst), 1);
        for result in results {
            assert_eq!(result.unwrap(), InitializationState::Ready);
        }
        assert!(ctx.is_authenticated());
    }

    #[tokio::test]
    async fn test_admin_roles_are_published() {
        let provider = Arc::new(FakeProvider::new(Outcome::Authenticated, true, &["ADMIN"]));
        let ctx = context(provider);
        assert_eq!(ctx.mount().await, InitializationState::Ready);

        assert!(ctx.roles().contains(&Role::admin()));
        assert_eq!(ctx.username().as_deref(), Some("alice"));
        assert_eq!(ctx.token().as_deref(), Some("live-token"));
    }

    #[tokio::test]
    async fn test_duplicate_initialization_adopts_live_state() {
        let provider = Arc::new(FakeProvider::new(Outcome::AlreadyInitialized, true, &["CLIENT"]));
        let ctx = context(provider);
        assert_eq!(ctx.mount().await, InitializationState::Ready);
        assert!(ctx.is_authenticated());
    }

    #[tokio::test]
    async fn test_duplicate_initialization_of_failed_provider_is_failed() {
        let provider = Arc::new(FakeProvider::new(Outcome::AlreadyFailed, false, &[]));
        let ctx = context(provider);
        assert_eq!(ctx.mount().await, InitializationState::Failed);
        assert!(!ctx.is_authenticated());
    }

    #[tokio::test]
    async fn test_failed_initialization_unblocks_as_anonymous() {
        let provider = Arc::new(FakeProvider::new(Outcome::Unreachable, false, &[]));
        let ctx = context(provider);
        assert_eq!(ctx.gate(), AppGate::Placeholder);

        assert_eq!(ctx.mount().await, InitializationState::Failed);
        assert_eq!(ctx.gate(), AppGate::Ready);
        assert_eq!(ctx.session(), Session::anonymous());
        assert!(!ctx.identity_ready());
    }

    #[tokio::test]
    async fn test_anonymous_initialization_ignores_stale_provider_state() {
        let provider = Arc::new(FakeProvider::new(Outcome::Anonymous, true, &["ADMIN"]));
        let ctx = context(provider);
        assert_eq!(ctx.mount().await, InitializationState::Ready);
        assert!(!ctx.is_authenticated());
        assert!(ctx.roles().is_empty());
    }

    #[tokio::test]
    async fn test_subscribers_see_in_flight_then_ready() {
        let provider = Arc::new(FakeProvider::new(Outcome::Authenticated, true, &["CLIENT"]));
        let ctx = context(provider);
        let mut rx = ctx.subscribe();

        let mounting = {
            let ctx = ctx.clone();
            tokio::spawn(async move { ctx.mount().await })
        };

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().init, InitializationState::InFlight);
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().init, InitializationState::Ready);
        assert_eq!(mounting.await.unwrap(), InitializationState::Ready);
    }

    #[tokio::test]
    async fn test_login_delegates_to_provider() {
        let provider = Arc::new(FakeProvider::new(Outcome::Anonymous, false, &[]));
        let ctx = context(provider.clone());
        ctx.mount().await;
        ctx.login().await;
        assert_eq!(provider.logins.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_logout_publishes_anonymous_session() {
        let provider = Arc::new(FakeProvider::new(Outcome::Authenticated, true, &["ADMIN"]));
        let ctx = context(provider);
        ctx.mount().await;
        ctx.logout().await;
        assert!(!ctx.is_authenticated());
        assert_eq!(ctx.init_state(), InitializationState::Ready);
    }
}
