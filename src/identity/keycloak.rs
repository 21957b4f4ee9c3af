use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use reqwest::Url;
use serde::Deserialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::pkce::{PkceChallenge, CHALLENGE_METHOD};
use super::provider::{IdentityProvider, InitOptions};
use crate::config::IdentityConfig;
use crate::error::IdentityError;
use crate::models::{parse_claims, Claims, PendingLogin, TokenSet};
use crate::navigation::{Navigation, Navigator};
use crate::store::SessionStore;

/// Lifetime assumed for an access token that carries neither `exp` nor `expires_in`.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 300;

/// Callback `error` values that only mean "there is no SSO session".
const PASSIVE_LOGIN_ERRORS: [&str; 3] = ["login_required", "interaction_required", "consent_required"];

/// Identity session client for a Keycloak realm, using the authorization code
/// flow with PKCE as a public client.
pub struct KeycloakClient {
    config: IdentityConfig,
    http: reqwest::Client,
    store: Arc<dyn SessionStore>,
    navigator: Arc<dyn Navigator>,
    initialized: AtomicBool,
    ready: AtomicBool,
    /// Flips to `true` once the first `initialize` has finished, either way.
    settled: watch::Sender<bool>,
    session: RwLock<Option<ActiveSession>>,
    refresh_lock: tokio::sync::Mutex<()>,
}

#[derive(Debug, Clone)]
struct ActiveSession {
    tokens: TokenSet,
    claims: Claims,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    id_token: Option<String>,
    expires_in: Option<i64>,
    refresh_expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    error: String,
    error_description: Option<String>,
}

/// Query parameters of a redirect back from the provider.
#[derive(Debug, Default, PartialEq, Eq)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Extracts the login callback parameters, or `None` if `url` is not a callback.
fn parse_callback(url: &str) -> Result<Option<CallbackParams>, IdentityError> {
    let url = Url::parse(url)
        .map_err(|e| IdentityError::InvalidCallback(format!("'{}' is not a URL: {}", url, e)))?;

    let mut params = CallbackParams::default();
    for (key, value) in url.query_pairs() {
        let value = Some(value.into_owned());
        match key.as_ref() {
            "code" => params.code = value,
            "state" => params.state = value,
            "error" => params.error = value,
            "error_description" => params.error_description = value,
            _ => {}
        }
    }

    if params.code.is_none() && params.error.is_none() {
        return Ok(None);
    }
    Ok(Some(params))
}

impl KeycloakClient {
    pub fn new(
        config: &IdentityConfig,
        http: reqwest::Client,
        store: Arc<dyn SessionStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        info!(
            "Creating Keycloak client for realm '{}', client_id='{}', store='{}'",
            config.realm,
            config.client_id,
            store.get_name()
        );
        Self {
            config: config.clone(),
            http,
            store,
            navigator,
            initialized: AtomicBool::new(false),
            ready: AtomicBool::new(false),
            settled: watch::channel(false).0,
            session: RwLock::new(None),
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// The provider login URL for a pending login.
    pub fn login_url(&self, pending: &PendingLogin, code_challenge: &str) -> Result<String, IdentityError> {
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", pending.redirect_uri.as_str()),
            ("response_type", "code"),
            ("response_mode", "query"),
            ("scope", self.config.scope.as_str()),
            ("state", pending.state.as_str()),
            ("nonce", pending.nonce.as_str()),
            ("code_challenge", code_challenge),
            ("code_challenge_method", CHALLENGE_METHOD),
        ];
        Url::parse_with_params(&self.config.endpoint("auth"), &params)
            .map(String::from)
            .map_err(|e| IdentityError::InvalidConfig(format!("Bad provider URL: {}", e)))
    }

    /// The provider end-session URL.
    pub fn logout_url(&self, redirect_uri: &str, id_token_hint: Option<&str>) -> Result<String, IdentityError> {
        let mut params = vec![
            ("client_id", self.config.client_id.as_str()),
            ("post_logout_redirect_uri", redirect_uri),
        ];
        if let Some(hint) = id_token_hint {
            params.push(("id_token_hint", hint));
        }
        Url::parse_with_params(&self.config.endpoint("logout"), &params)
            .map(String::from)
            .map_err(|e| IdentityError::InvalidConfig(format!("Bad provider URL: {}", e)))
    }

    /// Posts a grant to the token endpoint.
    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenResponse, IdentityError> {
        let token_endpoint = self.config.endpoint("token");
        let resp = self.http.post(&token_endpoint).form(form).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<OAuthErrorBody>(&body) {
                Ok(err) => match err.error_description {
                    Some(description) => format!("{}: {}", err.error, description),
                    None => err.error,
                },
                Err(_) => body,
            };
            return Err(IdentityError::TokenEndpoint { status, message });
        }

        Ok(resp.json::<TokenResponse>().await?)
    }

    /// Turns a token endpoint response into a session, keeping the previous
    /// refresh token if the provider did not rotate it.
    fn session_from_response(
        &self,
        resp: TokenResponse,
        previous_refresh_token: Option<String>,
    ) -> Result<ActiveSession, IdentityError> {
        let claims = parse_claims(&resp.access_token).map_err(IdentityError::InvalidToken)?;
        let now = Utc::now();

        let expires_at = claims
            .exp
            .and_then(|exp| DateTime::<Utc>::from_timestamp(exp, 0))
            .unwrap_or_else(|| {
                now + Duration::seconds(resp.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS))
            });
        if expires_at <= now {
            return Err(IdentityError::InvalidToken(
                "access token is already expired".to_string(),
            ));
        }

        // Keycloak reports 0 for refresh tokens without their own expiry.
        let refresh_expires_at = resp
            .refresh_expires_in
            .filter(|secs| *secs > 0)
            .map(|secs| now + Duration::seconds(secs));

        Ok(ActiveSession {
            tokens: TokenSet {
                access_token: resp.access_token,
                refresh_token: resp.refresh_token.or(previous_refresh_token),
                id_token: resp.id_token,
                expires_at,
                refresh_expires_at,
            },
            claims,
        })
    }

    async fn adopt(&self, active: ActiveSession) -> Result<(), IdentityError> {
        self.store
            .save_tokens(&active.tokens)
            .await
            .map_err(IdentityError::Store)?;
        debug!(
            "Adopted token for '{}' valid until {}",
            active.claims.username().unwrap_or("unknown"),
            active.tokens.expires_at
        );
        *self.session.write() = Some(active);
        Ok(())
    }

    async fn clear_session(&self) {
        *self.session.write() = None;
        if let Err(e) = self.store.clear_tokens().await {
            warn!("Failed to clear stored session: {}", e);
        }
    }

    async fn refresh_grant(
        &self,
        refresh_token: &str,
    ) -> Result<ActiveSession, IdentityError> {
        let form = [
            ("grant_type", "refresh_token"),
            ("client_id", self.config.client_id.as_str()),
            ("refresh_token", refresh_token),
        ];
        let resp = self.token_request(&form).await?;
        self.session_from_response(resp, Some(refresh_token.to_string()))
    }

    /// Check-SSO: a login callback first, then a stored session, else anonymous.
    async fn discover(&self, options: &InitOptions) -> Result<bool, IdentityError> {
        if let Some(url) = &options.callback_url {
            if let Some(callback) = parse_callback(url)? {
                if let Some(authenticated) = self.complete_login(callback).await? {
                    return Ok(authenticated);
                }
            }
        }
        self.restore().await
    }

    /// Handles a redirect back from the provider. Resolves to `None` when the
    /// callback does not belong to a login started by this client.
    async fn complete_login(&self, callback: CallbackParams) -> Result<Option<bool>, IdentityError> {
        let pending = match self
            .store
            .take_pending_login()
            .await
            .map_err(IdentityError::Store)?
        {
            Some(pending) => pending,
            None => {
                warn!("Ignoring login callback without a pending login");
                return Ok(None);
            }
        };

        if callback.state.as_deref() != Some(pending.state.as_str()) {
            return Err(IdentityError::InvalidCallback(
                "state does not match the pending login".to_string(),
            ));
        }

        if let Some(error) = callback.error {
            if PASSIVE_LOGIN_ERRORS.contains(&error.as_str()) {
                info!("Provider reports no active session ({})", error);
                return Ok(Some(false));
            }
            let description = callback.error_description.unwrap_or_default();
            return Err(IdentityError::AuthorizationDenied(
                format!("{} {}", error, description).trim_end().to_string(),
            ));
        }

        let code = callback.code.unwrap_or_default();
        let form = [
            ("grant_type", "authorization_code"),
            ("client_id", self.config.client_id.as_str()),
            ("code", code.as_str()),
            ("redirect_uri", pending.redirect_uri.as_str()),
            ("code_verifier", pending.code_verifier.as_str()),
        ];
        let resp = self.token_request(&form).await?;
        let active = self.session_from_response(resp, None)?;

        if let Some(nonce) = active.claims.extra.get("nonce").and_then(|v| v.as_str()) {
            if nonce != pending.nonce {
                return Err(IdentityError::InvalidCallback(
                    "token nonce does not match the pending login".to_string(),
                ));
            }
        }

        info!(
            "Login completed for '{}'",
            active.claims.username().unwrap_or("unknown")
        );
        self.adopt(active).await?;
        Ok(Some(true))
    }

    /// Picks up a session saved by an earlier boot, refreshing it silently if the
    /// access token expired. Any failure here just means there is no session.
    async fn restore(&self) -> Result<bool, IdentityError> {
        let tokens = match self.store.load_tokens().await.map_err(IdentityError::Store)? {
            Some(tokens) => tokens,
            None => {
                debug!("No stored session");
                return Ok(false);
            }
        };

        if tokens.is_valid_for(Duration::zero()) {
            match parse_claims(&tokens.access_token) {
                Ok(claims) => {
                    *self.session.write() = Some(ActiveSession { tokens, claims });
                    info!("Restored stored session");
                    return Ok(true);
                }
                Err(e) => {
                    warn!("Discarding stored session: {}", e);
                    self.clear_session().await;
                    return Ok(false);
                }
            }
        }

        let refresh_token = match tokens.refresh_token.as_deref() {
            Some(token) if tokens.can_refresh() => token,
            _ => {
                info!("Stored session expired");
                self.clear_session().await;
                return Ok(false);
            }
        };

        match self.refresh_grant(refresh_token).await {
            Ok(active) => {
                self.adopt(active).await?;
                info!("Renewed stored session");
                Ok(true)
            }
            Err(e) => {
                info!("Stored session could not be renewed: {}", e);
                self.clear_session().await;
                Ok(false)
            }
        }
    }
}

#[async_trait::async_trait]
impl IdentityProvider for KeycloakClient {
    fn get_name(&self) -> &str {
        &self.config.realm
    }

    async fn initialize(&self, options: &InitOptions) -> Result<bool, IdentityError> {
        if self.initialized.swap(true, Ordering::AcqRel) {
            debug!("Handshake already started; waiting for it to settle");
            let mut settled = self.settled.subscribe();
            // The sender lives in `self`, so this cannot close while we wait.
            let _ = settled.wait_for(|done| *done).await.map(|_| ());
            return Err(IdentityError::AlreadyInitialized);
        }
        debug!("Checking for an existing session in realm '{}'", self.config.realm);

        let result = self.discover(options).await;
        if result.is_ok() {
            self.ready.store(true, Ordering::Release);
        }
        self.settled.send_replace(true);
        result
    }

    async fn login(&self) -> Result<(), IdentityError> {
        let pkce = PkceChallenge::generate();
        let pending = PendingLogin {
            state: Uuid::new_v4().to_string(),
            nonce: Uuid::new_v4().to_string(),
            code_verifier: pkce.verifier,
            redirect_uri: self.config.redirect_uri.clone(),
        };
        let url = self.login_url(&pending, &pkce.challenge)?;

        self.store
            .save_pending_login(&pending)
            .await
            .map_err(IdentityError::Store)?;
        debug!("Redirecting to login for realm '{}'", self.config.realm);
        self.navigator.navigate(Navigation::Redirect(url));
        Ok(())
    }

    async fn logout(&self, redirect_uri: &str) -> Result<(), IdentityError> {
        let id_token = self
            .session
            .read()
            .as_ref()
            .and_then(|active| active.tokens.id_token.clone());
        let url = self.logout_url(redirect_uri, id_token.as_deref())?;

        self.clear_session().await;
        info!("Logging out of realm '{}'", self.config.realm);
        self.navigator.navigate(Navigation::Redirect(url));
        Ok(())
    }

    async fn refresh(&self, min_validity_secs: u32) -> Result<bool, IdentityError> {
        let _guard = self.refresh_lock.lock().await;
        let min_validity = Duration::seconds(i64::from(min_validity_secs));

        // Re-read under the lock: a refresh that finished while we waited
        // leaves nothing to do.
        let tokens = match self.session.read().as_ref() {
            Some(active) => active.tokens.clone(),
            None => return Err(IdentityError::RefreshFailed("not authenticated".to_string())),
        };
        if tokens.is_valid_for(min_validity) {
            return Ok(false);
        }

        let refresh_token = match tokens.refresh_token.as_deref() {
            Some(token) if tokens.can_refresh() => token,
            _ => {
                self.clear_session().await;
                return Err(IdentityError::RefreshFailed(
                    "refresh token is missing or expired".to_string(),
                ));
            }
        };

        debug!("Access token expires at {}, refreshing", tokens.expires_at);
        let renewed = match self.refresh_grant(refresh_token).await {
            Ok(active) => self.adopt(active).await,
            Err(e) => Err(e),
        };
        match renewed {
            Ok(()) => Ok(true),
            Err(e) => {
                self.clear_session().await;
                Err(IdentityError::RefreshFailed(e.to_string()))
            }
        }
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    fn is_authenticated(&self) -> bool {
        self.session.read().is_some()
    }

    fn token(&self) -> Option<String> {
        self.session
            .read()
            .as_ref()
            .map(|active| active.tokens.access_token.clone())
    }

    fn token_expiry(&self) -> Option<DateTime<Utc>> {
        self.session.read().as_ref().map(|active| active.tokens.expires_at)
    }

    fn claims(&self) -> Option<Claims> {
        self.session.read().as_ref().map(|active| active.claims.clone())
    }
}
