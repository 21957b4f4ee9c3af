//! Application startup: wires the store, the identity client, the session
//! context and the API client together, then runs the session probe.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::api::ApiClient;
use crate::config::{ConfigV1, StoreConfig};
use crate::error::StartupError;
use crate::identity::{InitOptions, KeycloakClient};
use crate::models::InitializationState;
use crate::navigation::Navigator;
use crate::session::SessionContext;
use crate::state::AppState;
use crate::store::create_store;

/// Builds the application state. Nothing talks to the provider yet; that
/// happens on [`SessionContext::mount`].
pub fn build_state(
    config: Arc<ConfigV1>,
    navigator: Arc<dyn Navigator>,
    options: InitOptions,
) -> Result<AppState, StartupError> {
    let store = create_store(&config.store);
    let http = reqwest::Client::builder().build()?;

    let identity = Arc::new(KeycloakClient::new(
        &config.identity,
        http,
        store,
        navigator.clone(),
    ));
    let session = Arc::new(SessionContext::new(
        identity,
        options,
        config.identity.post_logout_redirect_uri.clone(),
    ));
    let api = Arc::new(ApiClient::new(
        &config.api,
        &config.navigation,
        session.clone(),
        navigator.clone(),
    )?);

    Ok(AppState {
        config,
        session,
        api,
        navigator,
    })
}

/// Boots the session and exercises it once.
///
/// With `logout` set the session is ended. Otherwise anonymous users are sent
/// to the login screen and signed-in users get the configured probe path
/// fetched through the mediator.
pub async fn run(
    config: Arc<ConfigV1>,
    navigator: Arc<dyn Navigator>,
    callback_url: Option<String>,
    logout: bool,
) -> Result<(), StartupError> {
    if callback_url.is_some() && matches!(config.store, StoreConfig::Memory) {
        warn!(
            "--callback with the memory store: the pending login from the previous run is \
             gone, so the callback will be ignored. Configure `store.type: file`."
        );
    }
    let options = InitOptions { callback_url };
    let state = build_state(config, navigator, options)?;

    let init = state.session.mount().await;
    let session = state.session.session();
    let roles: Vec<&str> = session.roles.iter().map(|r| r.as_str()).collect();
    info!(
        init = ?init,
        authenticated = session.authenticated,
        username = session.username.as_deref().unwrap_or(""),
        roles = ?roles,
        "Session settled"
    );

    if init == InitializationState::Failed {
        warn!("Identity provider unavailable; continuing without a session");
    }

    if logout {
        state.session.logout().await;
        return Ok(());
    }

    if !session.authenticated {
        state.session.login().await;
        return Ok(());
    }

    let probe_path = &state.config.api.probe_path;
    let body: Value = state.api.get_json(probe_path).await?;
    info!(path = %probe_path, "Probe succeeded: {}", body);
    Ok(())
}
