#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, Utc};
use figment::providers::{Format, Yaml};
use figment::Figment;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;
use storefront_session::api::ApiClient;
use storefront_session::config::{Config, ConfigV1};
use storefront_session::identity::{InitOptions, KeycloakClient};
use storefront_session::models::TokenSet;
use storefront_session::navigation::RecordingNavigator;
use storefront_session::session::SessionContext;
use storefront_session::state::AppState;
use storefront_session::store::{MemoryStore, SessionStore};

pub const TOKEN_PATH: &str = "/realms/mini-project/protocol/openid-connect/token";
pub const AUTH_PATH: &str = "/realms/mini-project/protocol/openid-connect/auth";

/// Config for a storefront whose provider and gateway both live on `server_url`.
pub fn test_config(server_url: &str) -> ConfigV1 {
    let yaml = format!(
        r#"
version: "1.0.0"
identity:
  provider_url: "{server_url}/"
  realm: "mini-project"
  client_id: "ecom-frontend"
api:
  base_url: "{server_url}/api"
  min_token_validity_secs: 30
logging:
  level: "debug"
"#
    );
    let config: Config = Figment::new()
        .merge(Yaml::string(&yaml))
        .extract()
        .expect("test config should parse");
    match config {
        Config::ConfigV1(config) => config,
    }
}

pub struct Harness {
    pub state: AppState,
    pub identity: Arc<KeycloakClient>,
    pub store: Arc<MemoryStore>,
    pub navigator: Arc<RecordingNavigator>,
}

impl Harness {
    pub fn auth_url(&self) -> String {
        format!(
            "{}{}",
            self.state.config.identity.provider_url.trim_end_matches('/'),
            AUTH_PATH
        )
    }
}

/// Wires the application against `server_url`, sharing `store` so a second
/// boot sees what the first one saved.
pub fn boot(server_url: &str, store: Arc<MemoryStore>, options: InitOptions) -> Harness {
    let config = Arc::new(test_config(server_url));
    let navigator = Arc::new(RecordingNavigator::new());

    let identity = Arc::new(KeycloakClient::new(
        &config.identity,
        reqwest::Client::new(),
        store.clone() as Arc<dyn SessionStore>,
        navigator.clone(),
    ));
    let session = Arc::new(SessionContext::new(
        identity.clone(),
        options,
        config.identity.post_logout_redirect_uri.clone(),
    ));
    let api = Arc::new(
        ApiClient::new(&config.api, &config.navigation, session.clone(), navigator.clone())
            .expect("API client should build"),
    );

    Harness {
        state: AppState {
            config,
            session,
            api,
            navigator: navigator.clone(),
        },
        identity,
        store,
        navigator,
    }
}

impl Harness {
    /// Another session context over the same identity client, as a second
    /// mount of the application would create.
    pub fn second_context(&self) -> SessionContext {
        SessionContext::new(
            self.identity.clone(),
            InitOptions::default(),
            self.state.config.identity.post_logout_redirect_uri.clone(),
        )
    }
}

pub fn access_token(username: &str, roles: &[&str], expires_in: i64) -> String {
    let claims = json!({
        "sub": format!("{}-id", username),
        "exp": Utc::now().timestamp() + expires_in,
        "iat": Utc::now().timestamp(),
        "preferred_username": username,
        "realm_access": {"roles": roles},
    });
    encode(&Header::default(), &claims, &EncodingKey::from_secret(b"secret"))
        .expect("Failed to create token")
}

pub fn token_body(access_token: &str) -> String {
    json!({
        "access_token": access_token,
        "refresh_token": "refresh-2",
        "id_token": "id-token",
        "expires_in": 300,
        "refresh_expires_in": 1800,
    })
    .to_string()
}

/// A store holding a session that expires in `expires_in` seconds.
pub fn signed_in_store(access_token: String, expires_in: i64) -> Arc<MemoryStore> {
    Arc::new(MemoryStore::with_tokens(TokenSet {
        access_token,
        refresh_token: Some("refresh-1".to_string()),
        id_token: None,
        expires_at: Utc::now() + Duration::seconds(expires_in),
        refresh_expires_at: None,
    }))
}
