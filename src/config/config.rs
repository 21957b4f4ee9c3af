use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};

use super::logging::LoggingConfig;
use super::store::StoreConfig;

/// Environment variable naming the YAML file to load.
pub const CONFIG_PATH_ENV: &str = "STOREFRONT_CONFIG";

/// Prefix of environment overrides; nested keys are separated by `__`.
pub const ENV_PREFIX: &str = "STOREFRONT_";

/// A top-level enum for versioned configurations.
#[derive(Deserialize, Serialize, JsonSchema)]
#[serde(tag = "version")]
pub enum Config {
    #[serde(rename = "1.0.0")]
    ConfigV1(ConfigV1),
}

/// Main config for v1.0.0. Every section falls back to the values the
/// storefront ships with, so an empty file is a valid local setup.
#[derive(Deserialize, Serialize, Debug, Clone, Default, JsonSchema)]
#[serde(default)]
pub struct ConfigV1 {
    pub identity: IdentityConfig,
    pub api: ApiConfig,
    pub navigation: NavigationConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

/// Load config from the file named by `STOREFRONT_CONFIG`, or "config.yaml"
/// in the current directory, with `STOREFRONT_*` environment overrides.
pub fn load_config() -> Result<ConfigV1, figment::Error> {
    let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "./config.yaml".to_string());
    load_config_from(&path)
}

/// Load config from a specific YAML file. A missing file is not an error;
/// defaults and environment overrides still apply.
pub fn load_config_from(path: &str) -> Result<ConfigV1, figment::Error> {
    let figment = Figment::new()
        .merge(Serialized::default("version", "1.0.0"))
        .merge(Yaml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).ignore(&["config"]).split("__"));

    match figment.extract::<Config>()? {
        Config::ConfigV1(c) => Ok(c),
    }
}

/// Print the JSON schema for the configuration to stdout.
pub fn print_schema() {
    let schema = schema_for!(Config);
    match serde_json::to_string_pretty(&schema) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize configuration schema: {}", e),
    }
}

/// Where the identity provider lives and how this client is registered there.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, JsonSchema)]
#[serde(default)]
pub struct IdentityConfig {
    pub provider_url: String,
    pub realm: String,
    pub client_id: String,
    /// Where the provider sends the browser back after login.
    pub redirect_uri: String,
    /// Where the provider sends the browser after logout.
    pub post_logout_redirect_uri: String,
    pub scope: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            provider_url: "http://localhost:9090/".to_string(),
            realm: "mini-project".to_string(),
            client_id: "ecom-frontend".to_string(),
            redirect_uri: "http://localhost:3000/".to_string(),
            post_logout_redirect_uri: "http://localhost:3000/".to_string(),
            scope: "openid".to_string(),
        }
    }
}

impl IdentityConfig {
    /// `{provider_url}/realms/{realm}/protocol/openid-connect/{endpoint}`
    pub fn endpoint(&self, endpoint: &str) -> String {
        format!(
            "{}/realms/{}/protocol/openid-connect/{}",
            self.provider_url.trim_end_matches('/'),
            self.realm,
            endpoint
        )
    }
}

/// The API gateway the storefront screens talk to.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, JsonSchema)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    /// A token with less validity left than this is refreshed before dispatch.
    pub min_token_validity_secs: u32,
    /// Endpoint called by the CLI probe once a session is established.
    pub probe_path: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            min_token_validity_secs: 30,
            probe_path: "/products".to_string(),
        }
    }
}

/// Fixed in-app locations used by guards and the request mediator.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, JsonSchema)]
#[serde(default)]
pub struct NavigationConfig {
    pub home_path: String,
    pub unauthorized_path: String,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            home_path: "/".to_string(),
            unauthorized_path: "/unauthorized".to_string(),
        }
    }
}
