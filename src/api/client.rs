use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{ApiConfig, NavigationConfig};
use crate::error::ApiError;
use crate::navigation::{Navigation, Navigator};
use crate::session::SessionContext;
use crate::utils::log_throttle::LogThrottle;

/// Window for repeated "sent without credentials" diagnostics.
const ANONYMOUS_LOG_INTERVAL: Duration = Duration::from_secs(60);

/// HTTP client for the API gateway.
///
/// Every call passes two intercepts. Before dispatch the bearer token is
/// refreshed if it is about to expire and then attached. After the response
/// arrives, 401 starts a login (or reloads the page when the identity client
/// never became ready) and 403 sends the user to the unauthorized page. Both
/// reject the call; nothing is retried.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: Arc<SessionContext>,
    navigator: Arc<dyn Navigator>,
    min_token_validity_secs: u32,
    unauthorized_path: String,
    throttle: LogThrottle,
}

impl ApiClient {
    pub fn new(
        config: &ApiConfig,
        navigation: &NavigationConfig,
        session: Arc<SessionContext>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let http = reqwest::Client::builder().default_headers(headers).build()?;

        info!("Creating API client for '{}'", config.base_url);
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            session,
            navigator,
            min_token_validity_secs: config.min_token_validity_secs,
            unauthorized_path: navigation.unauthorized_path.clone(),
            throttle: LogThrottle::new(ANONYMOUS_LOG_INTERVAL),
        })
    }

    /// Resolves a gateway-relative path such as `/products/3`. Absolute URLs
    /// are rejected.
    pub fn url(&self, path: &str) -> Result<String, ApiError> {
        if Url::parse(path).is_ok() {
            return Err(ApiError::InvalidPath(path.to_string()));
        }
        Ok(format!("{}/{}", self.base_url, path.trim_start_matches('/')))
    }

    /// Starts a request; dispatch it with [`ApiClient::send`].
    pub fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        Ok(self.http.request(method, self.url(path)?))
    }

    /// Dispatches a request through both intercepts. Statuses other than 401
    /// and 403 come back untouched.
    pub async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let request = self.authorize(request).await?;
        let response = request.send().await?;
        self.inspect(response).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.send(self.request(Method::GET, path)?).await?;
        Ok(success(response).await?.json::<T>().await?)
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.send(self.request(Method::POST, path)?.json(body)).await?;
        Ok(success(response).await?.json::<T>().await?)
    }

    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.send(self.request(Method::PUT, path)?.json(body)).await?;
        Ok(success(response).await?.json::<T>().await?)
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        let response = self.send(self.request(Method::DELETE, path)?).await?;
        success(response).await?;
        Ok(())
    }

    /// Request phase: refresh-then-attach when authenticated, nothing otherwise.
    async fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder, ApiError> {
        if !self.session.is_authenticated() || self.session.token().is_none() {
            if let Some(suppressed) = self.throttle.should_emit("anonymous_request") {
                debug!(suppressed, "No session; sending request without Authorization header");
            }
            return Ok(request);
        }

        let refreshed = self.session.refresh(self.min_token_validity_secs).await;
        let failure = match (refreshed, self.session.token()) {
            (Ok(_), Some(token)) => return Ok(request.bearer_auth(token)),
            (Ok(_), None) => "session ended during refresh".to_string(),
            (Err(e), _) => e.to_string(),
        };

        warn!("Aborting request, {}; starting login", failure);
        self.session.login().await;
        Err(ApiError::RefreshFailed(failure))
    }

    /// Response phase.
    async fn inspect(&self, response: Response) -> Result<Response, ApiError> {
        match response.status() {
            StatusCode::UNAUTHORIZED => {
                if self.session.identity_ready() {
                    info!("Gateway answered 401 for {}; starting login", response.url());
                    self.session.login().await;
                } else {
                    warn!("Gateway answered 401 but the identity client is not ready; reloading");
                    self.navigator.navigate(Navigation::Reload);
                }
                Err(ApiError::Unauthorized)
            }
            StatusCode::FORBIDDEN => {
                info!("Gateway answered 403 for {}", response.url());
                self.navigator
                    .navigate(Navigation::Navigate(self.unauthorized_path.clone()));
                Err(ApiError::Forbidden)
            }
            _ => Ok(response),
        }
    }
}

/// Turns a non-success status into [`ApiError::Status`] for the JSON helpers.
async fn success(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Status { status, body })
}
