//! Shared application state.

use std::sync::Arc;

use crate::api::ApiClient;
use crate::config::ConfigV1;
use crate::navigation::Navigator;
use crate::session::SessionContext;

/// Everything a screen needs: the session to read and guard on, and the
/// mediated client for gateway calls.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ConfigV1>,
    pub session: Arc<SessionContext>,
    pub api: Arc<ApiClient>,
    pub navigator: Arc<dyn Navigator>,
}
