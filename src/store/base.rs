use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::{file_store::FileStore, memory_store::MemoryStore};
use crate::config::StoreConfig;
use crate::models::{PendingLogin, TokenSet};

/// The SessionStore trait abstracts where the session lives between boots:
/// the issued token set, and the in-progress login awaiting its callback.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load_tokens(&self) -> Result<Option<TokenSet>, String>;
    async fn save_tokens(&self, tokens: &TokenSet) -> Result<(), String>;
    async fn clear_tokens(&self) -> Result<(), String>;
    async fn save_pending_login(&self, pending: &PendingLogin) -> Result<(), String>;
    /// Returns the pending login and forgets it; a callback is accepted once.
    async fn take_pending_login(&self) -> Result<Option<PendingLogin>, String>;
    fn get_name(&self) -> &str;
}

/// Creates a concrete store implementation based on the StoreConfig.
pub fn create_store(config: &StoreConfig) -> Arc<dyn SessionStore> {
    match config {
        StoreConfig::Memory => {
            info!("Keeping the session in memory only.");
            Arc::new(MemoryStore::new())
        }
        StoreConfig::File(file_config) => {
            info!("Persisting the session to '{}'.", file_config.path);
            Arc::new(FileStore::new(&file_config.path))
        }
    }
}
