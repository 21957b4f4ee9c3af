use async_trait::async_trait;
use parking_lot::Mutex;

use super::base::SessionStore;
use crate::models::{PendingLogin, TokenSet};

/// Keeps the session in process memory.
#[derive(Default)]
pub struct MemoryStore {
    tokens: Mutex<Option<TokenSet>>,
    pending: Mutex<Option<PendingLogin>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `tokens`, as if a previous boot saved them.
    pub fn with_tokens(tokens: TokenSet) -> Self {
        Self {
            tokens: Mutex::new(Some(tokens)),
            pending: Mutex::new(None),
        }
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load_tokens(&self) -> Result<Option<TokenSet>, String> {
        Ok(self.tokens.lock().clone())
    }

    async fn save_tokens(&self, tokens: &TokenSet) -> Result<(), String> {
        *self.tokens.lock() = Some(tokens.clone());
        Ok(())
    }

    async fn clear_tokens(&self) -> Result<(), String> {
        *self.tokens.lock() = None;
        Ok(())
    }

    async fn save_pending_login(&self, pending: &PendingLogin) -> Result<(), String> {
        *self.pending.lock() = Some(pending.clone());
        Ok(())
    }

    async fn take_pending_login(&self) -> Result<Option<PendingLogin>, String> {
        Ok(self.pending.lock().take())
    }

    fn get_name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pending_login_is_taken_once() {
        let store = MemoryStore::new();
        let pending = PendingLogin {
            state: "s1".to_string(),
            nonce: "n1".to_string(),
            code_verifier: "v1".to_string(),
            redirect_uri: "http://localhost:3000/".to_string(),
        };
        store.save_pending_login(&pending).await.unwrap();

        assert_eq!(store.take_pending_login().await.unwrap(), Some(pending));
        assert_eq!(store.take_pending_login().await.unwrap(), None);
    }
}
