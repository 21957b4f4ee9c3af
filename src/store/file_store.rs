use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use super::base::SessionStore;
use crate::models::{PendingLogin, TokenSet};

/// On-disk layout of the session file.
#[derive(Serialize, Deserialize, Default)]
struct SessionFile {
    tokens: Option<TokenSet>,
    pending_login: Option<PendingLogin>,
}

/// Persists the session as a JSON document.
///
/// Every operation is a read-modify-write of the whole file, serialized by
/// an async mutex. Writes go to a sibling temp file that is then renamed.
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    async fn read(&self) -> Result<SessionFile, String> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(SessionFile::default()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                format!("Failed to parse session file '{}': {}", self.path.display(), e)
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(SessionFile::default()),
            Err(e) => Err(format!(
                "Failed to read session file '{}': {}",
                self.path.display(),
                e
            )),
        }
    }

    async fn write(&self, file: &SessionFile) -> Result<(), String> {
        let json = serde_json::to_vec_pretty(file)
            .map_err(|e| format!("Failed to serialize session: {}", e))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| format!("Failed to create '{}': {}", parent.display(), e))?;
        }
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| format!("Failed to write '{}': {}", tmp.display(), e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| format!("Failed to replace '{}': {}", self.path.display(), e))?;
        debug!("Session file '{}' updated", self.path.display());
        Ok(())
    }

    async fn update<F>(&self, change: F) -> Result<(), String>
    where
        F: FnOnce(&mut SessionFile),
    {
        let _guard = self.lock.lock().await;
        let mut file = self.read().await?;
        change(&mut file);
        self.write(&file).await
    }
}

#[async_trait]
impl SessionStore for FileStore {
    async fn load_tokens(&self) -> Result<Option<TokenSet>, String> {
        let _guard = self.lock.lock().await;
        Ok(self.read().await?.tokens)
    }

    async fn save_tokens(&self, tokens: &TokenSet) -> Result<(), String> {
        let tokens = tokens.clone();
        self.update(move |file| file.tokens = Some(tokens)).await
    }

    async fn clear_tokens(&self) -> Result<(), String> {
        self.update(|file| file.tokens = None).await
    }

    async fn save_pending_login(&self, pending: &PendingLogin) -> Result<(), String> {
        let pending = pending.clone();
        self.update(move |file| file.pending_login = Some(pending)).await
    }

    async fn take_pending_login(&self) -> Result<Option<PendingLogin>, String> {
        let _guard = self.lock.lock().await;
        let mut file = self.read().await?;
        let pending = file.pending_login.take();
        if pending.is_some() {
            self.write(&file).await?;
        }
        Ok(pending)
    }

    fn get_name(&self) -> &str {
        "file"
    }
}
