//! JSON-backed token pool.
//!
//! The pool file is the source of truth: every lookup re-reads it and every
//! mutation is written through under the file lock before the call returns,
//! so a freeze is visible to every worker and every process sharing the file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use curator_core::{CoreError, Token, TokenPool};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::persistence::{Change, SharedJson};

/// On-disk shape of the pool.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct TokenFile {
    #[serde(default)]
    tokens: Vec<Token>,
}

/// Token pool shared by every curation attempt.
#[derive(Clone)]
pub struct TokenStore {
    file: SharedJson<TokenFile>,
}

impl TokenStore {
    /// Creates an in-memory pool.
    pub fn in_memory(tokens: Vec<Token>) -> Self {
        Self {
            file: SharedJson::in_memory(TokenFile { tokens }),
        }
    }

    /// Opens the pool stored at `path` (empty if the file does not exist).
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed.
    pub async fn load(path: PathBuf) -> Result<Self, StoreError> {
        let file = SharedJson::open(path).await?;
        let tokens = file.read(|pool: &TokenFile| pool.tokens.len()).await?;
        if let Some(path) = file.path() {
            info!(path = %path.display(), tokens, "Loaded token pool");
        }
        Ok(Self { file })
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.file.path()
    }

    async fn update_token<F>(&self, access_token: &str, update: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Token) + Send,
    {
        self.file
            .update(|pool| {
                let token = pool
                    .tokens
                    .iter_mut()
                    .find(|token| token.access_token == access_token)
                    .ok_or_else(|| StoreError::TokenNotFound(access_token.chars().take(8).collect()))?;
                update(token);
                token.updated_at = Utc::now();
                Ok(Change::Changed(()))
            })
            .await
    }

    /// Removes a token from the pool. Returns whether it was present.
    ///
    /// # Errors
    ///
    /// Returns error if the pool cannot be written.
    pub async fn remove(&self, access_token: &str) -> Result<bool, StoreError> {
        self.file
            .update(|pool| {
                let before = pool.tokens.len();
                pool.tokens.retain(|token| token.access_token != access_token);
                Ok(if pool.tokens.len() == before {
                    Change::Unchanged(false)
                } else {
                    Change::Changed(true)
                })
            })
            .await
    }
}

#[async_trait]
impl TokenPool for TokenStore {
    async fn find_first_unfrozen_token(&self) -> Result<Option<Token>, CoreError> {
        let now = Utc::now();
        Ok(self
            .file
            .read(|pool| pool.tokens.iter().find(|token| token.is_usable_at(now)).cloned())
            .await?)
    }

    async fn find_first_frozen_token(&self) -> Result<Option<Token>, CoreError> {
        let now = Utc::now();
        Ok(self
            .file
            .read(|pool| {
                pool.tokens
                    .iter()
                    .filter(|token| token.is_frozen_at(now))
                    .min_by_key(|token| token.frozen_until)
                    .cloned()
            })
            .await?)
    }

    async fn find_by_access_token(&self, access_token: &str) -> Result<Option<Token>, CoreError> {
        Ok(self
            .file
            .read(|pool| {
                pool.tokens
                    .iter()
                    .find(|token| token.access_token == access_token)
                    .cloned()
            })
            .await?)
    }

    async fn freeze(&self, access_token: &str, until: DateTime<Utc>) -> Result<(), CoreError> {
        self.update_token(access_token, |token| token.frozen_until = Some(until))
            .await?;
        debug!(until = %until, "Token frozen");
        Ok(())
    }

    async fn unfreeze(&self, access_token: &str) -> Result<(), CoreError> {
        self.update_token(access_token, |token| token.frozen_until = None)
            .await?;
        Ok(())
    }

    async fn ensure_token(&self, token: Token) -> Result<Token, CoreError> {
        Ok(self
            .file
            .update(|pool| {
                if let Some(existing) = pool
                    .tokens
                    .iter()
                    .find(|existing| existing.access_token == token.access_token)
                {
                    return Ok(Change::Unchanged(existing.clone()));
                }

                info!(token = token.prefix(), "Adding token to the pool");
                let token = token.with_frozen_until(None);
                pool.tokens.push(token.clone());
                Ok(Change::Changed(token))
            })
            .await?)
    }

    async fn tokens(&self) -> Result<Vec<Token>, CoreError> {
        Ok(self.file.read(|pool| pool.tokens.clone()).await?)
    }

    async fn count(&self) -> Result<usize, CoreError> {
        Ok(self.file.read(|pool| pool.tokens.len()).await?)
    }
}

// ============================================================================
// Tests
// ============================================================================
