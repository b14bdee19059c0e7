// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity store wrapper with typed operations.
//!
//! Provides:
//! - User lookup and paged listing
//! - Public/private metadata updates
//!
//! The remote backend talks to the hosted identity provider. The in-memory
//! backend holds users in a map and is used for local development and tests.

use crate::db::clerk::ClerkClient;
use crate::error::AppError;
use crate::models::UserIdentity;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Page size used when walking every identity.
pub const USER_PAGE_SIZE: u32 = 100;

/// Identity store client.
#[derive(Clone)]
pub struct IdentityDb {
    backend: Backend,
}

#[derive(Clone)]
enum Backend {
    Remote(ClerkClient),
    Memory(Arc<RwLock<BTreeMap<String, UserIdentity>>>),
}

impl IdentityDb {
    /// Create a client for the hosted identity provider.
    pub fn new_remote(api_url: &str, secret_key: &str) -> Result<Self, AppError> {
        let client = ClerkClient::new(api_url, secret_key)?;
        tracing::info!(api_url, "Using hosted identity provider");
        Ok(Self {
            backend: Backend::Remote(client),
        })
    }

    /// Create an empty in-memory store.
    pub fn new_memory() -> Self {
        Self {
            backend: Backend::Memory(Arc::new(RwLock::new(BTreeMap::new()))),
        }
    }

    /// Insert or replace a user (in-memory backend only).
    pub async fn insert_user(&self, user: UserIdentity) -> Result<(), AppError> {
        match &self.backend {
            Backend::Memory(users) => {
                users.write().await.insert(user.id.clone(), user);
                Ok(())
            }
            Backend::Remote(_) => Err(AppError::Internal(anyhow::anyhow!(
                "Users are created by the identity provider, not by this service"
            ))),
        }
    }

    // ─── Reads ───────────────────────────────────────────────────

    /// Get a user by id.
    pub async fn get_user(&self, user_id: &str) -> Result<Option<UserIdentity>, AppError> {
        match &self.backend {
            Backend::Remote(client) => client.get_user(user_id).await,
            Backend::Memory(users) => Ok(users.read().await.get(user_id).cloned()),
        }
    }

    /// Get one page of users.
    pub async fn list_users(&self, limit: u32, offset: u32) -> Result<Vec<UserIdentity>, AppError> {
        match &self.backend {
            Backend::Remote(client) => client.list_users(limit, offset).await,
            Backend::Memory(users) => Ok(users
                .read()
                .await
                .values()
                .skip(offset as usize)
                .take(limit as usize)
                .cloned()
                .collect()),
        }
    }

    /// Walk every page of users until a page comes back short.
    pub async fn all_users(&self) -> Result<Vec<UserIdentity>, AppError> {
        let mut all = Vec::new();
        let mut offset = 0;

        loop {
            let page = self.list_users(USER_PAGE_SIZE, offset).await?;
            let fetched = page.len() as u32;
            all.extend(page);

            if fetched < USER_PAGE_SIZE {
                break;
            }
            offset += fetched;
        }

        tracing::debug!(count = all.len(), "Listed all identities");
        Ok(all)
    }

    /// Find the first user matching `predicate`, paging lazily.
    pub async fn find_user<F>(&self, predicate: F) -> Result<Option<UserIdentity>, AppError>
    where
        F: Fn(&UserIdentity) -> bool,
    {
        let mut offset = 0;

        loop {
            let page = self.list_users(USER_PAGE_SIZE, offset).await?;
            let fetched = page.len() as u32;

            if let Some(user) = page.into_iter().find(|u| predicate(u)) {
                return Ok(Some(user));
            }
            if fetched < USER_PAGE_SIZE {
                return Ok(None);
            }
            offset += fetched;
        }
    }

    // ─── Writes ──────────────────────────────────────────────────

    /// Merge top-level keys into a user's public metadata.
    pub async fn update_public_metadata(
        &self,
        user_id: &str,
        patch: &Map<String, Value>,
    ) -> Result<(), AppError> {
        self.update_metadata(user_id, Some(patch), None).await
    }

    /// Merge top-level keys into a user's private metadata.
    pub async fn update_private_metadata(
        &self,
        user_id: &str,
        patch: &Map<String, Value>,
    ) -> Result<(), AppError> {
        self.update_metadata(user_id, None, Some(patch)).await
    }

    async fn update_metadata(
        &self,
        user_id: &str,
        public_patch: Option<&Map<String, Value>>,
        private_patch: Option<&Map<String, Value>>,
    ) -> Result<(), AppError> {
        match &self.backend {
            Backend::Remote(client) => {
                client
                    .update_metadata(user_id, public_patch, private_patch)
                    .await
            }
            Backend::Memory(users) => {
                let mut users = users.write().await;
                let user = users
                    .get_mut(user_id)
                    .ok_or_else(|| AppError::NotFound(format!("User {}", user_id)))?;

                if let Some(patch) = public_patch {
                    merge_top_level(&mut user.public_metadata, patch);
                }
                if let Some(patch) = private_patch {
                    merge_top_level(&mut user.private_metadata, patch);
                }
                Ok(())
            }
        }
    }
}

/// Provider merge semantics: listed keys are replaced, a `null` value deletes.
fn merge_top_level(target: &mut Map<String, Value>, patch: &Map<String, Value>) {
    for (key, value) in patch {
        if value.is_null() {
            target.remove(key);
        } else {
            target.insert(key.clone(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_all_users_walks_every_page() {
        let db = IdentityDb::new_memory();
        let total = USER_PAGE_SIZE as usize * 2 + 7;
        for i in 0..total {
            db.insert_user(UserIdentity::new(
                format!("user_{i:04}"),
                [format!("u{i}@x.com")],
            ))
            .await
            .unwrap();
        }

        let all = db.all_users().await.unwrap();
        assert_eq!(all.len(), total);

        let last = db
            .find_user(|u| u.id == format!("user_{:04}", total - 1))
            .await
            .unwrap();
        assert!(last.is_some());
    }

    #[tokio::test]
    async fn test_metadata_merge_keeps_unrelated_keys() {
        let db = IdentityDb::new_memory();
        db.insert_user(UserIdentity::new("user_1", ["a@x.com"]).with_admin_flag())
            .await
            .unwrap();

        let patch = json!({ "magicLinks": [], "stale": null });
        db.update_public_metadata("user_1", patch.as_object().unwrap())
            .await
            .unwrap();

        let user = db.get_user("user_1").await.unwrap().unwrap();
        assert!(user.is_admin());
        assert_eq!(user.public_metadata.get("magicLinks"), Some(&json!([])));
    }

    #[tokio::test]
    async fn test_update_unknown_user_is_not_found() {
        let db = IdentityDb::new_memory();
        let err = db
            .update_private_metadata("missing", &Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
