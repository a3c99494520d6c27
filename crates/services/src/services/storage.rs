//! Persistence seam: every service talks to a `CollectionStore`, backed either
//! by SQLite or by a JSON snapshot on local disk.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use db::{
    DBService,
    models::{
        friend_list::FriendList,
        game::{Game, GameStatus},
        game_addition::GameAddition,
        share_profile::ShareProfile,
    },
};
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use thiserror::Error;
use tracing::{info, warn};
use ts_rs::TS;
use uuid::Uuid;

use super::{
    config::Config,
    database_validator::{DatabaseValidationError, DatabaseValidator},
    local_store::LocalStore,
    sqlite_store::SqliteStore,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Validation(#[from] DatabaseValidationError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StoreBackend {
    Sqlite,
    Local,
}

#[async_trait]
pub trait CollectionStore: Send + Sync {
    fn backend(&self) -> StoreBackend;

    async fn list_games(
        &self,
        user_id: Uuid,
        status: Option<GameStatus>,
    ) -> Result<Vec<Game>, StoreError>;
    async fn get_game(&self, id: Uuid) -> Result<Option<Game>, StoreError>;
    async fn insert_game(&self, game: &Game) -> Result<(), StoreError>;
    /// Returns false when no row owned by `game.user_id` has `game.id`
    async fn update_game(&self, game: &Game) -> Result<bool, StoreError>;
    async fn delete_game(&self, id: Uuid, user_id: Uuid) -> Result<bool, StoreError>;

    async fn share_profile_for_user(&self, user_id: Uuid)
    -> Result<Option<ShareProfile>, StoreError>;
    async fn share_profile_by_share_id(
        &self,
        share_id: &str,
    ) -> Result<Option<ShareProfile>, StoreError>;
    async fn insert_share_profile(&self, profile: &ShareProfile) -> Result<(), StoreError>;
    async fn update_share_profile(&self, profile: &ShareProfile) -> Result<bool, StoreError>;

    async fn friends_for_user(&self, user_id: Uuid) -> Result<Vec<FriendList>, StoreError>;
    async fn friend_edge(&self, id: Uuid) -> Result<Option<FriendList>, StoreError>;
    async fn followers_of(&self, share_id: &str) -> Result<Vec<FriendList>, StoreError>;
    async fn insert_friend(&self, edge: &FriendList) -> Result<(), StoreError>;
    async fn rename_friend(
        &self,
        id: Uuid,
        user_id: Uuid,
        nickname: &str,
    ) -> Result<bool, StoreError>;
    async fn delete_friend(&self, id: Uuid, user_id: Uuid) -> Result<bool, StoreError>;

    async fn record_addition(&self, addition: &GameAddition) -> Result<(), StoreError>;
    async fn additions_since(&self, cutoff: DateTime<Utc>)
    -> Result<Vec<GameAddition>, StoreError>;
    async fn prune_additions(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;
}

/// SQLite when a database URL is configured, otherwise the local JSON store.
pub async fn open_store(config: &Config) -> Result<Arc<dyn CollectionStore>, StoreError> {
    match config.database_url.as_deref() {
        Some(url) => {
            let db = DBService::new(url).await?;
            let validation = DatabaseValidator::new(db.pool.clone()).validate().await?;
            if validation.is_ok() {
                info!("{}", validation.summary());
            } else {
                warn!(
                    missing_tables = ?validation.missing_tables,
                    "{}",
                    validation.summary()
                );
            }
            info!(backend = %StoreBackend::Sqlite, "Using SQLite storage");
            Ok(Arc::new(SqliteStore::new(db)))
        }
        None => {
            warn!(
                data_dir = %config.data_dir.display(),
                "DATABASE_URL not set, falling back to local JSON storage"
            );
            Ok(Arc::new(LocalStore::open(&config.data_dir).await?))
        }
    }
}
