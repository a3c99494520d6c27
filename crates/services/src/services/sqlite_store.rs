use async_trait::async_trait;
use chrono::{DateTime, Utc};
use db::{
    DBService, is_unique_violation,
    models::{
        friend_list::FriendList,
        game::{Game, GameStatus},
        game_addition::GameAddition,
        share_profile::ShareProfile,
    },
};
use uuid::Uuid;

use super::storage::{CollectionStore, StoreBackend, StoreError};

/// `CollectionStore` over the `db` crate models
#[derive(Clone)]
pub struct SqliteStore {
    db: DBService,
}

impl SqliteStore {
    pub fn new(db: DBService) -> Self {
        Self { db }
    }
}

/// Unique-constraint failures become `Conflict` so both backends report duplicates alike.
fn conflict_or(err: sqlx::Error, what: &str) -> StoreError {
    if is_unique_violation(&err) {
        StoreError::Conflict(format!("{what} already exists"))
    } else {
        StoreError::Database(err)
    }
}

#[async_trait]
impl CollectionStore for SqliteStore {
    fn backend(&self) -> StoreBackend {
        StoreBackend::Sqlite
    }

    async fn list_games(
        &self,
        user_id: Uuid,
        status: Option<GameStatus>,
    ) -> Result<Vec<Game>, StoreError> {
        Ok(Game::find_by_user(&self.db.pool, user_id, status).await?)
    }

    async fn get_game(&self, id: Uuid) -> Result<Option<Game>, StoreError> {
        Ok(Game::find_by_id(&self.db.pool, id).await?)
    }

    async fn insert_game(&self, game: &Game) -> Result<(), StoreError> {
        Game::create(&self.db.pool, game)
            .await
            .map_err(|e| conflict_or(e, "game in collection"))
    }

    async fn update_game(&self, game: &Game) -> Result<bool, StoreError> {
        let rows = Game::update(&self.db.pool, game)
            .await
            .map_err(|e| conflict_or(e, "game in collection"))?;
        Ok(rows > 0)
    }

    async fn delete_game(&self, id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        Ok(Game::delete(&self.db.pool, id, user_id).await? > 0)
    }

    async fn share_profile_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Option<ShareProfile>, StoreError> {
        Ok(ShareProfile::find_by_user(&self.db.pool, user_id).await?)
    }

    async fn share_profile_by_share_id(
        &self,
        share_id: &str,
    ) -> Result<Option<ShareProfile>, StoreError> {
        Ok(ShareProfile::find_by_share_id(&self.db.pool, share_id).await?)
    }

    async fn insert_share_profile(&self, profile: &ShareProfile) -> Result<(), StoreError> {
        ShareProfile::create(&self.db.pool, profile)
            .await
            .map_err(|e| conflict_or(e, "share profile"))
    }

    async fn update_share_profile(&self, profile: &ShareProfile) -> Result<bool, StoreError> {
        let rows = ShareProfile::update(&self.db.pool, profile)
            .await
            .map_err(|e| conflict_or(e, "share link"))?;
        Ok(rows > 0)
    }

    async fn friends_for_user(&self, user_id: Uuid) -> Result<Vec<FriendList>, StoreError> {
        Ok(FriendList::find_by_user(&self.db.pool, user_id).await?)
    }

    async fn friend_edge(&self, id: Uuid) -> Result<Option<FriendList>, StoreError> {
        Ok(FriendList::find_by_id(&self.db.pool, id).await?)
    }

    async fn followers_of(&self, share_id: &str) -> Result<Vec<FriendList>, StoreError> {
        Ok(FriendList::find_by_friend_share_id(&self.db.pool, share_id).await?)
    }

    async fn insert_friend(&self, edge: &FriendList) -> Result<(), StoreError> {
        FriendList::create(&self.db.pool, edge)
            .await
            .map_err(|e| conflict_or(e, "follow"))
    }

    async fn rename_friend(
        &self,
        id: Uuid,
        user_id: Uuid,
        nickname: &str,
    ) -> Result<bool, StoreError> {
        Ok(FriendList::update_nickname(&self.db.pool, id, user_id, nickname).await? > 0)
    }

    async fn delete_friend(&self, id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        Ok(FriendList::delete(&self.db.pool, id, user_id).await? > 0)
    }

    async fn record_addition(&self, addition: &GameAddition) -> Result<(), StoreError> {
        Ok(GameAddition::create(&self.db.pool, addition).await?)
    }

    async fn additions_since(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<GameAddition>, StoreError> {
        Ok(GameAddition::find_since(&self.db.pool, cutoff).await?)
    }

    async fn prune_additions(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        Ok(GameAddition::delete_before(&self.db.pool, cutoff).await?)
    }
}
