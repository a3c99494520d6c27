//! Share profiles and the public, read-only view of a collection.

use std::sync::Arc;

use chrono::Utc;
use db::models::{
    game::{CompletionStatus, Game, GameFormat, GameStatus},
    share_profile::{ShareProfile, UpsertShareProfile},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use ts_rs::TS;
use utils::token;
use uuid::Uuid;

use super::storage::{CollectionStore, StoreError};

pub const MAX_DISPLAY_NAME_LEN: usize = 50;
const MAX_BIO_LEN: usize = 280;
/// Attempts at drawing a share id that is not already taken
const SHARE_ID_ATTEMPTS: usize = 3;

#[derive(Debug, Error)]
pub enum SharingError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{0}")]
    Validation(String),
    #[error("share profile not found")]
    NotFound,
}

/// A game as visible through a share link; price and notes stay private
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct SharedGame {
    pub title: String,
    pub status: GameStatus,
    pub format: Option<GameFormat>,
    pub completion: CompletionStatus,
    pub thegamesdb_id: Option<i64>,
    pub cover_url: Option<String>,
    pub release_date: Option<String>,
    pub genres: Vec<String>,
}

impl From<Game> for SharedGame {
    fn from(game: Game) -> Self {
        Self {
            title: game.title,
            status: game.status,
            format: game.format,
            completion: game.completion,
            thegamesdb_id: game.thegamesdb_id,
            cover_url: game.cover_url,
            release_date: game.release_date,
            genres: game.genres.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct SharedCollection {
    pub share_id: String,
    pub display_name: String,
    pub bio: Option<String>,
    pub owned: Vec<SharedGame>,
    pub wishlist: Vec<SharedGame>,
}

fn clean_profile_input(
    data: UpsertShareProfile,
) -> Result<(String, Option<String>), SharingError> {
    let display_name = data.display_name.trim().to_string();
    if display_name.is_empty() {
        return Err(SharingError::Validation(
            "display_name is required".to_string(),
        ));
    }
    if display_name.chars().count() > MAX_DISPLAY_NAME_LEN {
        return Err(SharingError::Validation(format!(
            "display_name must be at most {MAX_DISPLAY_NAME_LEN} characters"
        )));
    }
    let bio = data
        .bio
        .map(|b| b.trim().to_string())
        .filter(|b| !b.is_empty());
    if bio.as_ref().is_some_and(|b| b.chars().count() > MAX_BIO_LEN) {
        return Err(SharingError::Validation(format!(
            "bio must be at most {MAX_BIO_LEN} characters"
        )));
    }
    Ok((display_name, bio))
}

#[derive(Clone)]
pub struct SharingService {
    store: Arc<dyn CollectionStore>,
}

impl SharingService {
    pub fn new(store: Arc<dyn CollectionStore>) -> Self {
        Self { store }
    }

    pub async fn get_profile(&self, user_id: Uuid) -> Result<Option<ShareProfile>, SharingError> {
        Ok(self.store.share_profile_for_user(user_id).await?)
    }

    /// Create the profile (with a fresh share id) or update its display metadata
    pub async fn upsert_profile(
        &self,
        user_id: Uuid,
        data: UpsertShareProfile,
    ) -> Result<ShareProfile, SharingError> {
        let (display_name, bio) = clean_profile_input(data)?;
        let now = Utc::now();

        if let Some(mut profile) = self.store.share_profile_for_user(user_id).await? {
            profile.display_name = display_name;
            profile.bio = bio;
            profile.updated_at = now;
            self.store.update_share_profile(&profile).await?;
            return Ok(profile);
        }

        let mut profile = ShareProfile {
            id: Uuid::new_v4(),
            user_id,
            share_id: token::share_id(),
            display_name,
            bio,
            is_public: true,
            created_at: now,
            updated_at: now,
        };

        let mut attempt = 1;
        loop {
            match self.store.insert_share_profile(&profile).await {
                Ok(()) => break,
                Err(StoreError::Conflict(_)) if attempt < SHARE_ID_ATTEMPTS => {
                    // A concurrent request may have created the profile first
                    if let Some(existing) = self.store.share_profile_for_user(user_id).await? {
                        return Ok(existing);
                    }
                    profile.share_id = token::share_id();
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }

        info!(user_id = %user_id, share_id = %profile.share_id, "Share profile created");
        Ok(profile)
    }

    /// Replace the share id; the previous link stops resolving
    pub async fn regenerate_link(&self, user_id: Uuid) -> Result<ShareProfile, SharingError> {
        let mut profile = self
            .store
            .share_profile_for_user(user_id)
            .await?
            .ok_or(SharingError::NotFound)?;
        let old_share_id = profile.share_id.clone();
        profile.updated_at = Utc::now();

        let mut attempt = 1;
        loop {
            profile.share_id = token::share_id();
            match self.store.update_share_profile(&profile).await {
                Ok(true) => break,
                Ok(false) => return Err(SharingError::NotFound),
                Err(StoreError::Conflict(_)) if attempt < SHARE_ID_ATTEMPTS => attempt += 1,
                Err(e) => return Err(e.into()),
            }
        }

        info!(
            user_id = %user_id,
            old_share_id = %old_share_id,
            share_id = %profile.share_id,
            "Share link regenerated"
        );
        Ok(profile)
    }

    pub async fn set_public(
        &self,
        user_id: Uuid,
        is_public: bool,
    ) -> Result<ShareProfile, SharingError> {
        let mut profile = self
            .store
            .share_profile_for_user(user_id)
            .await?
            .ok_or(SharingError::NotFound)?;
        profile.is_public = is_public;
        profile.updated_at = Utc::now();
        if !self.store.update_share_profile(&profile).await? {
            return Err(SharingError::NotFound);
        }
        info!(user_id = %user_id, is_public, "Share visibility changed");
        Ok(profile)
    }

    /// Public profile for `share_id`. Private profiles are indistinguishable from unknown ids.
    pub async fn public_profile(&self, share_id: &str) -> Result<ShareProfile, SharingError> {
        self.store
            .share_profile_by_share_id(share_id.trim())
            .await?
            .filter(|p| p.is_public)
            .ok_or(SharingError::NotFound)
    }

    pub async fn shared_collection(&self, share_id: &str) -> Result<SharedCollection, SharingError> {
        let profile = self.public_profile(share_id).await?;
        let games = self.store.list_games(profile.user_id, None).await?;

        let (owned, wishlist): (Vec<Game>, Vec<Game>) = games
            .into_iter()
            .partition(|g| g.status == GameStatus::Owned);

        Ok(SharedCollection {
            share_id: profile.share_id,
            display_name: profile.display_name,
            bio: profile.bio,
            owned: owned.into_iter().map(SharedGame::from).collect(),
            wishlist: wishlist.into_iter().map(SharedGame::from).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::DateTime;
    use db::models::{
        friend_list::FriendList, game::CreateGame, game_addition::GameAddition,
    };

    use super::*;
    use crate::services::{
        collection::CollectionService, local_store::LocalStore, storage::StoreBackend,
    };

    /// Local store whose share profile writes report a taken share id a set number of times
    struct TakenShareIds {
        inner: LocalStore,
        conflicts_left: AtomicUsize,
        writes: AtomicUsize,
    }

    impl TakenShareIds {
        fn conflict(&self) -> Option<StoreError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.conflicts_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .ok()
                .map(|_| StoreError::Conflict("share_id taken".to_string()))
        }
    }

    #[async_trait]
    impl CollectionStore for TakenShareIds {
        fn backend(&self) -> StoreBackend {
            self.inner.backend()
        }

        async fn list_games(
            &self,
            user_id: Uuid,
            status: Option<GameStatus>,
        ) -> Result<Vec<Game>, StoreError> {
            self.inner.list_games(user_id, status).await
        }

        async fn get_game(&self, id: Uuid) -> Result<Option<Game>, StoreError> {
            self.inner.get_game(id).await
        }

        async fn insert_game(&self, game: &Game) -> Result<(), StoreError> {
            self.inner.insert_game(game).await
        }

        async fn update_game(&self, game: &Game) -> Result<bool, StoreError> {
            self.inner.update_game(game).await
        }

        async fn delete_game(&self, id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
            self.inner.delete_game(id, user_id).await
        }

        async fn share_profile_for_user(
            &self,
            user_id: Uuid,
        ) -> Result<Option<ShareProfile>, StoreError> {
            self.inner.share_profile_for_user(user_id).await
        }

        async fn share_profile_by_share_id(
            &self,
            share_id: &str,
        ) -> Result<Option<ShareProfile>, StoreError> {
            self.inner.share_profile_by_share_id(share_id).await
        }

        async fn insert_share_profile(&self, profile: &ShareProfile) -> Result<(), StoreError> {
            match self.conflict() {
                Some(err) => Err(err),
                None => self.inner.insert_share_profile(profile).await,
            }
        }

        async fn update_share_profile(&self, profile: &ShareProfile) -> Result<bool, StoreError> {
            match self.conflict() {
                Some(err) => Err(err),
                None => self.inner.update_share_profile(profile).await,
            }
        }

        async fn friends_for_user(&self, user_id: Uuid) -> Result<Vec<FriendList>, StoreError> {
            self.inner.friends_for_user(user_id).await
        }

        async fn friend_edge(&self, id: Uuid) -> Result<Option<FriendList>, StoreError> {
            self.inner.friend_edge(id).await
        }

        async fn followers_of(&self, share_id: &str) -> Result<Vec<FriendList>, StoreError> {
            self.inner.followers_of(share_id).await
        }

        async fn insert_friend(&self, edge: &FriendList) -> Result<(), StoreError> {
            self.inner.insert_friend(edge).await
        }

        async fn rename_friend(
            &self,
            id: Uuid,
            user_id: Uuid,
            nickname: &str,
        ) -> Result<bool, StoreError> {
            self.inner.rename_friend(id, user_id, nickname).await
        }

        async fn delete_friend(&self, id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
            self.inner.delete_friend(id, user_id).await
        }

        async fn record_addition(&self, addition: &GameAddition) -> Result<(), StoreError> {
            self.inner.record_addition(addition).await
        }

        async fn additions_since(
            &self,
            cutoff: DateTime<Utc>,
        ) -> Result<Vec<GameAddition>, StoreError> {
            self.inner.additions_since(cutoff).await
        }

        async fn prune_additions(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
            self.inner.prune_additions(cutoff).await
        }
    }

    async fn taken_ids(
        dir: &tempfile::TempDir,
        conflicts: usize,
    ) -> (SharingService, Arc<TakenShareIds>) {
        let store = Arc::new(TakenShareIds {
            inner: LocalStore::open(dir.path()).await.unwrap(),
            conflicts_left: AtomicUsize::new(conflicts),
            writes: AtomicUsize::new(0),
        });
        (SharingService::new(store.clone()), store)
    }

    async fn setup() -> (SharingService, CollectionService, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn CollectionStore> =
            Arc::new(LocalStore::open(dir.path()).await.unwrap());
        (
            SharingService::new(store.clone()),
            CollectionService::new(store, None),
            dir,
        )
    }

    fn named(name: &str) -> UpsertShareProfile {
        UpsertShareProfile {
            display_name: name.to_string(),
            bio: None,
        }
    }

    #[tokio::test]
    async fn upsert_creates_once_then_updates() {
        let (sharing, _, _dir) = setup().await;
        let user = Uuid::new_v4();

        let created = sharing.upsert_profile(user, named(" Link ")).await.unwrap();
        assert_eq!(created.display_name, "Link");
        assert!(created.is_public);

        let updated = sharing
            .upsert_profile(
                user,
                UpsertShareProfile {
                    display_name: "Hero of Time".to_string(),
                    bio: Some("  hyrule  ".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.share_id, created.share_id);
        assert_eq!(updated.bio.as_deref(), Some("hyrule"));
    }

    #[tokio::test]
    async fn display_name_is_validated() {
        let (sharing, _, _dir) = setup().await;
        let err = sharing
            .upsert_profile(Uuid::new_v4(), named("   "))
            .await
            .unwrap_err();
        assert!(matches!(err, SharingError::Validation(_)));

        let long = "x".repeat(MAX_DISPLAY_NAME_LEN + 1);
        let err = sharing
            .upsert_profile(Uuid::new_v4(), named(&long))
            .await
            .unwrap_err();
        assert!(matches!(err, SharingError::Validation(_)));
    }

    #[tokio::test]
    async fn shared_collection_splits_and_hides_private_fields() {
        let (sharing, collection, _dir) = setup().await;
        let user = Uuid::new_v4();
        collection
            .add(
                user,
                CreateGame {
                    price_paid: Some(70.0),
                    notes: Some("gift".to_string()),
                    ..CreateGame::titled("Owned Game", GameStatus::Owned)
                },
            )
            .await
            .unwrap();
        collection
            .add(user, CreateGame::titled("Wanted Game", GameStatus::Wishlist))
            .await
            .unwrap();
        let profile = sharing.upsert_profile(user, named("Samus")).await.unwrap();

        let shared = sharing.shared_collection(&profile.share_id).await.unwrap();
        assert_eq!(shared.display_name, "Samus");
        assert_eq!(shared.owned.len(), 1);
        assert_eq!(shared.wishlist.len(), 1);
        let json = serde_json::to_string(&shared).unwrap();
        assert!(!json.contains("gift"));
        assert!(!json.contains("price_paid"));
    }

    #[tokio::test]
    async fn regenerate_and_private_links_stop_resolving() {
        let (sharing, _, _dir) = setup().await;
        let user = Uuid::new_v4();
        let profile = sharing.upsert_profile(user, named("Peach")).await.unwrap();

        let regenerated = sharing.regenerate_link(user).await.unwrap();
        assert_ne!(regenerated.share_id, profile.share_id);
        assert!(matches!(
            sharing.shared_collection(&profile.share_id).await,
            Err(SharingError::NotFound)
        ));
        sharing.shared_collection(&regenerated.share_id).await.unwrap();

        sharing.set_public(user, false).await.unwrap();
        assert!(matches!(
            sharing.shared_collection(&regenerated.share_id).await,
            Err(SharingError::NotFound)
        ));
    }

    #[tokio::test]
    async fn regenerate_without_profile_is_not_found() {
        let (sharing, _, _dir) = setup().await;
        assert!(matches!(
            sharing.regenerate_link(Uuid::new_v4()).await,
            Err(SharingError::NotFound)
        ));
    }

    #[tokio::test]
    async fn taken_share_ids_are_redrawn() {
        let dir = tempfile::tempdir().unwrap();
        let (sharing, store) = taken_ids(&dir, SHARE_ID_ATTEMPTS - 1).await;
        let user = Uuid::new_v4();

        let profile = sharing.upsert_profile(user, named("Zelda")).await.unwrap();
        assert_eq!(store.writes.load(Ordering::SeqCst), SHARE_ID_ATTEMPTS);
        assert_eq!(
            sharing.public_profile(&profile.share_id).await.unwrap().user_id,
            user
        );

        store
            .conflicts_left
            .store(SHARE_ID_ATTEMPTS - 1, Ordering::SeqCst);
        store.writes.store(0, Ordering::SeqCst);
        let regenerated = sharing.regenerate_link(user).await.unwrap();
        assert_eq!(store.writes.load(Ordering::SeqCst), SHARE_ID_ATTEMPTS);
        assert_ne!(regenerated.share_id, profile.share_id);
    }

    #[tokio::test]
    async fn share_id_conflicts_surface_after_the_last_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let (sharing, store) = taken_ids(&dir, SHARE_ID_ATTEMPTS).await;
        let user = Uuid::new_v4();

        assert!(matches!(
            sharing.upsert_profile(user, named("Ganon")).await,
            Err(SharingError::Store(StoreError::Conflict(_)))
        ));
        assert_eq!(store.writes.load(Ordering::SeqCst), SHARE_ID_ATTEMPTS);
        assert!(sharing.get_profile(user).await.unwrap().is_none());

        let profile = sharing.upsert_profile(user, named("Ganon")).await.unwrap();
        store.conflicts_left.store(SHARE_ID_ATTEMPTS, Ordering::SeqCst);
        assert!(matches!(
            sharing.regenerate_link(user).await,
            Err(SharingError::Store(StoreError::Conflict(_)))
        ));
        assert_eq!(
            sharing.get_profile(user).await.unwrap().unwrap().share_id,
            profile.share_id
        );
    }
}
