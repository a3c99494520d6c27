//! JSON-file fallback store used when no database is configured.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use db::models::{
    friend_list::FriendList,
    game::{Game, GameStatus},
    game_addition::GameAddition,
    share_profile::ShareProfile,
};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use super::storage::{CollectionStore, StoreBackend, StoreError};

const SNAPSHOT_FILE: &str = "collection.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LocalSnapshot {
    #[serde(default)]
    games: Vec<Game>,
    #[serde(default)]
    share_profiles: Vec<ShareProfile>,
    #[serde(default)]
    friend_lists: Vec<FriendList>,
    #[serde(default)]
    game_additions: Vec<GameAddition>,
}

impl LocalSnapshot {
    /// Same rules as the unique indexes on `games`
    fn check_game_unique(&self, game: &Game) -> Result<(), StoreError> {
        let clash = self.games.iter().any(|g| {
            g.id != game.id
                && g.user_id == game.user_id
                && (g.title.eq_ignore_ascii_case(&game.title)
                    || (game.thegamesdb_id.is_some() && g.thegamesdb_id == game.thegamesdb_id))
        });
        if clash {
            return Err(StoreError::Conflict(
                "game in collection already exists".to_string(),
            ));
        }
        Ok(())
    }

    fn check_profile_unique(&self, profile: &ShareProfile, is_insert: bool) -> Result<(), StoreError> {
        let clash = self.share_profiles.iter().any(|p| {
            (is_insert && (p.id == profile.id || p.user_id == profile.user_id))
                || (p.user_id != profile.user_id && p.share_id == profile.share_id)
        });
        if clash {
            let what = if is_insert { "share profile" } else { "share link" };
            return Err(StoreError::Conflict(format!("{what} already exists")));
        }
        Ok(())
    }
}

fn newest_first<T>(items: &mut [T], key: impl Fn(&T) -> DateTime<Utc>) {
    items.sort_by_key(|item| std::cmp::Reverse(key(item)));
}

pub struct LocalStore {
    path: PathBuf,
    snapshot: RwLock<LocalSnapshot>,
}

impl LocalStore {
    /// Load `collection.json` under `dir`, creating the directory if needed.
    /// An unreadable snapshot is moved aside to `*.corrupt` and the store starts empty.
    pub async fn open(dir: &Path) -> Result<Self, StoreError> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(SNAPSHOT_FILE);

        let snapshot = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<LocalSnapshot>(&bytes) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    let aside = path.with_extension("json.corrupt");
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "Local snapshot is unreadable, moving it aside and starting empty"
                    );
                    tokio::fs::rename(&path, &aside).await?;
                    LocalSnapshot::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => LocalSnapshot::default(),
            Err(e) => return Err(e.into()),
        };

        debug!(
            path = %path.display(),
            games = snapshot.games.len(),
            "Local store loaded"
        );

        Ok(Self {
            path,
            snapshot: RwLock::new(snapshot),
        })
    }

    async fn persist(&self, snapshot: &LocalSnapshot) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Apply `f` to a copy of the snapshot, write it out, then publish it.
    /// Nothing changes in memory if `f` fails or the write fails.
    async fn mutate<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut LocalSnapshot) -> Result<T, StoreError> + Send,
        T: Send,
    {
        let mut guard = self.snapshot.write().await;
        let mut next = guard.clone();
        let out = f(&mut next)?;
        self.persist(&next).await?;
        *guard = next;
        Ok(out)
    }
}

#[async_trait]
impl CollectionStore for LocalStore {
    fn backend(&self) -> StoreBackend {
        StoreBackend::Local
    }

    async fn list_games(
        &self,
        user_id: Uuid,
        status: Option<GameStatus>,
    ) -> Result<Vec<Game>, StoreError> {
        let snapshot = self.snapshot.read().await;
        let mut games: Vec<Game> = snapshot
            .games
            .iter()
            .filter(|g| g.user_id == user_id && status.is_none_or(|s| g.status == s))
            .cloned()
            .collect();
        newest_first(&mut games, |g| g.created_at);
        Ok(games)
    }

    async fn get_game(&self, id: Uuid) -> Result<Option<Game>, StoreError> {
        let snapshot = self.snapshot.read().await;
        Ok(snapshot.games.iter().find(|g| g.id == id).cloned())
    }

    async fn insert_game(&self, game: &Game) -> Result<(), StoreError> {
        self.mutate(|s| {
            s.check_game_unique(game)?;
            if s.games.iter().any(|g| g.id == game.id) {
                return Err(StoreError::Conflict("game id already exists".to_string()));
            }
            s.games.push(game.clone());
            Ok(())
        })
        .await
    }

    async fn update_game(&self, game: &Game) -> Result<bool, StoreError> {
        self.mutate(|s| {
            s.check_game_unique(game)?;
            match s
                .games
                .iter_mut()
                .find(|g| g.id == game.id && g.user_id == game.user_id)
            {
                Some(existing) => {
                    *existing = Game {
                        created_at: existing.created_at,
                        ..game.clone()
                    };
                    Ok(true)
                }
                None => Ok(false),
            }
        })
        .await
    }

    async fn delete_game(&self, id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        self.mutate(|s| {
            let before = s.games.len();
            s.games.retain(|g| !(g.id == id && g.user_id == user_id));
            Ok(s.games.len() != before)
        })
        .await
    }

    async fn share_profile_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Option<ShareProfile>, StoreError> {
        let snapshot = self.snapshot.read().await;
        Ok(snapshot
            .share_profiles
            .iter()
            .find(|p| p.user_id == user_id)
            .cloned())
    }

    async fn share_profile_by_share_id(
        &self,
        share_id: &str,
    ) -> Result<Option<ShareProfile>, StoreError> {
        let snapshot = self.snapshot.read().await;
        Ok(snapshot
            .share_profiles
            .iter()
            .find(|p| p.share_id == share_id)
            .cloned())
    }

    async fn insert_share_profile(&self, profile: &ShareProfile) -> Result<(), StoreError> {
        self.mutate(|s| {
            s.check_profile_unique(profile, true)?;
            s.share_profiles.push(profile.clone());
            Ok(())
        })
        .await
    }

    async fn update_share_profile(&self, profile: &ShareProfile) -> Result<bool, StoreError> {
        self.mutate(|s| {
            s.check_profile_unique(profile, false)?;
            match s
                .share_profiles
                .iter_mut()
                .find(|p| p.user_id == profile.user_id)
            {
                Some(existing) => {
                    existing.share_id = profile.share_id.clone();
                    existing.display_name = profile.display_name.clone();
                    existing.bio = profile.bio.clone();
                    existing.is_public = profile.is_public;
                    existing.updated_at = profile.updated_at;
                    Ok(true)
                }
                None => Ok(false),
            }
        })
        .await
    }

    async fn friends_for_user(&self, user_id: Uuid) -> Result<Vec<FriendList>, StoreError> {
        let snapshot = self.snapshot.read().await;
        let mut edges: Vec<FriendList> = snapshot
            .friend_lists
            .iter()
            .filter(|f| f.user_id == user_id)
            .cloned()
            .collect();
        newest_first(&mut edges, |f| f.created_at);
        Ok(edges)
    }

    async fn friend_edge(&self, id: Uuid) -> Result<Option<FriendList>, StoreError> {
        let snapshot = self.snapshot.read().await;
        Ok(snapshot.friend_lists.iter().find(|f| f.id == id).cloned())
    }

    async fn followers_of(&self, share_id: &str) -> Result<Vec<FriendList>, StoreError> {
        let snapshot = self.snapshot.read().await;
        let mut edges: Vec<FriendList> = snapshot
            .friend_lists
            .iter()
            .filter(|f| f.friend_share_id == share_id)
            .cloned()
            .collect();
        newest_first(&mut edges, |f| f.created_at);
        Ok(edges)
    }

    async fn insert_friend(&self, edge: &FriendList) -> Result<(), StoreError> {
        self.mutate(|s| {
            let clash = s.friend_lists.iter().any(|f| {
                f.id == edge.id
                    || (f.user_id == edge.user_id && f.friend_share_id == edge.friend_share_id)
            });
            if clash {
                return Err(StoreError::Conflict("follow already exists".to_string()));
            }
            s.friend_lists.push(edge.clone());
            Ok(())
        })
        .await
    }

    async fn rename_friend(
        &self,
        id: Uuid,
        user_id: Uuid,
        nickname: &str,
    ) -> Result<bool, StoreError> {
        self.mutate(|s| {
            match s
                .friend_lists
                .iter_mut()
                .find(|f| f.id == id && f.user_id == user_id)
            {
                Some(edge) => {
                    edge.nickname = nickname.to_string();
                    Ok(true)
                }
                None => Ok(false),
            }
        })
        .await
    }

    async fn delete_friend(&self, id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        self.mutate(|s| {
            let before = s.friend_lists.len();
            s.friend_lists
                .retain(|f| !(f.id == id && f.user_id == user_id));
            Ok(s.friend_lists.len() != before)
        })
        .await
    }

    async fn record_addition(&self, addition: &GameAddition) -> Result<(), StoreError> {
        self.mutate(|s| {
            s.game_additions.push(addition.clone());
            Ok(())
        })
        .await
    }

    async fn additions_since(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<GameAddition>, StoreError> {
        let snapshot = self.snapshot.read().await;
        let mut additions: Vec<GameAddition> = snapshot
            .game_additions
            .iter()
            .filter(|a| a.added_at >= cutoff)
            .cloned()
            .collect();
        newest_first(&mut additions, |a| a.added_at);
        Ok(additions)
    }

    async fn prune_additions(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        self.mutate(|s| {
            let before = s.game_additions.len();
            s.game_additions.retain(|a| a.added_at >= cutoff);
            Ok((before - s.game_additions.len()) as u64)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use db::models::game::CreateGame;

    use super::*;

    fn game(user: Uuid, title: &str, catalog_id: Option<i64>) -> Game {
        let data = CreateGame {
            thegamesdb_id: catalog_id,
            ..CreateGame::titled(title, GameStatus::Owned)
        };
        Game::new(Uuid::new_v4(), user, data, Utc::now())
    }

    fn profile(user: Uuid, share_id: &str) -> ShareProfile {
        let now = Utc::now();
        ShareProfile {
            id: Uuid::new_v4(),
            user_id: user,
            share_id: share_id.to_string(),
            display_name: "Shelf".to_string(),
            bio: None,
            is_public: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let user = Uuid::new_v4();
        {
            let store = LocalStore::open(dir.path()).await.unwrap();
            store.insert_game(&game(user, "Kirby", Some(3))).await.unwrap();
            store
                .insert_share_profile(&profile(user, "kirbyfan0001"))
                .await
                .unwrap();
        }

        let store = LocalStore::open(dir.path()).await.unwrap();
        let games = store.list_games(user, None).await.unwrap();
        assert_eq!(games.len(), 1);
        assert_eq!(games[0].title, "Kirby");
        assert!(
            store
                .share_profile_by_share_id("kirbyfan0001")
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn enforces_the_same_uniqueness_as_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path()).await.unwrap();
        let user = Uuid::new_v4();
        store.insert_game(&game(user, "Pikmin 4", Some(9))).await.unwrap();

        let err = store.insert_game(&game(user, "PIKMIN 4", None)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        let err = store.insert_game(&game(user, "Other", Some(9))).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        store
            .insert_game(&game(Uuid::new_v4(), "Pikmin 4", Some(9)))
            .await
            .unwrap();

        store.insert_share_profile(&profile(user, "sameid000001")).await.unwrap();
        let err = store
            .insert_share_profile(&profile(Uuid::new_v4(), "sameid000001"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn failed_mutation_leaves_state_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path()).await.unwrap();
        let user = Uuid::new_v4();
        let first = game(user, "Bayonetta 3", None);
        store.insert_game(&first).await.unwrap();
        let second = game(user, "Astral Chain", None);
        store.insert_game(&second).await.unwrap();

        let mut renamed = second.clone();
        renamed.title = "bayonetta 3".to_string();
        assert!(store.update_game(&renamed).await.is_err());

        let stored = store.get_game(second.id).await.unwrap().unwrap();
        assert_eq!(stored.title, "Astral Chain");
    }

    #[tokio::test]
    async fn corrupt_snapshot_is_moved_aside() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join(SNAPSHOT_FILE), b"{not json")
            .await
            .unwrap();

        let store = LocalStore::open(dir.path()).await.unwrap();
        assert!(store.list_games(Uuid::new_v4(), None).await.unwrap().is_empty());
        assert!(dir.path().join("collection.json.corrupt").exists());
    }

    #[tokio::test]
    async fn prunes_old_additions() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path()).await.unwrap();
        let now = Utc::now();
        let user = Uuid::new_v4();
        store
            .record_addition(&GameAddition::new(user, 1, "a".into(), now - Duration::days(100)))
            .await
            .unwrap();
        store
            .record_addition(&GameAddition::new(user, 2, "b".into(), now))
            .await
            .unwrap();

        assert_eq!(store.prune_additions(now - Duration::days(90)).await.unwrap(), 1);
        let left = store.additions_since(now - Duration::days(365)).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].thegamesdb_id, 2);
    }
}
