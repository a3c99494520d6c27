//! Follow edges between collectors, keyed by the followed user's share id.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use db::models::{
    friend_list::{CreateFriendList, FriendList, UpdateFriendList},
    game::GameStatus,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use ts_rs::TS;
use uuid::Uuid;

use super::{
    sharing::MAX_DISPLAY_NAME_LEN,
    storage::{CollectionStore, StoreError},
};

#[derive(Debug, Error)]
pub enum FriendsError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{0}")]
    Validation(String),
    #[error("not found")]
    NotFound,
}

/// A followed collection with its current public metadata
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct FollowedProfile {
    #[serde(flatten)]
    #[ts(flatten)]
    pub edge: FriendList,
    /// False once the link was regenerated or made private
    pub available: bool,
    pub display_name: Option<String>,
    pub owned_count: Option<usize>,
    pub wishlist_count: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Follower {
    pub user_id: Uuid,
    pub followed_at: DateTime<Utc>,
    /// Present when the follower shares their own public collection
    pub share_id: Option<String>,
    pub display_name: Option<String>,
}

fn clean_nickname(nickname: &str) -> Result<String, FriendsError> {
    let nickname = nickname.trim();
    if nickname.is_empty() {
        return Err(FriendsError::Validation("nickname is required".to_string()));
    }
    if nickname.chars().count() > MAX_DISPLAY_NAME_LEN {
        return Err(FriendsError::Validation(format!(
            "nickname must be at most {MAX_DISPLAY_NAME_LEN} characters"
        )));
    }
    Ok(nickname.to_string())
}

#[derive(Clone)]
pub struct FriendsService {
    store: Arc<dyn CollectionStore>,
}

impl FriendsService {
    pub fn new(store: Arc<dyn CollectionStore>) -> Self {
        Self { store }
    }

    pub async fn follow(
        &self,
        user_id: Uuid,
        request: CreateFriendList,
    ) -> Result<FriendList, FriendsError> {
        let share_id = request.share_id.trim();
        let profile = self
            .store
            .share_profile_by_share_id(share_id)
            .await?
            .filter(|p| p.is_public)
            .ok_or(FriendsError::NotFound)?;

        if profile.user_id == user_id {
            return Err(FriendsError::Validation(
                "you cannot follow your own collection".to_string(),
            ));
        }

        let nickname = match request.nickname.as_deref().map(str::trim) {
            Some(n) if !n.is_empty() => clean_nickname(n)?,
            _ => profile.display_name.clone(),
        };

        let edge = FriendList {
            id: Uuid::new_v4(),
            user_id,
            friend_share_id: profile.share_id,
            nickname,
            created_at: Utc::now(),
        };
        self.store.insert_friend(&edge).await?;

        info!(
            user_id = %user_id,
            share_id = %edge.friend_share_id,
            "Now following collection"
        );
        Ok(edge)
    }

    pub async fn rename(
        &self,
        user_id: Uuid,
        edge_id: Uuid,
        request: UpdateFriendList,
    ) -> Result<FriendList, FriendsError> {
        let nickname = clean_nickname(&request.nickname)?;
        if !self.store.rename_friend(edge_id, user_id, &nickname).await? {
            return Err(FriendsError::NotFound);
        }
        self.store
            .friend_edge(edge_id)
            .await?
            .ok_or(FriendsError::NotFound)
    }

    pub async fn unfollow(&self, user_id: Uuid, edge_id: Uuid) -> Result<(), FriendsError> {
        if !self.store.delete_friend(edge_id, user_id).await? {
            return Err(FriendsError::NotFound);
        }
        info!(user_id = %user_id, edge_id = %edge_id, "Unfollowed collection");
        Ok(())
    }

    pub async fn following(&self, user_id: Uuid) -> Result<Vec<FollowedProfile>, FriendsError> {
        let edges = self.store.friends_for_user(user_id).await?;
        let mut out = Vec::with_capacity(edges.len());

        for edge in edges {
            let profile = self
                .store
                .share_profile_by_share_id(&edge.friend_share_id)
                .await?
                .filter(|p| p.is_public);

            let followed = match profile {
                Some(profile) => {
                    let games = self.store.list_games(profile.user_id, None).await?;
                    let owned = games
                        .iter()
                        .filter(|g| g.status == GameStatus::Owned)
                        .count();
                    FollowedProfile {
                        edge,
                        available: true,
                        display_name: Some(profile.display_name),
                        owned_count: Some(owned),
                        wishlist_count: Some(games.len() - owned),
                    }
                }
                None => FollowedProfile {
                    edge,
                    available: false,
                    display_name: None,
                    owned_count: None,
                    wishlist_count: None,
                },
            };
            out.push(followed);
        }

        Ok(out)
    }

    /// Users following the caller's current share id
    pub async fn followers(&self, user_id: Uuid) -> Result<Vec<Follower>, FriendsError> {
        let Some(profile) = self.store.share_profile_for_user(user_id).await? else {
            return Ok(Vec::new());
        };

        let edges = self.store.followers_of(&profile.share_id).await?;
        let mut out = Vec::with_capacity(edges.len());
        for edge in edges {
            let theirs = self
                .store
                .share_profile_for_user(edge.user_id)
                .await?
                .filter(|p| p.is_public);
            out.push(Follower {
                user_id: edge.user_id,
                followed_at: edge.created_at,
                share_id: theirs.as_ref().map(|p| p.share_id.clone()),
                display_name: theirs.map(|p| p.display_name),
            });
        }
        Ok(out)
    }
}
