use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

/// Follow edge: `user_id` follows whoever currently owns `friend_share_id`
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS, PartialEq)]
pub struct FriendList {
    pub id: Uuid,
    pub user_id: Uuid,
    pub friend_share_id: String,
    pub nickname: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateFriendList {
    pub share_id: String,
    pub nickname: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UpdateFriendList {
    pub nickname: String,
}

impl FriendList {
    pub async fn find_by_user(pool: &SqlitePool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, FriendList>(
            r#"SELECT id, user_id, friend_share_id, nickname, created_at
               FROM friend_lists
               WHERE user_id = $1
               ORDER BY created_at DESC, rowid DESC"#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, FriendList>(
            r#"SELECT id, user_id, friend_share_id, nickname, created_at
               FROM friend_lists
               WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Edges pointing at `share_id`, i.e. the followers of its owner
    pub async fn find_by_friend_share_id(
        pool: &SqlitePool,
        share_id: &str,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, FriendList>(
            r#"SELECT id, user_id, friend_share_id, nickname, created_at
               FROM friend_lists
               WHERE friend_share_id = $1
               ORDER BY created_at DESC, rowid DESC"#,
        )
        .bind(share_id)
        .fetch_all(pool)
        .await
    }

    pub async fn create(pool: &SqlitePool, edge: &FriendList) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"INSERT INTO friend_lists (id, user_id, friend_share_id, nickname, created_at)
               VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(edge.id)
        .bind(edge.user_id)
        .bind(&edge.friend_share_id)
        .bind(&edge.nickname)
        .bind(edge.created_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn update_nickname(
        pool: &SqlitePool,
        id: Uuid,
        user_id: Uuid,
        nickname: &str,
    ) -> Result<u64, sqlx::Error> {
        let result =
            sqlx::query("UPDATE friend_lists SET nickname = $3 WHERE id = $1 AND user_id = $2")
                .bind(id)
                .bind(user_id)
                .bind(nickname)
                .execute(pool)
                .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid, user_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM friend_lists WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
