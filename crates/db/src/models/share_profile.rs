use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

/// Public, revocable link to a user's collection
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS, PartialEq)]
pub struct ShareProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub share_id: String,
    pub display_name: String,
    pub bio: Option<String>,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UpsertShareProfile {
    pub display_name: String,
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct SetShareVisibility {
    pub is_public: bool,
}

impl ShareProfile {
    pub async fn find_by_user(
        pool: &SqlitePool,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, ShareProfile>(
            r#"SELECT id, user_id, share_id, display_name, bio, is_public, created_at, updated_at
               FROM share_profiles
               WHERE user_id = $1"#,
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_share_id(
        pool: &SqlitePool,
        share_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, ShareProfile>(
            r#"SELECT id, user_id, share_id, display_name, bio, is_public, created_at, updated_at
               FROM share_profiles
               WHERE share_id = $1"#,
        )
        .bind(share_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn create(pool: &SqlitePool, profile: &ShareProfile) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"INSERT INTO share_profiles (id, user_id, share_id, display_name, bio, is_public,
                                           created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"#,
        )
        .bind(profile.id)
        .bind(profile.user_id)
        .bind(&profile.share_id)
        .bind(&profile.display_name)
        .bind(&profile.bio)
        .bind(profile.is_public)
        .bind(profile.created_at)
        .bind(profile.updated_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Write display metadata, share id and visibility for the user's profile
    pub async fn update(pool: &SqlitePool, profile: &ShareProfile) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"UPDATE share_profiles
               SET share_id = $2, display_name = $3, bio = $4, is_public = $5, updated_at = $6
               WHERE user_id = $1"#,
        )
        .bind(profile.user_id)
        .bind(&profile.share_id)
        .bind(&profile.display_name)
        .bind(&profile.bio)
        .bind(profile.is_public)
        .bind(profile.updated_at)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
