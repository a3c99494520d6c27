use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

/// One row per catalog game added to any collection; feeds trending
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS, PartialEq)]
pub struct GameAddition {
    pub id: Uuid,
    pub user_id: Uuid,
    pub thegamesdb_id: i64,
    pub title: String,
    pub added_at: DateTime<Utc>,
}

impl GameAddition {
    pub fn new(user_id: Uuid, thegamesdb_id: i64, title: String, added_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            thegamesdb_id,
            title,
            added_at,
        }
    }

    pub async fn create(pool: &SqlitePool, addition: &GameAddition) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"INSERT INTO game_additions (id, user_id, thegamesdb_id, title, added_at)
               VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(addition.id)
        .bind(addition.user_id)
        .bind(addition.thegamesdb_id)
        .bind(&addition.title)
        .bind(addition.added_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn find_since(
        pool: &SqlitePool,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, GameAddition>(
            r#"SELECT id, user_id, thegamesdb_id, title, added_at
               FROM game_additions
               WHERE added_at >= $1
               ORDER BY added_at DESC"#,
        )
        .bind(cutoff)
        .fetch_all(pool)
        .await
    }

    pub async fn delete_before(
        pool: &SqlitePool,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM game_additions WHERE added_at < $1")
            .bind(cutoff)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::DBService;

    #[tokio::test]
    async fn window_and_pruning() {
        let db = DBService::new_in_memory().await.unwrap();
        let now = Utc::now();
        let user = Uuid::new_v4();
        let old = GameAddition::new(user, 1, "Old".to_string(), now - Duration::days(30));
        let recent = GameAddition::new(user, 2, "Recent".to_string(), now - Duration::hours(1));
        GameAddition::create(&db.pool, &old).await.unwrap();
        GameAddition::create(&db.pool, &recent).await.unwrap();

        let since = GameAddition::find_since(&db.pool, now - Duration::days(7))
            .await
            .unwrap();
        assert_eq!(since.len(), 1);
        assert_eq!(since[0].thegamesdb_id, 2);

        let pruned = GameAddition::delete_before(&db.pool, now - Duration::days(7))
            .await
            .unwrap();
        assert_eq!(pruned, 1);
        let all = GameAddition::find_since(&db.pool, now - Duration::days(365))
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
    }
}
