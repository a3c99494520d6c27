use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type, types::Json};
use strum_macros::Display;
use ts_rs::TS;
use uuid::Uuid;

/// Whether the user owns the title or only wants it
#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, Display, Default,
)]
#[sqlx(type_name = "game_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum GameStatus {
    #[default]
    Owned,
    Wishlist,
}

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, Display)]
#[sqlx(type_name = "game_format", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum GameFormat {
    Physical,
    Digital,
}

/// Play-through progress of an entry
#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, Display, Default,
)]
#[sqlx(type_name = "completion_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CompletionStatus {
    #[default]
    Unplayed,
    Playing,
    Completed,
    Abandoned,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS, PartialEq)]
pub struct Game {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub status: GameStatus,
    pub format: Option<GameFormat>,
    pub completion: CompletionStatus,
    pub thegamesdb_id: Option<i64>, // Catalog id on TheGamesDB
    pub cover_url: Option<String>,
    pub release_date: Option<String>, // YYYY-MM-DD
    #[ts(as = "Vec<String>")]
    pub genres: Json<Vec<String>>,
    pub price_paid: Option<f64>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct CreateGame {
    pub title: String,
    pub status: Option<GameStatus>,
    pub format: Option<GameFormat>,
    pub completion: Option<CompletionStatus>,
    pub thegamesdb_id: Option<i64>,
    pub cover_url: Option<String>,
    pub release_date: Option<String>,
    pub genres: Option<Vec<String>>,
    pub price_paid: Option<f64>,
    pub notes: Option<String>,
}

/// Partial update. For nullable columns the outer `Option` means "field present",
/// so `"notes": null` clears the value while an absent key keeps it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateGame {
    pub title: Option<String>,
    pub status: Option<GameStatus>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[ts(optional, as = "Option<Option<GameFormat>>")]
    pub format: Option<Option<GameFormat>>,
    pub completion: Option<CompletionStatus>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[ts(optional, as = "Option<Option<i64>>")]
    pub thegamesdb_id: Option<Option<i64>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[ts(optional, as = "Option<Option<String>>")]
    pub cover_url: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[ts(optional, as = "Option<Option<String>>")]
    pub release_date: Option<Option<String>>,
    pub genres: Option<Vec<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[ts(optional, as = "Option<Option<f64>>")]
    pub price_paid: Option<Option<f64>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[ts(optional, as = "Option<Option<String>>")]
    pub notes: Option<Option<String>>,
}

impl CreateGame {
    pub fn titled(title: impl Into<String>, status: GameStatus) -> Self {
        Self {
            title: title.into(),
            status: Some(status),
            ..Default::default()
        }
    }
}

impl UpdateGame {
    /// Merge the present fields into `game` and bump `updated_at`.
    pub fn apply_to(self, game: &mut Game, now: DateTime<Utc>) {
        if let Some(title) = self.title {
            game.title = title;
        }
        if let Some(status) = self.status {
            game.status = status;
        }
        if let Some(format) = self.format {
            game.format = format;
        }
        if let Some(completion) = self.completion {
            game.completion = completion;
        }
        if let Some(thegamesdb_id) = self.thegamesdb_id {
            game.thegamesdb_id = thegamesdb_id;
        }
        if let Some(cover_url) = self.cover_url {
            game.cover_url = cover_url;
        }
        if let Some(release_date) = self.release_date {
            game.release_date = release_date;
        }
        if let Some(genres) = self.genres {
            game.genres = Json(genres);
        }
        if let Some(price_paid) = self.price_paid {
            game.price_paid = price_paid;
        }
        if let Some(notes) = self.notes {
            game.notes = notes;
        }
        game.updated_at = now;
    }
}

impl Game {
    pub fn new(id: Uuid, user_id: Uuid, data: CreateGame, now: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id,
            title: data.title,
            status: data.status.unwrap_or_default(),
            format: data.format,
            completion: data.completion.unwrap_or_default(),
            thegamesdb_id: data.thegamesdb_id,
            cover_url: data.cover_url,
            release_date: data.release_date,
            genres: Json(data.genres.unwrap_or_default()),
            price_paid: data.price_paid,
            notes: data.notes,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn genres(&self) -> &[String] {
        &self.genres.0
    }

    pub fn parsed_release_date(&self) -> Option<NaiveDate> {
        self.release_date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
    }

    /// Games for a user, newest first, optionally filtered by status
    pub async fn find_by_user(
        pool: &SqlitePool,
        user_id: Uuid,
        status: Option<GameStatus>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Game>(
            r#"SELECT id, user_id, title, status, format, completion, thegamesdb_id,
                      cover_url, release_date, genres, price_paid, notes, created_at, updated_at
               FROM games
               WHERE user_id = $1 AND ($2 IS NULL OR status = $2)
               ORDER BY created_at DESC, rowid DESC"#,
        )
        .bind(user_id)
        .bind(status)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Game>(
            r#"SELECT id, user_id, title, status, format, completion, thegamesdb_id,
                      cover_url, release_date, genres, price_paid, notes, created_at, updated_at
               FROM games
               WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn create(pool: &SqlitePool, game: &Game) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"INSERT INTO games (id, user_id, title, status, format, completion, thegamesdb_id,
                                  cover_url, release_date, genres, price_paid, notes,
                                  created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"#,
        )
        .bind(game.id)
        .bind(game.user_id)
        .bind(&game.title)
        .bind(game.status)
        .bind(game.format)
        .bind(game.completion)
        .bind(game.thegamesdb_id)
        .bind(&game.cover_url)
        .bind(&game.release_date)
        .bind(&game.genres)
        .bind(game.price_paid)
        .bind(&game.notes)
        .bind(game.created_at)
        .bind(game.updated_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Overwrite every mutable column of an existing row owned by `game.user_id`
    pub async fn update(pool: &SqlitePool, game: &Game) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"UPDATE games
               SET title = $3, status = $4, format = $5, completion = $6, thegamesdb_id = $7,
                   cover_url = $8, release_date = $9, genres = $10, price_paid = $11,
                   notes = $12, updated_at = $13
               WHERE id = $1 AND user_id = $2"#,
        )
        .bind(game.id)
        .bind(game.user_id)
        .bind(&game.title)
        .bind(game.status)
        .bind(game.format)
        .bind(game.completion)
        .bind(game.thegamesdb_id)
        .bind(&game.cover_url)
        .bind(&game.release_date)
        .bind(&game.genres)
        .bind(game.price_paid)
        .bind(&game.notes)
        .bind(game.updated_at)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid, user_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM games WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DBService, is_unique_violation};

    fn sample(user_id: Uuid, title: &str, catalog_id: Option<i64>) -> Game {
        let data = CreateGame {
            thegamesdb_id: catalog_id,
            genres: Some(vec!["Platformer".to_string()]),
            ..CreateGame::titled(title, GameStatus::Owned)
        };
        Game::new(Uuid::new_v4(), user_id, data, Utc::now())
    }

    #[tokio::test]
    async fn create_and_find_round_trip() {
        let db = DBService::new_in_memory().await.unwrap();
        let user = Uuid::new_v4();
        let game = sample(user, "Super Mario Odyssey", Some(42));
        Game::create(&db.pool, &game).await.unwrap();

        let found = Game::find_by_id(&db.pool, game.id).await.unwrap().unwrap();
        assert_eq!(found.title, "Super Mario Odyssey");
        assert_eq!(found.genres(), ["Platformer".to_string()]);
        assert_eq!(found.status, GameStatus::Owned);
    }

    #[tokio::test]
    async fn status_filter_and_ownership() {
        let db = DBService::new_in_memory().await.unwrap();
        let user = Uuid::new_v4();
        let other = Uuid::new_v4();
        Game::create(&db.pool, &sample(user, "Owned One", None)).await.unwrap();
        let mut wish = sample(user, "Wanted", None);
        wish.status = GameStatus::Wishlist;
        Game::create(&db.pool, &wish).await.unwrap();
        Game::create(&db.pool, &sample(other, "Not Mine", None)).await.unwrap();

        let all = Game::find_by_user(&db.pool, user, None).await.unwrap();
        assert_eq!(all.len(), 2);
        let wishlist = Game::find_by_user(&db.pool, user, Some(GameStatus::Wishlist))
            .await
            .unwrap();
        assert_eq!(wishlist.len(), 1);
        assert_eq!(wishlist[0].title, "Wanted");

        assert_eq!(Game::delete(&db.pool, wish.id, other).await.unwrap(), 0);
        assert_eq!(Game::delete(&db.pool, wish.id, user).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn duplicate_title_or_catalog_id_is_rejected() {
        let db = DBService::new_in_memory().await.unwrap();
        let user = Uuid::new_v4();
        Game::create(&db.pool, &sample(user, "Zelda", Some(7))).await.unwrap();

        let err = Game::create(&db.pool, &sample(user, "ZELDA", None))
            .await
            .unwrap_err();
        assert!(is_unique_violation(&err));

        let err = Game::create(&db.pool, &sample(user, "Other", Some(7)))
            .await
            .unwrap_err();
        assert!(is_unique_violation(&err));

        // Another user may hold the same title
        Game::create(&db.pool, &sample(Uuid::new_v4(), "Zelda", Some(7)))
            .await
            .unwrap();
    }

    #[test]
    fn update_game_distinguishes_null_from_absent() {
        let mut game = sample(Uuid::new_v4(), "Metroid Dread", None);
        game.notes = Some("great".to_string());

        let keep: UpdateGame = serde_json::from_str(r#"{"title":"Metroid Dread (2021)"}"#).unwrap();
        keep.apply_to(&mut game, Utc::now());
        assert_eq!(game.title, "Metroid Dread (2021)");
        assert_eq!(game.notes.as_deref(), Some("great"));

        let clear: UpdateGame = serde_json::from_str(r#"{"notes":null}"#).unwrap();
        clear.apply_to(&mut game, Utc::now());
        assert_eq!(game.notes, None);
    }
}
