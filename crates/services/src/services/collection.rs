//! Service for the user's own game collection.

use std::{collections::HashSet, sync::Arc};

use chrono::{NaiveDate, Utc};
use db::models::{
    game::{CompletionStatus, CreateGame, Game, GameFormat, GameStatus, UpdateGame},
    game_addition::GameAddition,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use ts_rs::TS;
use uuid::Uuid;

use super::{
    storage::{CollectionStore, StoreError},
    thegamesdb::{ThegamesdbClient, ThegamesdbError},
};

const MAX_TITLE_LEN: usize = 200;

#[derive(Debug, Error)]
pub enum CollectionError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("catalog error: {0}")]
    Catalog(#[from] ThegamesdbError),
    #[error("catalog lookups are not configured")]
    CatalogUnavailable,
    #[error("{0}")]
    Validation(String),
    #[error("game not found")]
    NotFound,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct AddFromCatalog {
    pub thegamesdb_id: i64,
    pub status: Option<GameStatus>,
    pub format: Option<GameFormat>,
}

/// Aggregate counts over one user's entries
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
pub struct CollectionStats {
    pub total: usize,
    pub owned: usize,
    pub wishlist: usize,
    pub completed: usize,
    pub playing: usize,
    pub physical: usize,
    pub digital: usize,
    pub distinct_genres: usize,
    pub total_spent: f64,
}

impl CollectionStats {
    /// Completion, format, genre and spend figures only count owned games.
    pub fn from_games(games: &[Game]) -> Self {
        let mut stats = Self {
            total: games.len(),
            ..Default::default()
        };
        let mut genres = HashSet::new();

        for game in games {
            if game.status == GameStatus::Wishlist {
                stats.wishlist += 1;
                continue;
            }
            stats.owned += 1;
            match game.completion {
                CompletionStatus::Completed => stats.completed += 1,
                CompletionStatus::Playing => stats.playing += 1,
                _ => {}
            }
            match game.format {
                Some(GameFormat::Physical) => stats.physical += 1,
                Some(GameFormat::Digital) => stats.digital += 1,
                None => {}
            }
            for genre in game.genres() {
                genres.insert(genre.to_lowercase());
            }
            stats.total_spent += game.price_paid.unwrap_or(0.0);
        }

        stats.distinct_genres = genres.len();
        stats.total_spent = (stats.total_spent * 100.0).round() / 100.0;
        stats
    }
}

fn validate(game: &Game) -> Result<(), CollectionError> {
    if game.title.is_empty() {
        return Err(CollectionError::Validation("title is required".to_string()));
    }
    if game.title.chars().count() > MAX_TITLE_LEN {
        return Err(CollectionError::Validation(format!(
            "title must be at most {MAX_TITLE_LEN} characters"
        )));
    }
    if game.price_paid.is_some_and(|p| !p.is_finite() || p < 0.0) {
        return Err(CollectionError::Validation(
            "price_paid must be a non-negative number".to_string(),
        ));
    }
    if game.release_date.is_some() && game.parsed_release_date().is_none() {
        return Err(CollectionError::Validation(
            "release_date must be formatted YYYY-MM-DD".to_string(),
        ));
    }
    Ok(())
}

/// Trim free-text fields; blank optional strings become `None`
fn normalize(game: &mut Game) {
    game.title = game.title.trim().to_string();
    for field in [&mut game.cover_url, &mut game.release_date, &mut game.notes] {
        *field = field
            .take()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
    }
    game.genres.0.retain(|g| !g.trim().is_empty());
}

#[derive(Clone)]
pub struct CollectionService {
    store: Arc<dyn CollectionStore>,
    catalog: Option<ThegamesdbClient>,
}

impl CollectionService {
    pub fn new(store: Arc<dyn CollectionStore>, catalog: Option<ThegamesdbClient>) -> Self {
        Self { store, catalog }
    }

    pub async fn list(
        &self,
        user_id: Uuid,
        status: Option<GameStatus>,
    ) -> Result<Vec<Game>, CollectionError> {
        Ok(self.store.list_games(user_id, status).await?)
    }

    /// A game owned by `user_id`; other users' ids are reported as not found
    pub async fn get(&self, user_id: Uuid, id: Uuid) -> Result<Game, CollectionError> {
        self.store
            .get_game(id)
            .await?
            .filter(|g| g.user_id == user_id)
            .ok_or(CollectionError::NotFound)
    }

    pub async fn add(&self, user_id: Uuid, data: CreateGame) -> Result<Game, CollectionError> {
        let mut game = Game::new(Uuid::new_v4(), user_id, data, Utc::now());
        normalize(&mut game);
        validate(&game)?;

        self.store.insert_game(&game).await?;
        info!(
            user_id = %user_id,
            game_id = %game.id,
            status = %game.status,
            "Game added to collection"
        );

        if let Some(catalog_id) = game.thegamesdb_id {
            self.log_addition(user_id, catalog_id, &game.title).await;
        }
        Ok(game)
    }

    /// Create an entry pre-filled from TheGamesDB metadata
    pub async fn add_from_catalog(
        &self,
        user_id: Uuid,
        request: AddFromCatalog,
    ) -> Result<Game, CollectionError> {
        let catalog = self
            .catalog
            .as_ref()
            .ok_or(CollectionError::CatalogUnavailable)?;
        let entry = catalog
            .game_by_id(request.thegamesdb_id)
            .await?
            .ok_or(CollectionError::NotFound)?;

        self.add(
            user_id,
            CreateGame {
                title: entry.title,
                status: request.status,
                format: request.format,
                thegamesdb_id: Some(entry.id),
                cover_url: entry.cover_url,
                release_date: entry
                    .release_date
                    .filter(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").is_ok()),
                genres: Some(entry.genres),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        changes: UpdateGame,
    ) -> Result<Game, CollectionError> {
        let mut game = self.get(user_id, id).await?;
        let previous_catalog_id = game.thegamesdb_id;

        changes.apply_to(&mut game, Utc::now());
        normalize(&mut game);
        validate(&game)?;

        if !self.store.update_game(&game).await? {
            return Err(CollectionError::NotFound);
        }

        match game.thegamesdb_id {
            Some(catalog_id) if previous_catalog_id != Some(catalog_id) => {
                self.log_addition(user_id, catalog_id, &game.title).await;
            }
            _ => {}
        }
        Ok(game)
    }

    pub async fn remove(&self, user_id: Uuid, id: Uuid) -> Result<(), CollectionError> {
        if !self.store.delete_game(id, user_id).await? {
            return Err(CollectionError::NotFound);
        }
        info!(user_id = %user_id, game_id = %id, "Game removed from collection");
        Ok(())
    }

    pub async fn stats(&self, user_id: Uuid) -> Result<CollectionStats, CollectionError> {
        let games = self.store.list_games(user_id, None).await?;
        Ok(CollectionStats::from_games(&games))
    }

    /// Trending bookkeeping never fails the user's request
    async fn log_addition(&self, user_id: Uuid, catalog_id: i64, title: &str) {
        let addition = GameAddition::new(user_id, catalog_id, title.to_string(), Utc::now());
        if let Err(e) = self.store.record_addition(&addition).await {
            warn!(
                user_id = %user_id,
                thegamesdb_id = catalog_id,
                error = %e,
                "Failed to record game addition"
            );
        }
    }
}
