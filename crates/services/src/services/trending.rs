//! Trending catalog games: how many distinct users added each title recently.

use std::{
    cmp::Reverse,
    collections::{HashMap, HashSet},
    sync::Arc,
};

use chrono::{DateTime, Duration, Utc};
use db::models::game_addition::GameAddition;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

use super::storage::{CollectionStore, StoreError};

pub const DEFAULT_WINDOW_DAYS: i64 = 7;
pub const MAX_WINDOW_DAYS: i64 = 90;
pub const DEFAULT_LIMIT: usize = 10;
pub const MAX_LIMIT: usize = 50;

#[derive(Debug, Error)]
pub enum TrendingError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct TrendingGame {
    pub thegamesdb_id: i64,
    pub title: String,
    /// Distinct users who added the game inside the window
    pub adders: usize,
    pub last_added_at: DateTime<Utc>,
}

struct Tally {
    users: HashSet<Uuid>,
    title: String,
    last_added_at: DateTime<Utc>,
}

/// Rank additions inside `[now - window, now]` by distinct adders, then recency, then id.
pub fn aggregate_trending(
    additions: &[GameAddition],
    now: DateTime<Utc>,
    window: Duration,
    limit: usize,
) -> Vec<TrendingGame> {
    let cutoff = now - window;
    let mut tallies: HashMap<i64, Tally> = HashMap::new();

    for addition in additions
        .iter()
        .filter(|a| a.added_at >= cutoff && a.added_at <= now)
    {
        let tally = tallies.entry(addition.thegamesdb_id).or_insert_with(|| Tally {
            users: HashSet::new(),
            title: addition.title.clone(),
            last_added_at: addition.added_at,
        });
        tally.users.insert(addition.user_id);
        if addition.added_at >= tally.last_added_at {
            tally.last_added_at = addition.added_at;
            tally.title = addition.title.clone();
        }
    }

    let mut ranked: Vec<TrendingGame> = tallies
        .into_iter()
        .map(|(id, tally)| TrendingGame {
            thegamesdb_id: id,
            title: tally.title,
            adders: tally.users.len(),
            last_added_at: tally.last_added_at,
        })
        .collect();

    ranked.sort_by_key(|t| (Reverse(t.adders), Reverse(t.last_added_at), t.thegamesdb_id));
    ranked.truncate(limit);
    ranked
}

#[derive(Clone)]
pub struct TrendingService {
    store: Arc<dyn CollectionStore>,
}

impl TrendingService {
    pub fn new(store: Arc<dyn CollectionStore>) -> Self {
        Self { store }
    }

    /// Window and limit are clamped to `1..=MAX_WINDOW_DAYS` and `1..=MAX_LIMIT`
    pub async fn trending(
        &self,
        window_days: Option<i64>,
        limit: Option<usize>,
    ) -> Result<Vec<TrendingGame>, TrendingError> {
        let window_days = window_days
            .unwrap_or(DEFAULT_WINDOW_DAYS)
            .clamp(1, MAX_WINDOW_DAYS);
        let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let now = Utc::now();
        let window = Duration::days(window_days);

        let additions = self.store.additions_since(now - window).await?;
        Ok(aggregate_trending(&additions, now, window, limit))
    }
}
