//! TheGamesDB API client for catalog search and metadata enrichment.

use std::{collections::HashMap, sync::Arc, time::Duration};

use backon::{ExponentialBuilder, Retryable};
use chrono::{DateTime, Utc};
use moka::future::Cache;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use ts_rs::TS;

pub const DEFAULT_BASE_URL: &str = "https://api.thegamesdb.net/v1";
/// TheGamesDB platform id for Nintendo Switch
pub const SWITCH_PLATFORM_ID: i64 = 4971;

const SEARCH_FIELDS: &str = "players,publishers,genres,overview,rating";
const SEARCH_TTL: Duration = Duration::from_secs(60 * 60);
const GAME_TTL: Duration = Duration::from_secs(24 * 60 * 60);
const GENRE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
const UNKNOWN_REFRESH_SECS: i64 = 60 * 60;

#[derive(Debug, Clone, Error)]
pub enum ThegamesdbError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("timeout")]
    Timeout,
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("rate limited")]
    RateLimited,
    #[error("invalid api key")]
    InvalidApiKey,
    #[error("json error: {0}")]
    Serde(String),
    #[error("missing api key: THEGAMESDB_API_KEY environment variable not set")]
    MissingApiKey,
    #[error("monthly API allowance exhausted")]
    AllowanceExhausted,
}

impl ThegamesdbError {
    /// Returns true if the error is transient and should be retried.
    pub fn should_retry(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout | Self::RateLimited => true,
            Self::Http { status, .. } => (500..=599).contains(status),
            _ => false,
        }
    }
}

/// Request quota as last reported by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct Allowance {
    pub remaining_monthly: i64,
    pub extra: i64,
    /// Seconds until the monthly allowance refreshes, as of `observed_at`
    pub refresh_in_seconds: Option<i64>,
    pub observed_at: DateTime<Utc>,
}

impl Allowance {
    /// Without a refresh timer the quota is assumed to recover after `UNKNOWN_REFRESH_SECS`
    pub fn refreshes_at(&self) -> DateTime<Utc> {
        let secs = self.refresh_in_seconds.unwrap_or(UNKNOWN_REFRESH_SECS).max(0);
        self.observed_at + chrono::Duration::seconds(secs)
    }

    pub fn is_exhausted_at(&self, now: DateTime<Utc>) -> bool {
        self.remaining_monthly + self.extra <= 0 && now < self.refreshes_at()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct CatalogGame {
    pub id: i64,
    pub title: String,
    pub release_date: Option<String>,
    pub overview: Option<String>,
    pub players: Option<i64>,
    pub rating: Option<String>,
    pub genres: Vec<String>,
    pub cover_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct CatalogSearchPage {
    pub games: Vec<CatalogGame>,
    pub current_page: u32,
    pub has_next: bool,
    pub has_previous: bool,
}

impl CatalogSearchPage {
    fn empty(page: u32) -> Self {
        Self {
            games: Vec::new(),
            current_page: page,
            has_next: false,
            has_previous: page > 1,
        }
    }
}

/// Top-level response shape shared by every endpoint
#[derive(Debug, Deserialize)]
struct Envelope<D> {
    data: D,
    #[serde(default)]
    include: Option<Include>,
    #[serde(default)]
    pages: Option<Pages>,
    remaining_monthly_allowance: Option<i64>,
    extra_allowance: Option<i64>,
    allowance_refresh_timer: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct GamesData {
    #[serde(default)]
    games: Vec<RawGame>,
}

#[derive(Debug, Deserialize)]
struct RawGame {
    id: i64,
    game_title: String,
    release_date: Option<String>,
    overview: Option<String>,
    players: Option<i64>,
    rating: Option<String>,
    #[serde(default)]
    genres: Option<Vec<i64>>,
}

#[derive(Debug, Default, Deserialize)]
struct Include {
    boxart: Option<BoxartInclude>,
}

#[derive(Debug, Deserialize)]
struct BoxartInclude {
    base_url: BoxartBaseUrl,
    #[serde(default)]
    data: HashMap<String, Vec<BoxartImage>>,
}

#[derive(Debug, Deserialize)]
struct BoxartBaseUrl {
    original: String,
    medium: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BoxartImage {
    #[serde(rename = "type")]
    kind: String,
    side: Option<String>,
    filename: String,
}

#[derive(Debug, Deserialize)]
struct Pages {
    previous: Option<String>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenresData {
    genres: HashMap<String, GenreEntry>,
}

#[derive(Debug, Deserialize)]
struct GenreEntry {
    id: i64,
    name: String,
}

impl BoxartInclude {
    /// Front boxart for `game_id`, else its first image
    fn cover_for(&self, game_id: i64) -> Option<String> {
        let images = self.data.get(&game_id.to_string())?;
        let image = images
            .iter()
            .find(|img| img.kind == "boxart" && img.side.as_deref() == Some("front"))
            .or_else(|| images.first())?;
        let base = self.base_url.medium.as_deref().unwrap_or(&self.base_url.original);
        Some(format!("{base}{}", image.filename))
    }
}

/// TheGamesDB API client
#[derive(Clone)]
pub struct ThegamesdbClient {
    http: Client,
    api_key: String,
    base_url: String,
    min_retry_delay: Duration,
    allowance: Arc<RwLock<Option<Allowance>>>,
    search_cache: Cache<String, CatalogSearchPage>,
    game_cache: Cache<i64, Option<CatalogGame>>,
    genre_cache: Cache<(), Arc<HashMap<i64, String>>>,
}

impl std::fmt::Debug for ThegamesdbClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThegamesdbClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl ThegamesdbClient {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

    pub fn new(api_key: String, base_url: Option<String>) -> Result<Self, ThegamesdbError> {
        if api_key.trim().is_empty() {
            return Err(ThegamesdbError::MissingApiKey);
        }

        let http = Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .user_agent(concat!("switch-shelf/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ThegamesdbError::Transport(e.to_string()))?;

        let base_url = base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            http,
            api_key,
            base_url,
            min_retry_delay: Duration::from_secs(1),
            allowance: Arc::new(RwLock::new(None)),
            search_cache: Cache::builder()
                .max_capacity(500)
                .time_to_live(SEARCH_TTL)
                .build(),
            game_cache: Cache::builder()
                .max_capacity(2_000)
                .time_to_live(GAME_TTL)
                .build(),
            genre_cache: Cache::builder()
                .max_capacity(1)
                .time_to_live(GENRE_TTL)
                .build(),
        })
    }

    /// Shorten the first backoff step; the default of one second suits production.
    pub fn with_min_retry_delay(mut self, delay: Duration) -> Self {
        self.min_retry_delay = delay;
        self
    }

    /// Allowance seen on the most recent successful response
    pub async fn allowance(&self) -> Option<Allowance> {
        self.allowance.read().await.clone()
    }

    /// Search Switch titles by name. Pages start at 1.
    pub async fn search_games(
        &self,
        name: &str,
        page: u32,
    ) -> Result<CatalogSearchPage, ThegamesdbError> {
        let page = page.max(1);
        let name = name.trim();
        if name.is_empty() {
            return Ok(CatalogSearchPage::empty(page));
        }

        let key = format!("{}:{page}", name.to_lowercase());
        self.search_cache
            .try_get_with(key, self.fetch_search(name, page))
            .await
            .map_err(|e: Arc<ThegamesdbError>| (*e).clone())
    }

    pub async fn game_by_id(&self, id: i64) -> Result<Option<CatalogGame>, ThegamesdbError> {
        self.game_cache
            .try_get_with(id, self.fetch_game(id))
            .await
            .map_err(|e: Arc<ThegamesdbError>| (*e).clone())
    }

    /// Genre id to name map
    pub async fn genres(&self) -> Result<Arc<HashMap<i64, String>>, ThegamesdbError> {
        self.genre_cache
            .try_get_with((), self.fetch_genres())
            .await
            .map_err(|e: Arc<ThegamesdbError>| (*e).clone())
    }

    async fn fetch_search(&self, name: &str, page: u32) -> Result<CatalogSearchPage, ThegamesdbError> {
        let envelope: Envelope<GamesData> = self
            .get_json(
                "Games/ByGameName",
                &[
                    ("name", name.to_string()),
                    ("filter[platform]", SWITCH_PLATFORM_ID.to_string()),
                    ("fields", SEARCH_FIELDS.to_string()),
                    ("include", "boxart".to_string()),
                    ("page", page.to_string()),
                ],
            )
            .await?;

        let (has_next, has_previous) = envelope
            .pages
            .as_ref()
            .map(|p| (p.next.is_some(), p.previous.is_some()))
            .unwrap_or((false, page > 1));
        let games = self.to_catalog_games(envelope).await;

        debug!(name, page, results = games.len(), "TheGamesDB search");

        Ok(CatalogSearchPage {
            games,
            current_page: page,
            has_next,
            has_previous,
        })
    }

    async fn fetch_game(&self, id: i64) -> Result<Option<CatalogGame>, ThegamesdbError> {
        let envelope: Envelope<GamesData> = self
            .get_json(
                "Games/ByGameID",
                &[
                    ("id", id.to_string()),
                    ("fields", SEARCH_FIELDS.to_string()),
                    ("include", "boxart".to_string()),
                ],
            )
            .await?;

        Ok(self.to_catalog_games(envelope).await.into_iter().next())
    }

    async fn fetch_genres(&self) -> Result<Arc<HashMap<i64, String>>, ThegamesdbError> {
        let envelope: Envelope<GenresData> = self.get_json("Genres", &[]).await?;
        Ok(Arc::new(
            envelope
                .data
                .genres
                .into_values()
                .map(|g| (g.id, g.name))
                .collect(),
        ))
    }

    /// Resolve genre names and cover art. A failed genre lookup degrades to no genres.
    async fn to_catalog_games(&self, envelope: Envelope<GamesData>) -> Vec<CatalogGame> {
        let needs_genres = envelope
            .data
            .games
            .iter()
            .any(|g| g.genres.as_ref().is_some_and(|ids| !ids.is_empty()));
        let genre_names = if needs_genres {
            match self.genres().await {
                Ok(map) => map,
                Err(e) => {
                    warn!(error = %e, "Could not load TheGamesDB genres");
                    Arc::new(HashMap::new())
                }
            }
        } else {
            Arc::new(HashMap::new())
        };

        let boxart = envelope.include.and_then(|i| i.boxart);
        envelope
            .data
            .games
            .into_iter()
            .map(|raw| CatalogGame {
                cover_url: boxart.as_ref().and_then(|b| b.cover_for(raw.id)),
                genres: raw
                    .genres
                    .unwrap_or_default()
                    .iter()
                    .filter_map(|id| genre_names.get(id).cloned())
                    .collect(),
                id: raw.id,
                title: raw.game_title,
                release_date: raw.release_date,
                overview: raw.overview,
                players: raw.players,
                rating: raw.rating,
            })
            .collect()
    }

    async fn get_json<D: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Envelope<D>, ThegamesdbError> {
        let exhausted = self
            .allowance()
            .await
            .filter(|a| a.is_exhausted_at(Utc::now()));
        if let Some(allowance) = exhausted {
            warn!(
                refreshes_at = %allowance.refreshes_at(),
                "TheGamesDB allowance exhausted, skipping request"
            );
            return Err(ThegamesdbError::AllowanceExhausted);
        }

        let url = format!("{}/{path}", self.base_url);
        let envelope: Envelope<D> = (|| async { self.send_request(&url, query).await })
            .retry(
                ExponentialBuilder::default()
                    .with_min_delay(self.min_retry_delay)
                    .with_max_delay(Duration::from_secs(30))
                    .with_max_times(3)
                    .with_jitter(),
            )
            .when(|e: &ThegamesdbError| e.should_retry())
            .notify(|e, dur| {
                warn!(
                    "TheGamesDB call failed, retrying after {:.2}s: {}",
                    dur.as_secs_f64(),
                    e
                )
            })
            .await?;

        self.record_allowance(&envelope).await;
        Ok(envelope)
    }

    async fn send_request<D: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Envelope<D>, ThegamesdbError> {
        let res = self
            .http
            .get(url)
            .query(&[("apikey", self.api_key.as_str())])
            .query(query)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        match res.status() {
            s if s.is_success() => res
                .json::<Envelope<D>>()
                .await
                .map_err(|e| ThegamesdbError::Serde(e.to_string())),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ThegamesdbError::InvalidApiKey),
            StatusCode::TOO_MANY_REQUESTS => Err(ThegamesdbError::RateLimited),
            s => {
                let status = s.as_u16();
                let body = res.text().await.unwrap_or_default();
                Err(ThegamesdbError::Http { status, body })
            }
        }
    }

    async fn record_allowance<D>(&self, envelope: &Envelope<D>) {
        if envelope.remaining_monthly_allowance.is_none() && envelope.extra_allowance.is_none() {
            return;
        }
        let allowance = Allowance {
            remaining_monthly: envelope.remaining_monthly_allowance.unwrap_or(0),
            extra: envelope.extra_allowance.unwrap_or(0),
            refresh_in_seconds: envelope.allowance_refresh_timer,
            observed_at: Utc::now(),
        };
        debug!(
            remaining = allowance.remaining_monthly,
            extra = allowance.extra,
            "TheGamesDB allowance updated"
        );
        *self.allowance.write().await = Some(allowance);
    }
}

fn map_reqwest_error(e: reqwest::Error) -> ThegamesdbError {
    if e.is_timeout() {
        ThegamesdbError::Timeout
    } else {
        ThegamesdbError::Transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::{
        Json, Router,
        extract::{Query, State},
        http::StatusCode as AxumStatus,
        response::IntoResponse,
        routing::get,
    };
    use serde_json::{Value, json};

    use super::*;

    #[derive(Clone, Default)]
    struct MockState {
        search_hits: Arc<AtomicUsize>,
        genre_hits: Arc<AtomicUsize>,
        failures_left: Arc<AtomicUsize>,
        remaining: i64,
    }

    async fn by_name(
        State(state): State<MockState>,
        Query(params): Query<HashMap<String, String>>,
    ) -> impl IntoResponse {
        state.search_hits.fetch_add(1, Ordering::SeqCst);
        if state.failures_left.load(Ordering::SeqCst) > 0 {
            state.failures_left.fetch_sub(1, Ordering::SeqCst);
            return (AxumStatus::BAD_GATEWAY, Json(json!({"status": "bad gateway"})));
        }
        if params.get("apikey").map(String::as_str) != Some("test-key") {
            return (AxumStatus::FORBIDDEN, Json(json!({"status": "forbidden"})));
        }
        assert_eq!(params.get("filter[platform]").map(String::as_str), Some("4971"));
        let page = params.get("page").cloned().unwrap_or_else(|| "1".into());
        (
            AxumStatus::OK,
            Json(json!({
                "code": 200,
                "status": "Success",
                "data": {
                    "count": 2,
                    "games": [
                        {"id": 11, "game_title": "Mario Kart 8 Deluxe", "release_date": "2017-04-28",
                         "platform": 4971, "players": 4, "rating": "E - Everyone", "genres": [1, 7]},
                        {"id": 12, "game_title": "Mario Party Superstars", "platform": 4971, "genres": [99]}
                    ]
                },
                "include": {
                    "boxart": {
                        "base_url": {"original": "https://cdn/original/", "medium": "https://cdn/medium/"},
                        "data": {
                            "11": [
                                {"id": 1, "type": "boxart", "side": "back", "filename": "back/11.jpg"},
                                {"id": 2, "type": "boxart", "side": "front", "filename": "front/11.jpg"}
                            ]
                        }
                    }
                },
                "pages": {"previous": null, "current": format!("page={page}"), "next": "page=2"},
                "remaining_monthly_allowance": state.remaining,
                "extra_allowance": 0,
                "allowance_refresh_timer": 3600
            })),
        )
    }

    async fn by_id(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
        let games = if params.get("id").map(String::as_str) == Some("11") {
            json!([{"id": 11, "game_title": "Mario Kart 8 Deluxe"}])
        } else {
            json!([])
        };
        Json(json!({"data": {"count": 0, "games": games}, "remaining_monthly_allowance": 100}))
    }

    async fn genres(State(state): State<MockState>) -> Json<Value> {
        state.genre_hits.fetch_add(1, Ordering::SeqCst);
        Json(json!({
            "data": {"count": 2, "genres": {
                "1": {"id": 1, "name": "Action"},
                "7": {"id": 7, "name": "Racing"}
            }}
        }))
    }

    async fn spawn_mock(state: MockState) -> String {
        let app = Router::new()
            .route("/v1/Games/ByGameName", get(by_name))
            .route("/v1/Games/ByGameID", get(by_id))
            .route("/v1/Genres", get(genres))
            .with_state(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/v1")
    }

    fn client(base_url: String, key: &str) -> ThegamesdbClient {
        ThegamesdbClient::new(key.to_string(), Some(base_url))
            .unwrap()
            .with_min_retry_delay(Duration::from_millis(5))
    }

    #[tokio::test]
    async fn search_resolves_covers_and_genres() {
        let state = MockState {
            remaining: 500,
            ..Default::default()
        };
        let client = client(spawn_mock(state.clone()).await, "test-key");

        let page = client.search_games("  Mario ", 1).await.unwrap();
        assert_eq!(page.games.len(), 2);
        assert!(page.has_next);
        assert!(!page.has_previous);

        let kart = &page.games[0];
        assert_eq!(kart.cover_url.as_deref(), Some("https://cdn/medium/front/11.jpg"));
        assert_eq!(kart.genres.len(), 2);
        assert!(kart.genres.contains(&"Racing".to_string()));
        // Unknown genre ids are dropped, missing boxart leaves no cover
        assert!(page.games[1].genres.is_empty());
        assert!(page.games[1].cover_url.is_none());

        let allowance = client.allowance().await.unwrap();
        assert_eq!(allowance.remaining_monthly, 500);
        assert_eq!(allowance.refresh_in_seconds, Some(3600));
    }

    #[tokio::test]
    async fn repeated_searches_hit_the_cache() {
        let state = MockState {
            remaining: 500,
            ..Default::default()
        };
        let client = client(spawn_mock(state.clone()).await, "test-key");

        client.search_games("Zelda", 1).await.unwrap();
        client.search_games("zelda ", 1).await.unwrap();
        assert_eq!(state.search_hits.load(Ordering::SeqCst), 1);
        assert_eq!(state.genre_hits.load(Ordering::SeqCst), 1);

        client.search_games("zelda", 2).await.unwrap();
        assert_eq!(state.search_hits.load(Ordering::SeqCst), 2);
        assert_eq!(state.genre_hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn blank_search_makes_no_request() {
        let state = MockState::default();
        let client = client(spawn_mock(state.clone()).await, "test-key");
        let page = client.search_games("   ", 0).await.unwrap();
        assert!(page.games.is_empty());
        assert_eq!(page.current_page, 1);
        assert_eq!(state.search_hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let state = MockState {
            remaining: 10,
            failures_left: Arc::new(AtomicUsize::new(2)),
            ..Default::default()
        };
        let client = client(spawn_mock(state.clone()).await, "test-key");
        let page = client.search_games("Metroid", 1).await.unwrap();
        assert_eq!(page.games.len(), 2);
        assert_eq!(state.search_hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn bad_key_is_not_retried() {
        let state = MockState::default();
        let client = client(spawn_mock(state.clone()).await, "wrong-key");
        let err = client.search_games("Metroid", 1).await.unwrap_err();
        assert!(matches!(err, ThegamesdbError::InvalidApiKey));
        assert_eq!(state.search_hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausted_allowance_fails_fast() {
        let state = MockState {
            remaining: 0,
            ..Default::default()
        };
        let client = client(spawn_mock(state.clone()).await, "test-key");

        client.search_games("Pokemon", 1).await.unwrap();
        // Cached pages are still served
        client.search_games("pokemon", 1).await.unwrap();
        let err = client.search_games("Pokemon", 2).await.unwrap_err();
        assert!(matches!(err, ThegamesdbError::AllowanceExhausted));
        assert_eq!(state.search_hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn game_lookup_returns_none_for_unknown_id() {
        let client = client(spawn_mock(MockState::default()).await, "test-key");
        let game = client.game_by_id(11).await.unwrap().unwrap();
        assert_eq!(game.title, "Mario Kart 8 Deluxe");
        assert!(client.game_by_id(404).await.unwrap().is_none());
    }

    #[test]
    fn allowance_refresh_window() {
        let now = Utc::now();
        let allowance = Allowance {
            remaining_monthly: 0,
            extra: 0,
            refresh_in_seconds: Some(60),
            observed_at: now,
        };
        assert!(allowance.is_exhausted_at(now));
        assert!(!allowance.is_exhausted_at(now + chrono::Duration::seconds(61)));

        let with_extra = Allowance {
            extra: 5,
            ..allowance.clone()
        };
        assert!(!with_extra.is_exhausted_at(now));
    }

    #[test]
    fn allowance_without_timer_recovers() {
        let now = Utc::now();
        let allowance = Allowance {
            remaining_monthly: 0,
            extra: 0,
            refresh_in_seconds: None,
            observed_at: now,
        };
        assert!(allowance.is_exhausted_at(now));
        let later = now + chrono::Duration::seconds(UNKNOWN_REFRESH_SECS + 1);
        assert!(!allowance.is_exhausted_at(later));
        assert!(!allowance.is_exhausted_at(now + chrono::Duration::days(365)));
    }

    #[test]
    fn should_retry_classification() {
        assert!(ThegamesdbError::Timeout.should_retry());
        assert!(ThegamesdbError::RateLimited.should_retry());
        assert!(
            ThegamesdbError::Http {
                status: 503,
                body: String::new()
            }
            .should_retry()
        );
        assert!(
            !ThegamesdbError::Http {
                status: 404,
                body: String::new()
            }
            .should_retry()
        );
        assert!(!ThegamesdbError::AllowanceExhausted.should_retry());
    }
}
