//! Routes for the caller's own collection.

use axum::{
    Router,
    extract::State,
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::game::{CreateGame, Game, GameStatus, UpdateGame};
use serde::Deserialize;
use services::services::collection::{AddFromCatalog, CollectionStats};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    AppState,
    error::ApiError,
    extract::{CurrentUser, Json, Path, Query},
};

#[derive(Debug, Deserialize)]
pub struct ListGamesQuery {
    pub status: Option<GameStatus>,
}

pub async fn list_games(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Query(query): Query<ListGamesQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Game>>>, ApiError> {
    let games = state.collection.list(user_id, query.status).await?;
    Ok(ResponseJson(ApiResponse::success(games)))
}

pub async fn create_game(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(payload): Json<CreateGame>,
) -> Result<ResponseJson<ApiResponse<Game>>, ApiError> {
    let game = state.collection.add(user_id, payload).await?;
    Ok(ResponseJson(ApiResponse::success(game)))
}

/// POST /api/games/from-catalog
/// Add a game pre-filled from TheGamesDB
pub async fn create_game_from_catalog(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(payload): Json<AddFromCatalog>,
) -> Result<ResponseJson<ApiResponse<Game>>, ApiError> {
    let game = state.collection.add_from_catalog(user_id, payload).await?;
    Ok(ResponseJson(ApiResponse::success(game)))
}

pub async fn get_stats(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<ResponseJson<ApiResponse<CollectionStats>>, ApiError> {
    let stats = state.collection.stats(user_id).await?;
    Ok(ResponseJson(ApiResponse::success(stats)))
}

pub async fn get_game(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(game_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Game>>, ApiError> {
    let game = state.collection.get(user_id, game_id).await?;
    Ok(ResponseJson(ApiResponse::success(game)))
}

pub async fn update_game(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(game_id): Path<Uuid>,
    Json(payload): Json<UpdateGame>,
) -> Result<ResponseJson<ApiResponse<Game>>, ApiError> {
    let game = state.collection.update(user_id, game_id, payload).await?;
    Ok(ResponseJson(ApiResponse::success(game)))
}

pub async fn delete_game(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(game_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    state.collection.remove(user_id, game_id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/games", get(list_games).post(create_game))
        .route("/games/from-catalog", post(create_game_from_catalog))
        .route("/games/stats", get(get_stats))
        .route(
            "/games/{game_id}",
            get(get_game).put(update_game).delete(delete_game),
        )
}
