use axum::{
    Router,
    extract::State,
    response::Json as ResponseJson,
    routing::get,
};
use serde::Deserialize;
use services::services::trending::TrendingGame;
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError, extract::Query};

#[derive(Debug, Deserialize)]
pub struct TrendingQuery {
    pub window_days: Option<i64>,
    pub limit: Option<usize>,
}

/// GET /api/trending
/// Games added by the most distinct users recently, across all collections
pub async fn get_trending(
    State(state): State<AppState>,
    Query(query): Query<TrendingQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<TrendingGame>>>, ApiError> {
    let games = state
        .trending
        .trending(query.window_days, query.limit)
        .await?;
    Ok(ResponseJson(ApiResponse::success(games)))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().route("/trending", get(get_trending))
}
