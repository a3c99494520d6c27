//! Routes proxying TheGamesDB lookups through the cached client.

use axum::{
    Router,
    extract::State,
    response::Json as ResponseJson,
    routing::get,
};
use serde::Deserialize;
use services::services::thegamesdb::{
    Allowance, CatalogGame, CatalogSearchPage, ThegamesdbClient, ThegamesdbError,
};
use utils::response::ApiResponse;

use crate::{
    AppState,
    error::ApiError,
    extract::{Path, Query},
};

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub name: String,
    pub page: Option<u32>,
}

fn client(state: &AppState) -> Result<&ThegamesdbClient, ApiError> {
    state
        .catalog
        .as_ref()
        .ok_or(ApiError::Catalog(ThegamesdbError::MissingApiKey))
}

pub async fn search_catalog(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<ResponseJson<ApiResponse<CatalogSearchPage>>, ApiError> {
    let page = client(&state)?
        .search_games(&query.name, query.page.unwrap_or(1))
        .await?;
    Ok(ResponseJson(ApiResponse::success(page)))
}

pub async fn get_catalog_game(
    State(state): State<AppState>,
    Path(thegamesdb_id): Path<i64>,
) -> Result<ResponseJson<ApiResponse<CatalogGame>>, ApiError> {
    let game = client(&state)?
        .game_by_id(thegamesdb_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(ResponseJson(ApiResponse::success(game)))
}

/// Last quota reported by TheGamesDB; empty until the first request
pub async fn get_allowance(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<Option<Allowance>>>, ApiError> {
    let allowance = client(&state)?.allowance().await;
    Ok(ResponseJson(ApiResponse::success(allowance)))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().nest(
        "/catalog",
        Router::new()
            .route("/search", get(search_catalog))
            .route("/games/{thegamesdb_id}", get(get_catalog_game))
            .route("/allowance", get(get_allowance)),
    )
}
