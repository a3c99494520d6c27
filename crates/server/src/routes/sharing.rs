use axum::{
    Router,
    extract::State,
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::share_profile::{SetShareVisibility, ShareProfile, UpsertShareProfile};
use services::services::sharing::SharedCollection;
use utils::response::ApiResponse;

use crate::{
    AppState,
    error::ApiError,
    extract::{CurrentUser, Json, Path},
};

pub async fn get_share_profile(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<ResponseJson<ApiResponse<Option<ShareProfile>>>, ApiError> {
    let profile = state.sharing.get_profile(user_id).await?;
    Ok(ResponseJson(ApiResponse::success(profile)))
}

pub async fn upsert_share_profile(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(payload): Json<UpsertShareProfile>,
) -> Result<ResponseJson<ApiResponse<ShareProfile>>, ApiError> {
    let profile = state.sharing.upsert_profile(user_id, payload).await?;
    Ok(ResponseJson(ApiResponse::success(profile)))
}

/// POST /api/share-profile/regenerate
/// Issue a new share id; the old link stops working
pub async fn regenerate_share_link(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<ResponseJson<ApiResponse<ShareProfile>>, ApiError> {
    let profile = state.sharing.regenerate_link(user_id).await?;
    Ok(ResponseJson(ApiResponse::success(profile)))
}

pub async fn set_share_visibility(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(payload): Json<SetShareVisibility>,
) -> Result<ResponseJson<ApiResponse<ShareProfile>>, ApiError> {
    let profile = state.sharing.set_public(user_id, payload.is_public).await?;
    Ok(ResponseJson(ApiResponse::success(profile)))
}

/// GET /api/shared/{share_id}
/// Read-only public view, no identity required
pub async fn get_shared_collection(
    State(state): State<AppState>,
    Path(share_id): Path<String>,
) -> Result<ResponseJson<ApiResponse<SharedCollection>>, ApiError> {
    let collection = state.sharing.shared_collection(&share_id).await?;
    Ok(ResponseJson(ApiResponse::success(collection)))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/share-profile",
            get(get_share_profile).put(upsert_share_profile),
        )
        .route("/share-profile/regenerate", post(regenerate_share_link))
        .route("/share-profile/visibility", post(set_share_visibility))
        .route("/shared/{share_id}", get(get_shared_collection))
}
