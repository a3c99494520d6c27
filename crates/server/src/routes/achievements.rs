use axum::{Router, extract::State, response::Json as ResponseJson, routing::get};
use services::services::achievements::AchievementProgress;
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError, extract::CurrentUser};

pub async fn get_achievements(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<ResponseJson<ApiResponse<Vec<AchievementProgress>>>, ApiError> {
    let progress = state.achievements.progress(user_id).await?;
    Ok(ResponseJson(ApiResponse::success(progress)))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().route("/achievements", get(get_achievements))
}
