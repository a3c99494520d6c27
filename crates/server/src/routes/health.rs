use axum::{Router, extract::State, response::Json as ResponseJson, routing::get};
use serde::Serialize;
use services::services::storage::StoreBackend;
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::AppState;

#[derive(Debug, Serialize, TS)]
pub struct HealthStatus {
    pub status: String,
    pub backend: StoreBackend,
    pub catalog_configured: bool,
}

pub async fn health(State(state): State<AppState>) -> ResponseJson<ApiResponse<HealthStatus>> {
    ResponseJson(ApiResponse::success(HealthStatus {
        status: "ok".to_string(),
        backend: state.store.backend(),
        catalog_configured: state.catalog.is_some(),
    }))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().route("/health", get(health))
}
