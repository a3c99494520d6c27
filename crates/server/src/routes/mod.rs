use axum::Router;

use crate::AppState;

pub mod achievements;
pub mod catalog;
pub mod friends;
pub mod games;
pub mod health;
pub mod sharing;
pub mod trending;

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(health::router(state))
        .merge(games::router(state))
        .merge(achievements::router(state))
        .merge(trending::router(state))
        .merge(catalog::router(state))
        .merge(sharing::router(state))
        .merge(friends::router(state))
}
