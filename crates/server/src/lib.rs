use std::sync::Arc;

use axum::Router;
use services::services::{
    achievements::AchievementService, collection::CollectionService, friends::FriendsService,
    sharing::SharingService, storage::CollectionStore, thegamesdb::ThegamesdbClient,
    trending::TrendingService,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod error;
pub mod extract;
pub mod routes;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CollectionStore>,
    pub catalog: Option<ThegamesdbClient>,
    pub collection: CollectionService,
    pub achievements: AchievementService,
    pub sharing: SharingService,
    pub friends: FriendsService,
    pub trending: TrendingService,
}

impl AppState {
    pub fn new(store: Arc<dyn CollectionStore>, catalog: Option<ThegamesdbClient>) -> Self {
        let collection = CollectionService::new(store.clone(), catalog.clone());
        Self {
            achievements: AchievementService::new(collection.clone()),
            sharing: SharingService::new(store.clone()),
            friends: FriendsService::new(store.clone()),
            trending: TrendingService::new(store.clone()),
            collection,
            catalog,
            store,
        }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .nest("/api", routes::router(&state))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
