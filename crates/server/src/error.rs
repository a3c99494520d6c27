use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use services::services::{
    collection::CollectionError, friends::FriendsError, sharing::SharingError,
    storage::StoreError, thegamesdb::ThegamesdbError, trending::TrendingError,
};
use thiserror::Error;
use tracing::error;
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Collection(#[from] CollectionError),
    #[error(transparent)]
    Sharing(#[from] SharingError),
    #[error(transparent)]
    Friends(#[from] FriendsError),
    #[error(transparent)]
    Trending(#[from] TrendingError),
    #[error(transparent)]
    Catalog(#[from] ThegamesdbError),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("not found")]
    NotFound,
}

fn store_status(err: &StoreError) -> StatusCode {
    match err {
        StoreError::Conflict(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn catalog_status(err: &ThegamesdbError) -> StatusCode {
    match err {
        ThegamesdbError::AllowanceExhausted | ThegamesdbError::RateLimited => {
            StatusCode::TOO_MANY_REQUESTS
        }
        ThegamesdbError::MissingApiKey => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::BAD_GATEWAY,
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Collection(e) => match e {
                CollectionError::Store(e) => store_status(e),
                CollectionError::Catalog(e) => catalog_status(e),
                CollectionError::CatalogUnavailable => StatusCode::SERVICE_UNAVAILABLE,
                CollectionError::Validation(_) => StatusCode::BAD_REQUEST,
                CollectionError::NotFound => StatusCode::NOT_FOUND,
            },
            ApiError::Sharing(e) => match e {
                SharingError::Store(e) => store_status(e),
                SharingError::Validation(_) => StatusCode::BAD_REQUEST,
                SharingError::NotFound => StatusCode::NOT_FOUND,
            },
            ApiError::Friends(e) => match e {
                FriendsError::Store(e) => store_status(e),
                FriendsError::Validation(_) => StatusCode::BAD_REQUEST,
                FriendsError::NotFound => StatusCode::NOT_FOUND,
            },
            ApiError::Trending(TrendingError::Store(e)) => store_status(e),
            ApiError::Catalog(e) => catalog_status(e),
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            error!(error = %self, status = %status, "Request failed");
            match status {
                StatusCode::BAD_GATEWAY => "Game catalog request failed".to_string(),
                _ => "Internal server error".to_string(),
            }
        } else {
            self.to_string()
        };

        (status, Json(ApiResponse::<()>::error(&message))).into_response()
    }
}
