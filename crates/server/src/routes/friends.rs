use axum::{
    Router,
    extract::State,
    response::Json as ResponseJson,
    routing::{get, put},
};
use db::models::friend_list::{CreateFriendList, FriendList, UpdateFriendList};
use services::services::friends::{FollowedProfile, Follower};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    AppState,
    error::ApiError,
    extract::{CurrentUser, Json, Path},
};

pub async fn list_following(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<ResponseJson<ApiResponse<Vec<FollowedProfile>>>, ApiError> {
    let following = state.friends.following(user_id).await?;
    Ok(ResponseJson(ApiResponse::success(following)))
}

pub async fn follow(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(payload): Json<CreateFriendList>,
) -> Result<ResponseJson<ApiResponse<FriendList>>, ApiError> {
    let edge = state.friends.follow(user_id, payload).await?;
    Ok(ResponseJson(ApiResponse::success(edge)))
}

pub async fn rename_friend(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(friend_id): Path<Uuid>,
    Json(payload): Json<UpdateFriendList>,
) -> Result<ResponseJson<ApiResponse<FriendList>>, ApiError> {
    let edge = state.friends.rename(user_id, friend_id, payload).await?;
    Ok(ResponseJson(ApiResponse::success(edge)))
}

pub async fn unfollow(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(friend_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    state.friends.unfollow(user_id, friend_id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub async fn list_followers(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<ResponseJson<ApiResponse<Vec<Follower>>>, ApiError> {
    let followers = state.friends.followers(user_id).await?;
    Ok(ResponseJson(ApiResponse::success(followers)))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/friends", get(list_following).post(follow))
        .route("/friends/{friend_id}", put(rename_friend).delete(unfollow))
        .route("/followers", get(list_followers))
}
