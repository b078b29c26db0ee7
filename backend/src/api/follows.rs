//! Follow graph endpoints.

use actix_web::{HttpResponse, delete, post, web};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::FollowEdge;
use crate::server::AppState;

use super::error::ApiResult;
use super::response::ApiResponse;

/// Body of follow and unfollow requests.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FollowRequest {
    /// The user initiating (or revoking) the follow.
    pub follower_id: Uuid,
}

/// A follow relation as rendered to clients.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FollowView {
    /// The user being followed.
    pub followed_user_id: Uuid,
    /// The user who follows.
    pub follower_id: Uuid,
    /// When the relation was created.
    pub since: chrono::DateTime<chrono::Utc>,
}

impl From<FollowEdge> for FollowView {
    fn from(value: FollowEdge) -> Self {
        Self {
            followed_user_id: value.followed_user_id,
            follower_id: value.follower_id,
            since: value.since,
        }
    }
}

/// Follow a user.
#[utoipa::path(
    post,
    path = "/users/{followed_user_id}/follow",
    params(("followed_user_id" = Uuid, Path, description = "User to follow")),
    request_body = FollowRequest,
    responses(
        (status = 200, description = "Relation created", body = FollowView),
        (status = 409, description = "Already following, or self-follow")
    ),
    tags = ["follows"],
    operation_id = "follow"
)]
#[post("/users/{followed_user_id}/follow")]
pub async fn follow(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<FollowRequest>,
) -> ApiResult<HttpResponse> {
    let followed_user_id = path.into_inner();
    let edge = state
        .follows
        .follow(followed_user_id, body.follower_id)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(FollowView::from(edge))))
}

/// Unfollow a user, purging their rows from the follower's timeline.
#[utoipa::path(
    delete,
    path = "/users/{followed_user_id}/follow",
    params(("followed_user_id" = Uuid, Path, description = "User to unfollow")),
    request_body = FollowRequest,
    responses(
        (status = 200, description = "Relation removed"),
        (status = 409, description = "Not currently following")
    ),
    tags = ["follows"],
    operation_id = "unfollow"
)]
#[delete("/users/{followed_user_id}/follow")]
pub async fn unfollow(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<FollowRequest>,
) -> ApiResult<HttpResponse> {
    let followed_user_id = path.into_inner();
    state
        .follows
        .unfollow(followed_user_id, body.follower_id)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::<()>::success_with_message("Unfollowed", ())))
}
