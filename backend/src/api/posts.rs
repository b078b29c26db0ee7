//! Post creation and the fan-out-on-write read endpoints.

use actix_web::{HttpRequest, HttpResponse, get, post, web};
use chrono::{DateTime, Utc};
use pagination::{CursorPage, clamp_page_size};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::domain::ports::{AuthorPostsStore as _, PostStore as _};
use crate::domain::{Post, TimelineEntry};
use crate::server::AppState;

use super::error::{ApiError, ApiResult};
use super::response::ApiResponse;

/// Header naming the acting user. Authentication itself is an upstream
/// concern; by the time a request reaches this service the gateway has
/// resolved the caller to an id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Body of `POST /posts`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    /// Post body.
    #[schema(example = "hello")]
    pub content: String,
}

/// One post as rendered to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    /// Post identifier.
    pub post_id: Uuid,
    /// Author identifier.
    pub author_id: Uuid,
    /// Post body.
    pub content: String,
    /// Publication instant.
    pub created_at: DateTime<Utc>,
}

impl From<Post> for PostView {
    fn from(value: Post) -> Self {
        Self {
            post_id: value.id,
            author_id: value.author_id,
            content: value.content,
            created_at: value.created_at,
        }
    }
}

impl From<TimelineEntry> for PostView {
    fn from(value: TimelineEntry) -> Self {
        Self {
            post_id: value.post_id,
            author_id: value.author_id,
            content: value.content,
            created_at: value.created_at,
        }
    }
}

/// Page envelope shared by every timeline read.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEnvelope {
    /// Rows, newest first.
    pub tweets: Vec<PostView>,
    /// Cursor for the next page; absent on the final page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<DateTime<Utc>>,
    /// Whether a further page may exist.
    pub has_more: bool,
}

impl TimelineEnvelope {
    /// Render a domain page.
    #[must_use]
    pub fn from_page<T: Into<PostView>>(page: CursorPage<T>) -> Self {
        let page = page.map(Into::into);
        Self {
            tweets: page.items,
            next_cursor: page.next_cursor,
            has_more: page.has_more,
        }
    }
}

/// Cursor query for materialised timeline reads.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct TimelineQuery {
    /// ISO-8601 cursor: return rows strictly older than this instant.
    pub last: Option<DateTime<Utc>>,
    /// Page size, default 20, max 50.
    pub size: Option<usize>,
}

/// Resolve the acting user from the request headers.
pub fn acting_user(req: &HttpRequest) -> Result<Uuid, ApiError> {
    let value = req
        .headers()
        .get(USER_ID_HEADER)
        .ok_or_else(|| ApiError::validation("missing x-user-id header"))?;
    let raw = value
        .to_str()
        .map_err(|_| ApiError::validation("malformed x-user-id header"))?;
    raw.parse()
        .map_err(|_| ApiError::validation("x-user-id must be a UUID"))
}

/// Publish a post and fan it out to follower timelines.
///
/// Returns success as soon as the canonical record and the author's feed
/// copy are durable; follower timelines may lag briefly if fan-out is being
/// repaired asynchronously.
#[utoipa::path(
    post,
    path = "/posts",
    request_body = CreatePostRequest,
    responses(
        (status = 200, description = "Post created", body = PostView),
        (status = 400, description = "Missing author or invalid content")
    ),
    tags = ["posts"],
    operation_id = "createPost"
)]
#[post("/posts")]
pub async fn create_post(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<CreatePostRequest>,
) -> ApiResult<HttpResponse> {
    let author_id = acting_user(&req)?;
    let post = state
        .fanout_write
        .create_post(author_id, &body.content)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(PostView::from(post))))
}

/// A single post by id.
#[utoipa::path(
    get,
    path = "/posts/by-id/{post_id}",
    params(("post_id" = Uuid, Path, description = "Post identifier")),
    responses(
        (status = 200, description = "The post", body = PostView),
        (status = 404, description = "No such post")
    ),
    tags = ["posts"],
    operation_id = "getPost"
)]
#[get("/posts/by-id/{post_id}")]
pub async fn get_post(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    let post_id = path.into_inner();
    let post = state
        .posts
        .find_by_id(post_id)
        .await
        .map_err(crate::domain::Error::from)?
        .ok_or_else(|| ApiError::from(crate::domain::Error::not_found("no such post")))?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(PostView::from(post))))
}

/// A user's own published posts, newest first.
#[utoipa::path(
    get,
    path = "/posts/{user_id}",
    params(
        ("user_id" = Uuid, Path, description = "Author identifier"),
        TimelineQuery
    ),
    responses((status = 200, description = "The author's posts", body = TimelineEnvelope)),
    tags = ["posts"],
    operation_id = "getUserPosts"
)]
#[get("/posts/{user_id}")]
pub async fn get_user_posts(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    query: web::Query<TimelineQuery>,
) -> ApiResult<HttpResponse> {
    let author_id = path.into_inner();
    let size = clamp_page_size(query.size);
    let posts = state
        .author_posts
        .recent_by_author(author_id, query.last, size)
        .await
        .map_err(crate::domain::Error::from)?;
    let page = CursorPage::from_newest_first(posts, size);
    Ok(HttpResponse::Ok().json(TimelineEnvelope::from_page(page)))
}

/// A user's materialised home timeline (fan-out-on-write read path).
///
/// Served from the timeline cache when warm; a cold key falls back to one
/// partition read from the timeline store and schedules a detached refill.
#[utoipa::path(
    get,
    path = "/posts/{user_id}/timeline",
    params(
        ("user_id" = Uuid, Path, description = "Timeline owner"),
        TimelineQuery
    ),
    responses((status = 200, description = "One timeline page", body = TimelineEnvelope)),
    tags = ["timeline"],
    operation_id = "getHomeTimeline"
)]
#[get("/posts/{user_id}/timeline")]
pub async fn get_home_timeline(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    query: web::Query<TimelineQuery>,
) -> ApiResult<HttpResponse> {
    let owner_id = path.into_inner();
    let size = clamp_page_size(query.size);
    let page = state
        .timeline_query
        .home_timeline(owner_id, query.last, size)
        .await?;
    Ok(HttpResponse::Ok().json(TimelineEnvelope::from_page(page)))
}
