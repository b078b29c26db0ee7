//! Fan-out-on-read timeline endpoint.

use actix_web::{HttpResponse, get, web};
use chrono::{DateTime, Utc};
use pagination::clamp_page_size;
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::server::AppState;

use super::error::ApiResult;
use super::posts::TimelineEnvelope;

/// Cursor query for the read-merge timeline.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct ReadMergeQuery {
    /// ISO-8601 cursor: return posts strictly older than this instant.
    pub cursor: Option<DateTime<Utc>>,
    /// Page size, default 20, max 50.
    pub size: Option<usize>,
}

/// A user's home timeline computed by merging followees' posts at read time.
///
/// This is the pull strategy: nothing is materialised at post time, so it
/// serves celebrity authors whose eager fan-out is deferred, and any
/// deployment that prefers cheap writes over cheap reads.
#[utoipa::path(
    get,
    path = "/timeline/fan-out-read/{user_id}",
    params(
        ("user_id" = Uuid, Path, description = "Viewer identifier"),
        ReadMergeQuery
    ),
    responses((status = 200, description = "One merged timeline page", body = TimelineEnvelope)),
    tags = ["timeline"],
    operation_id = "getMergedTimeline"
)]
#[get("/timeline/fan-out-read/{user_id}")]
pub async fn get_merged_timeline(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    query: web::Query<ReadMergeQuery>,
) -> ApiResult<HttpResponse> {
    let viewer_id = path.into_inner();
    let size = clamp_page_size(query.size);
    let page = state
        .fanout_read
        .timeline(viewer_id, query.cursor, size)
        .await?;
    Ok(HttpResponse::Ok().json(TimelineEnvelope::from_page(page)))
}
