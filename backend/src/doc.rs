//! OpenAPI documentation configuration.
//!
//! Defines the [`ApiDoc`] struct generating the OpenAPI specification for
//! the REST API: every timeline/post/follow endpoint, the health probes,
//! and the DTO schemas they reference. Swagger UI serves the document in
//! debug builds.

use utoipa::OpenApi;

use crate::api::follows::{FollowRequest, FollowView};
use crate::api::posts::{CreatePostRequest, PostView, TimelineEnvelope};

/// OpenAPI document for the REST API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Timeline feed API",
        description = "Post publication with fan-out-on-write, cached timeline reads, \
                       and a fan-out-on-read merge path."
    ),
    servers(
        (url = "/", description = "Relative to the deployment base URL")
    ),
    paths(
        crate::api::posts::create_post,
        crate::api::posts::get_post,
        crate::api::posts::get_user_posts,
        crate::api::posts::get_home_timeline,
        crate::api::timeline::get_merged_timeline,
        crate::api::follows::follow,
        crate::api::follows::unfollow,
        crate::api::health::ready,
        crate::api::health::live,
    ),
    components(schemas(
        CreatePostRequest,
        PostView,
        TimelineEnvelope,
        FollowRequest,
        FollowView
    )),
    tags(
        (name = "posts", description = "Publishing and reading posts"),
        (name = "timeline", description = "Home timeline reads"),
        (name = "follows", description = "Follow graph maintenance"),
        (name = "health", description = "Probes for orchestration")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_registers_every_endpoint() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        for expected in [
            "/posts",
            "/posts/by-id/{post_id}",
            "/posts/{user_id}",
            "/posts/{user_id}/timeline",
            "/timeline/fan-out-read/{user_id}",
            "/users/{followed_user_id}/follow",
            "/health/ready",
            "/health/live",
        ] {
            assert!(
                paths.iter().any(|path| path.as_str() == expected),
                "missing path {expected}"
            );
        }
    }
}
