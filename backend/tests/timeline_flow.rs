//! End-to-end flow over the HTTP surface: follow, post, fan out, read back
//! through both timeline strategies, and paginate.

use std::sync::Arc;

use actix_web::{App, test};
use serde_json::json;
use uuid::Uuid;

use backend::Trace;
use backend::api::posts::{PostView, TimelineEnvelope};
use backend::api::response::ApiResponse;
use backend::outbound::cache::InMemoryTimelineCache;
use backend::server::{AppConfig, Application, configure};

fn application() -> Application {
    Application::build_with_cache(
        &AppConfig::default(),
        Arc::new(InMemoryTimelineCache::default()),
    )
}

async fn follow(
    app: &impl actix_web::dev::Service<
        actix_http::Request,
        Response = actix_web::dev::ServiceResponse,
        Error = actix_web::Error,
    >,
    followed: Uuid,
    follower: Uuid,
) {
    let req = test::TestRequest::post()
        .uri(&format!("/users/{followed}/follow"))
        .set_json(json!({ "followerId": follower }))
        .to_request();
    let res = test::call_service(app, req).await;
    assert!(res.status().is_success(), "follow failed: {}", res.status());
}

async fn publish(
    app: &impl actix_web::dev::Service<
        actix_http::Request,
        Response = actix_web::dev::ServiceResponse,
        Error = actix_web::Error,
    >,
    author: Uuid,
    content: &str,
) -> PostView {
    let req = test::TestRequest::post()
        .uri("/posts")
        .insert_header(("x-user-id", author.to_string()))
        .set_json(json!({ "content": content }))
        .to_request();
    let res = test::call_service(app, req).await;
    assert!(res.status().is_success(), "publish failed: {}", res.status());
    let body: ApiResponse<PostView> = test::read_body_json(res).await;
    assert!(body.success);
    body.data.expect("created post payload")
}

async fn read_timeline(
    app: &impl actix_web::dev::Service<
        actix_http::Request,
        Response = actix_web::dev::ServiceResponse,
        Error = actix_web::Error,
    >,
    uri: &str,
) -> TimelineEnvelope {
    let res = test::call_service(app, test::TestRequest::get().uri(uri).to_request()).await;
    assert!(
        res.status().is_success(),
        "timeline read failed: {}",
        res.status()
    );
    test::read_body_json(res).await
}

#[actix_web::test]
async fn a_post_reaches_every_follower_through_both_strategies() {
    let application = application();
    let app = test::init_service(
        App::new()
            .wrap(Trace)
            .configure(configure(application.state.clone())),
    )
    .await;

    let author = Uuid::new_v4();
    let followers: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
    for follower in &followers {
        follow(&app, author, *follower).await;
    }

    let post = publish(&app, author, "hello").await;
    assert_eq!(post.author_id, author);
    assert_eq!(post.content, "hello");

    // Fan-out-on-write: each follower's materialised timeline has the copy.
    for follower in &followers {
        let page = read_timeline(&app, &format!("/posts/{follower}/timeline?size=20")).await;
        assert!(
            page.tweets
                .iter()
                .any(|row| row.author_id == author && row.content == "hello"),
            "follower {follower} did not receive the post"
        );
    }

    // Fan-out-on-read: the live merge agrees.
    for follower in &followers {
        let page = read_timeline(&app, &format!("/timeline/fan-out-read/{follower}?size=20")).await;
        assert!(
            page.tweets
                .iter()
                .any(|row| row.author_id == author && row.content == "hello"),
            "merge for {follower} did not include the post"
        );
    }

    // The author's own feed lists it as well.
    let own = read_timeline(&app, &format!("/posts/{author}?size=20")).await;
    assert_eq!(own.tweets.len(), 1);
    assert_eq!(own.tweets[0].post_id, post.post_id);
}

#[actix_web::test]
async fn timeline_pages_chain_without_overlap() {
    let application = application();
    let app = test::init_service(
        App::new()
            .wrap(Trace)
            .configure(configure(application.state.clone())),
    )
    .await;

    let author = Uuid::new_v4();
    let follower = Uuid::new_v4();
    follow(&app, author, follower).await;

    for n in 0..5 {
        publish(&app, author, &format!("post {n}")).await;
    }

    let first = read_timeline(&app, &format!("/posts/{follower}/timeline?size=2")).await;
    assert_eq!(first.tweets.len(), 2);
    assert!(first.has_more);
    // Full precision with a `Z` suffix: a `+00:00` offset would decode as a
    // space inside a query string.
    let cursor = first
        .next_cursor
        .expect("full page advertises a cursor")
        .to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true);

    let second = read_timeline(
        &app,
        &format!("/posts/{follower}/timeline?size=2&last={cursor}"),
    )
    .await;
    let first_ids: Vec<Uuid> = first.tweets.iter().map(|row| row.post_id).collect();
    assert!(
        second
            .tweets
            .iter()
            .all(|row| !first_ids.contains(&row.post_id)),
        "pages overlap"
    );
}

#[actix_web::test]
async fn invalid_requests_map_to_the_documented_statuses() {
    let application = application();
    let app = test::init_service(
        App::new()
            .wrap(Trace)
            .configure(configure(application.state.clone())),
    )
    .await;

    // Missing author header.
    let res = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/posts")
            .set_json(json!({ "content": "anonymous" }))
            .to_request(),
    )
    .await;
    assert_eq!(res.status(), 400);

    // Self-follow.
    let user = Uuid::new_v4();
    let res = test::call_service(
        &app,
        test::TestRequest::post()
            .uri(&format!("/users/{user}/follow"))
            .set_json(json!({ "followerId": user }))
            .to_request(),
    )
    .await;
    assert_eq!(res.status(), 409);

    // Duplicate follow.
    let (followed, follower) = (Uuid::new_v4(), Uuid::new_v4());
    follow(&app, followed, follower).await;
    let res = test::call_service(
        &app,
        test::TestRequest::post()
            .uri(&format!("/users/{followed}/follow"))
            .set_json(json!({ "followerId": follower }))
            .to_request(),
    )
    .await;
    assert_eq!(res.status(), 409);

    // Unknown post id.
    let res = test::call_service(
        &app,
        test::TestRequest::get()
            .uri(&format!("/posts/by-id/{}", Uuid::new_v4()))
            .to_request(),
    )
    .await;
    assert_eq!(res.status(), 404);
}

#[actix_web::test]
async fn unfollow_removes_the_ex_followees_posts_from_the_timeline() {
    let application = application();
    let app = test::init_service(
        App::new()
            .wrap(Trace)
            .configure(configure(application.state.clone())),
    )
    .await;

    let author = Uuid::new_v4();
    let follower = Uuid::new_v4();
    follow(&app, author, follower).await;
    publish(&app, author, "soon unfollowed").await;

    let before = read_timeline(&app, &format!("/posts/{follower}/timeline")).await;
    assert_eq!(before.tweets.len(), 1);

    let res = test::call_service(
        &app,
        test::TestRequest::delete()
            .uri(&format!("/users/{author}/follow"))
            .set_json(json!({ "followerId": follower }))
            .to_request(),
    )
    .await;
    assert!(res.status().is_success());

    let after = read_timeline(&app, &format!("/posts/{follower}/timeline")).await;
    assert!(
        after.tweets.is_empty(),
        "unfollow must purge the author's rows"
    );
}
