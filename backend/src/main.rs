//! Backend entry-point: wires engines, routes, the retry consumer, and
//! OpenAPI docs.

use actix_web::{App, HttpServer, web};
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt};
#[cfg(debug_assertions)]
use utoipa::OpenApi;
#[cfg(debug_assertions)]
use utoipa_swagger_ui::SwaggerUi;

use backend::Trace;
use backend::api::health::{HealthState, live, ready};
#[cfg(debug_assertions)]
use backend::doc::ApiDoc;
use backend::server::{AppConfig, Application, configure};

/// Application bootstrap.
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let config = AppConfig::from_env();
    let application = Application::build(&config).await;
    let retry_worker = application.spawn_retry_processor();
    let state = application.state.clone();

    let health_state = web::Data::new(HealthState::new());
    // Clone for the server factory so the readiness probe stays accessible.
    let server_health_state = health_state.clone();
    let server = HttpServer::new(move || {
        let app = App::new()
            .app_data(server_health_state.clone())
            .wrap(Trace)
            .configure(configure(state.clone()))
            .service(ready)
            .service(live);

        #[cfg(debug_assertions)]
        let app =
            app.service(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()));

        app
    })
    .bind(config.bind_addr)?;

    health_state.mark_ready();
    let outcome = server.run().await;

    application.shutdown();
    retry_worker.abort();
    outcome
}
