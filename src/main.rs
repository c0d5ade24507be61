mod api;
mod catalog;
mod config;
mod models;
mod providers;
mod services;

use std::sync::Arc;

use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use config::{Config, ACCESS_CODE_ENV};
use providers::wsf::WsfClient;
use services::assembler::Assembler;

#[derive(OpenApi)]
#[openapi(
    info(title = "Ferry Dot-State API", version = "0.1.0"),
    paths(
        api::routes::list::list_routes,
        api::routes::dot_state::get_dot_state,
        api::health::health_check,
    ),
    components(schemas(
        api::ErrorResponse,
        api::health::HealthResponse,
        api::routes::list::RouteSummary,
        api::routes::list::RouteListResponse,
        models::Snapshot,
        models::RouteEcho,
        models::Lanes,
        models::Lane,
        models::CapacityBySide,
        models::Capacity,
        models::Meta,
        models::LaneSources,
        models::Fallback,
        models::Direction,
        models::Phase,
        models::LaneSource,
        models::FallbackMode,
    )),
    tags(
        (name = "routes", description = "Route catalog and dot-state snapshots"),
        (name = "health", description = "Service health check")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .init();

    let config = Config::load_or_default("config.yaml").expect("Failed to load config");
    config.validate();

    let access_code = config.access_code().unwrap_or_else(|| {
        panic!(
            "WSDOT access code missing: set api_access_code in config.yaml or the {} environment variable",
            ACCESS_CODE_ENV
        )
    });
    let client = WsfClient::new(&access_code).expect("Failed to build WSF client");

    let assembler = Arc::new(Assembler::new(client, config.parsed_timezone()));
    info!(
        routes = catalog::routes().len(),
        timezone = %config.parsed_timezone(),
        "Ferry dot-state server initialised"
    );

    let cors_layer = if config.cors_permissive {
        tracing::warn!("CORS: Permissive mode explicitly enabled (all origins allowed) - DO NOT USE IN PRODUCTION");
        CorsLayer::permissive()
    } else if !config.cors_origins.is_empty() {
        info!(origins = ?config.cors_origins, "CORS: Restricting to configured origins");
        let origins: Vec<_> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([axum::http::Method::GET, axum::http::Method::OPTIONS])
            .allow_headers([axum::http::header::CONTENT_TYPE])
    } else {
        panic!("CORS configuration error: Either set 'cors_origins' with allowed origins, or set 'cors_permissive: true' for development");
    };

    let app = axum::Router::new()
        .nest("/api", api::router(assembler))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind listener");
    info!(addr = %config.bind_addr, "Server running");
    info!("Swagger UI: /swagger-ui");

    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
