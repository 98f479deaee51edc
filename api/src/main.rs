mod alert_store;
mod budget_evaluator;
mod budget_handlers;
mod budget_scheduler;
mod budget_service;
mod budget_store;
mod cache;
mod contract_handlers;
mod contract_history_store;
mod contract_lifecycle;
mod contract_store;
mod error;
mod legacy_usage_tracker;
mod metrics;
mod metrics_handler;
mod migration_cli;
mod observability;
mod org_billing_store;
mod plan_store;
mod pricing_handlers;
mod pricing_resolver;
mod routes;
mod state;
mod tiered_cost_engine;
mod usage_aggregate_store;
mod usage_handlers;
mod usage_overview_service;
mod volume_tier_store;

use anyhow::Result;
use axum::http::{header, HeaderValue, Method};
use axum::{middleware, Router};
use dotenv::dotenv;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;

use crate::legacy_usage_tracker::UsageTracker;
use crate::observability::Observability;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let obs = Observability::init()?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let migration_command = migration_cli::parse_command(&args)?;

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    // Run migrations by default, or execute migration subcommands.
    if let Some(command) = migration_command {
        migration_cli::execute(command, &pool).await?;
        return Ok(());
    }

    sqlx::migrate!("../../database/migrations").run(&pool).await?;

    tracing::info!("Database connected and migrations applied");

    // Legacy quota tracker (§9): bounded-channel consumer plus a sync tick, both
    // observable on shutdown rather than fire-and-forget tasks.
    let (legacy_tracker, _legacy_shutdown) = UsageTracker::spawn(pool.clone());

    let state = AppState::new(pool.clone(), obs.registry, legacy_tracker);

    // Background budget evaluation, analogous to the platform's own hourly
    // aggregation job (§4.5).
    budget_scheduler::spawn_budget_check_task(pool, state.budgets.clone());

    let allowed_origin = std::env::var("CORS_ALLOWED_ORIGIN").unwrap_or_else(|_| "http://localhost:3000".into());
    let cors = CorsLayer::new()
        .allow_origin(
            allowed_origin
                .parse::<HeaderValue>()
                .unwrap_or_else(|_| HeaderValue::from_static("http://localhost:3000")),
        )
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let app = Router::new()
        .merge(routes::contract_routes())
        .merge(routes::pricing_routes())
        .merge(routes::usage_routes())
        .merge(routes::budget_routes())
        .merge(routes::health_routes())
        .layer(middleware::from_fn(request_logger))
        .layer(cors)
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], 3001));
    tracing::info!("API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}

async fn request_logger(
    req: axum::http::Request<axum::body::Body>,
    next: middleware::Next,
) -> axum::response::Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let start = std::time::Instant::now();

    let response = next.run(req).await;

    let elapsed = start.elapsed().as_secs_f64();
    let status = response.status().as_u16();
    metrics::observe_http(method.as_str(), uri.path(), status, elapsed);
    tracing::info!("{method} {uri} {status} {}ms", (elapsed * 1000.0) as u64);

    response
}
