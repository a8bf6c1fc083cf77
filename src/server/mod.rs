//! Server initialization and routing

use crate::api;
use crate::api::metrics::MetricsState;
use crate::config::Config;
use crate::context::{Clock, SystemClock};
use crate::jwt::JwtManager;
use crate::middleware::{request_context_middleware, RequestMetricsLayer};
use crate::repository::MySqlResourcePool;
use crate::service::UserService;
use crate::state::HasServices;
use anyhow::{Context, Result};
use axum::{middleware::from_fn_with_state, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::mysql::MySqlPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pool: MySqlResourcePool,
    pub users: Arc<UserService>,
    pub jwt_manager: Arc<JwtManager>,
    pub clock: SystemClock,
}

/// Implement HasServices trait for production AppState
impl HasServices for AppState {
    type Pool = MySqlResourcePool;
    type Users = UserService;

    fn config(&self) -> &Config {
        &self.config
    }

    fn pool(&self) -> &Self::Pool {
        &self.pool
    }

    fn users(&self) -> &Self::Users {
        &self.users
    }

    fn jwt_manager(&self) -> &JwtManager {
        &self.jwt_manager
    }

    fn clock(&self) -> &dyn Clock {
        &self.clock
    }
}

/// Run the server
pub async fn run(config: Config, prometheus_handle: Option<PrometheusHandle>) -> Result<()> {
    // Exhaustion must fail the request instead of queueing it forever.
    let db_pool = MySqlPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(config.database.acquire_timeout())
        .connect(&config.database.url)
        .await
        .context("Failed to connect to database")?;

    info!("Connected to database");

    let jwt_manager = JwtManager::new(config.jwt.clone())?;
    info!(rsa = jwt_manager.uses_rsa(), "JWT manager ready");

    let state = AppState {
        config: Arc::new(config.clone()),
        pool: MySqlResourcePool::new(db_pool),
        users: Arc::new(UserService::new()),
        jwt_manager: Arc::new(jwt_manager),
        clock: SystemClock,
    };

    let app = build_router(state).merge(metrics_router(Arc::new(prometheus_handle)));

    let http_addr = config.http_addr();
    let listener = TcpListener::bind(&http_addr)
        .await
        .with_context(|| format!("Failed to bind {}", http_addr))?;
    info!("HTTP server started on {}", http_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Router exposing the Prometheus endpoint
pub fn metrics_router(handle: MetricsState) -> Router {
    Router::new()
        .route("/metrics", get(api::metrics::metrics_handler))
        .with_state(handle)
}

/// Build the HTTP router with generic state type
///
/// This function is generic over the state type, allowing it to work with
/// both production `AppState` and test implementations that implement `HasServices`.
pub fn build_router<S: HasServices>(state: S) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health endpoints
        .route("/health", get(api::health::health))
        .route("/ready", get(api::health::ready::<S>))
        // User endpoints; the static token path wins over `{id}`
        .route(
            "/v1/users",
            get(api::user::list::<S>).post(api::user::create::<S>),
        )
        .route("/v1/users/token", get(api::user::token::<S>))
        .route(
            "/v1/users/{id}",
            get(api::user::retrieve::<S>)
                .put(api::user::update::<S>)
                .delete(api::user::delete::<S>),
        )
        // The last layer added sees the request first.
        .layer(from_fn_with_state(
            state.clone(),
            request_context_middleware::<S>,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestMetricsLayer)
        .with_state(state)
}
