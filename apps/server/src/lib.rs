pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod subscriptions;
pub mod world;

use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use raid_core::FactCatalog;

use crate::subscriptions::SubscriptionRouter;
use crate::world::World;

/// Server configuration from the environment
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Shared secret for the identity gateway and the reward worker.
    pub verifier_token: String,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub world: Arc<Mutex<World>>,
    pub catalog: Arc<FactCatalog>,
    pub events: Arc<SubscriptionRouter>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            world: Arc::new(Mutex::new(World::new())),
            catalog: Arc::new(FactCatalog::standard()),
            events: Arc::new(SubscriptionRouter::new()),
            config: Arc::new(config),
        }
    }

    /// Lock the world. Every operation under this guard is one atomic,
    /// serialized transaction; nothing awaits while holding it.
    pub fn world(&self) -> MutexGuard<'_, World> {
        self.world.lock().expect("world mutex poisoned")
    }
}

/// Build the full router. Shared with the integration tests.
pub fn router(state: AppState) -> Router {
    let verifier_routes = Router::new()
        .route("/api/session", post(routes::session::create))
        .route("/api/admin/reset-mastery", post(routes::session::reset_mastery))
        .route("/api/worker/rewards", get(routes::worker::pending))
        .route("/api/worker/rewards/ack", post(routes::worker::ack))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            routes::auth::verifier_middleware,
        ));

    let player_routes = Router::new()
        .route("/api/connect", post(routes::players::connect))
        .route("/api/player", get(routes::players::me))
        .route("/api/raid/solo", post(routes::raids::start_solo))
        .route("/api/raid/room", post(routes::raids::create_room))
        .route("/api/raid/join", post(routes::raids::join_room))
        .route("/api/raid/ready", post(routes::raids::toggle_ready))
        .route("/api/raid/start", post(routes::raids::start))
        .route("/api/raid/rematch", post(routes::raids::rematch))
        .route("/api/raid/leave", post(routes::raids::leave))
        .route("/api/raid", get(routes::raids::current))
        .route("/api/lobby", get(routes::raids::lobby))
        .route("/api/problem", post(routes::play::request_problem))
        .route("/api/answer", post(routes::play::submit_answer))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            routes::auth::session_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/api/events", get(routes::events::ws_handler))
        .merge(verifier_routes)
        .merge(player_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let verifier_token = std::env::var("VERIFIER_TOKEN")
        .expect("VERIFIER_TOKEN must be set");

    let state = AppState::new(ServerConfig { verifier_token });

    tracing::info!("Starting sweep task...");
    tokio::spawn(services::sweep::run(state.clone()));

    let app = router(state);

    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("{}:{}", host, port);

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}
