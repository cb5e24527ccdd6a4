// HTTP + WebSocket routes

mod http;
mod ws;

use axum::{Router, routing::get};
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use tower_http::cors::{Any, CorsLayer};

use crate::context::Monitors;
use crate::events::EventBus;
use crate::history_repo::HistoryRepo;

#[derive(Clone)]
pub struct AppState {
    pub(crate) events: EventBus,
    pub(crate) history: Arc<HistoryRepo>,
    pub(crate) monitors: Monitors,
    pub(crate) ws_connections: Arc<AtomicUsize>,
}

impl AppState {
    pub fn new(events: EventBus, history: Arc<HistoryRepo>, monitors: Monitors) -> Self {
        Self {
            events,
            history,
            monitors,
            ws_connections: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Open live-stream sockets.
    pub fn ws_connections(&self) -> usize {
        self.ws_connections
            .load(std::sync::atomic::Ordering::Relaxed)
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { crate::version::banner() })) // GET /
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/interfaces", get(http::interfaces_handler)) // GET /api/interfaces
        .route("/api/bandwidths", get(http::bandwidths_handler)) // GET /api/bandwidths?limit=
        .route("/api/pings", get(http::pings_handler)) // GET /api/pings?limit=
        .route("/api/pings/latest", get(http::latest_pings_handler)) // GET /api/pings/latest
        .route("/ws/bandwidth", get(ws::ws_bandwidth)) // WS /ws/bandwidth
        .route("/ws/ping", get(ws::ws_ping)) // WS /ws/ping
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
