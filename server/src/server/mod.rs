mod routes;
mod websocket;

pub use routes::{HealthResponse, MetricsResponse, app_routes, update_gauge_metrics};
pub use websocket::{AppState, ws_handler};
