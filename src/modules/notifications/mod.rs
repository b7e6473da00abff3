use axum::Router;
use axum::routing::get;

use crate::state::AppState;

pub mod handler;
pub mod hub;

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(handler::ws_handler))
}
