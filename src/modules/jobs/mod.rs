use axum::Router;
use axum::middleware;
use axum::routing::{get, post};

use crate::state::AppState;

pub mod dto;
pub mod handler;
pub mod model;
pub mod payload;
pub mod repository;
pub mod service;
pub mod store;

pub fn router(state: AppState) -> Router<AppState> {
    let client_routes = Router::new()
        .route("/", post(handler::create_job))
        .route(
            "/{id}",
            get(handler::get_job).delete(handler::delete_job),
        )
        .route("/project/{project_id}", get(handler::list_project_jobs))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::auth::auth_middleware,
        ));

    // Status callbacks come from workers, which authenticate with the shared
    // API key instead of a bearer token.
    let worker_routes = Router::new()
        .route("/{id}/status", post(handler::update_job_status))
        .route_layer(middleware::from_fn_with_state(
            state,
            crate::middleware::worker_auth::worker_auth_middleware,
        ));

    client_routes.merge(worker_routes)
}
