use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

/// Appointment routes. Everything here sits behind the auth middleware;
/// handlers read the resolved `User` from request extensions.
pub fn appointment_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route(
            "/",
            post(handlers::create_appointment).get(handlers::list_appointments),
        )
        .route("/slots", get(handlers::get_available_slots))
        .route("/slots/check", get(handlers::check_slot_availability))
        .route("/{id}", get(handlers::get_appointment))
        .route("/{id}/cancel", put(handlers::cancel_appointment))
        .route("/{id}/status", put(handlers::change_appointment_status))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state)
}
