pub mod messages;
pub mod middleware;
pub mod progress;
pub mod state;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

use crate::state::AppState;

/// Authenticated routes over the lesson chat and learner progress.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/courses/{course_id}/lessons/{lesson_id}/messages",
            get(messages::get_messages),
        )
        .route("/courses/{course_id}/progress", get(progress::get_progress))
        .route(
            "/courses/{course_id}/lessons/{lesson_id}/complete",
            post(progress::complete_lesson),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ))
        .with_state(state)
}
