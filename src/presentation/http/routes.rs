use super::{
    handlers::{comments, health, messages, ws},
    middleware::{logging::logging_middleware, request_id::request_id_middleware},
    state::AppState,
};
use axum::{
    Router, middleware,
    routing::{get, post},
};

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        // Messages
        .route(
            "/api/v1/messages",
            post(messages::post_message).get(messages::list_messages),
        )
        .route("/api/v1/messages/{id}", get(messages::get_message))
        .route("/api/v1/messages/{id}/like", post(messages::toggle_like))
        // Comments
        .route(
            "/api/v1/messages/{id}/comments",
            post(comments::add_comment).get(comments::list_comments),
        )
        // WebSocket live feeds
        .route("/api/v1/ws/messages", get(ws::messages_feed))
        .route(
            "/api/v1/ws/messages/{id}/comments",
            get(ws::comments_feed),
        )
        .route(
            "/api/v1/ws/users/{usertag}/messages",
            get(ws::user_messages_feed),
        )
        .layer(middleware::from_fn(logging_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}
