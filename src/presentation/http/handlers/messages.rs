use crate::application::chat::dto::{
    CreatedResponse, MessagesQuery, PostMessageRequest, ToggleLikeRequest, ToggleLikeResponse,
};
use crate::domain::chat::message::Message;
use crate::presentation::http::{errors::AppError, state::AppState};
use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
};
use validator::Validate;

pub async fn post_message(
    State(state): State<AppState>,
    payload: Result<Json<PostMessageRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedResponse>), AppError> {
    let Json(request) = payload?;
    request.validate()?;
    let id = state.chat.post_message(request.into()).await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

pub async fn list_messages(
    State(state): State<AppState>,
    Query(params): Query<MessagesQuery>,
) -> Result<Json<Vec<Message>>, AppError> {
    let messages = match params.usertag.as_deref().map(str::trim) {
        Some(usertag) if !usertag.is_empty() => state.chat.list_user_messages(usertag).await?,
        _ => state.chat.list_messages().await?,
    };
    Ok(Json(messages))
}

pub async fn get_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Message>, AppError> {
    let message = state
        .chat
        .get_message(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("message {}", id)))?;
    Ok(Json(message))
}

/// Always answers 200; the body says whether the like flipped.
pub async fn toggle_like(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<ToggleLikeRequest>, JsonRejection>,
) -> Result<Json<ToggleLikeResponse>, AppError> {
    let Json(request) = payload?;
    request.validate()?;
    let outcome = state.chat.toggle_like(&id, &request.user_id).await;
    Ok(Json(ToggleLikeResponse { outcome }))
}
