use crate::application::chat::dto::{AddCommentRequest, CreatedResponse};
use crate::domain::chat::comment::Comment;
use crate::presentation::http::{errors::AppError, state::AppState};
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use validator::Validate;

pub async fn add_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<AddCommentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedResponse>), AppError> {
    let Json(request) = payload?;
    request.validate()?;
    if request.body.trim().is_empty() {
        return Err(AppError::BadRequest("Comment cannot be empty".into()));
    }

    let comment_id = state
        .chat
        .post_comment(request.body, request.usertag, request.username, &id)
        .await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id: comment_id })))
}

pub async fn list_comments(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Comment>>, AppError> {
    Ok(Json(state.chat.list_comments(&id).await?))
}
