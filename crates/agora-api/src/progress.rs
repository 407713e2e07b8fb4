use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{error, warn};
use uuid::Uuid;

use agora_db::{AdvanceOutcome, UnlockError};
use agora_types::api::{Claims, CompleteLessonRequest, CompleteLessonResponse, ProgressResponse};
use agora_types::models::UnlockReason;

use crate::state::AppState;

pub async fn get_progress(
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();
    let learner_id = claims.sub;
    let position = tokio::task::spawn_blocking(move || {
        db.current_position(&learner_id.to_string(), &course_id.to_string())
    })
    .await
    .map_err(|e| { error!("spawn_blocking join error: {}", e); StatusCode::INTERNAL_SERVER_ERROR })?
    .map_err(|e| { error!("Progress lookup failed: {:#}", e); StatusCode::SERVICE_UNAVAILABLE })?;

    Ok(Json(ProgressResponse {
        learner_id,
        course_id,
        position,
    }))
}

/// Unlock transition entry point.
///
/// A passed quiz unlocks the caller, one lesson at a time. A reviewed exercise
/// is reported by course staff on behalf of the learner named in the body.
pub async fn complete_lesson(
    State(state): State<AppState>,
    Path((course_id, lesson_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CompleteLessonRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let learner_id = match req.reason {
        UnlockReason::QuizPassed => match req.learner_id {
            Some(id) if id != claims.sub => return Err(StatusCode::FORBIDDEN),
            _ => claims.sub,
        },
        UnlockReason::ExerciseReviewed => req.learner_id.ok_or(StatusCode::BAD_REQUEST)?,
    };

    let db = state.db.clone();
    let caller = claims.sub;
    let reason = req.reason;
    let outcome = tokio::task::spawn_blocking(move || -> Result<Option<AdvanceOutcome>, UnlockError> {
        if reason == UnlockReason::ExerciseReviewed
            && !db
                .is_staff(&course_id.to_string(), &caller.to_string())
                .map_err(UnlockError::Storage)?
        {
            return Ok(None);
        }
        db.complete_lesson(&learner_id.to_string(), course_id, lesson_id, reason)
            .map(Some)
    })
    .await
    .map_err(|e| { error!("spawn_blocking join error: {}", e); StatusCode::INTERNAL_SERVER_ERROR })?
    .map_err(|e| match e {
        UnlockError::UnknownLesson { .. } | UnlockError::UnknownLearner { .. } => {
            warn!("{}", e);
            StatusCode::NOT_FOUND
        }
        UnlockError::NotNextLesson { .. } => {
            warn!("Quiz unlock refused: {}", e);
            StatusCode::CONFLICT
        }
        UnlockError::Storage(e) => {
            error!("Unlock failed: {:#}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    })?
    .ok_or_else(|| {
        warn!("User {} is not staff in course {}, exercise review refused", caller, course_id);
        StatusCode::FORBIDDEN
    })?;

    Ok(Json(match outcome {
        AdvanceOutcome::Advanced { from, to } => CompleteLessonResponse::Advanced { from, to },
        AdvanceOutcome::Unchanged { current } => CompleteLessonResponse::Unchanged { current },
    }))
}
