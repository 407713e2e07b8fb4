use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::{error, warn};
use uuid::Uuid;

use agora_db::models::MessageRow;
use agora_types::api::{Claims, MessageResponse};
use agora_types::models::ChatMessage;
use agora_visibility::VisibilityError;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    50
}

/// Lesson chat as the caller is allowed to see it, oldest first.
pub async fn get_messages(
    State(state): State<AppState>,
    Path((course_id, lesson_id)): Path<(Uuid, Uuid)>,
    Query(query): Query<MessageQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let viewer_id = claims.sub;

    let cohort_id = state
        .engine
        .viewer_cohort(viewer_id, course_id)
        .await
        .map_err(engine_error)?;

    // Run blocking DB query off the async runtime
    let db = state.db.clone();
    let limit = query.limit.min(state.message_limit);
    let rows = tokio::task::spawn_blocking(move || {
        db.candidate_messages(
            &viewer_id.to_string(),
            &course_id.to_string(),
            &lesson_id.to_string(),
            cohort_id.map(|c| c.to_string()).as_deref(),
            limit,
        )
    })
    .await
    .map_err(|e| { error!("spawn_blocking join error: {}", e); StatusCode::INTERNAL_SERVER_ERROR })?
    .map_err(|e| { error!("Candidate query failed: {:#}", e); StatusCode::SERVICE_UNAVAILABLE })?;

    let candidates: Vec<ChatMessage> = rows.into_iter().filter_map(row_to_message).collect();

    let visible = state
        .engine
        .filter_visible_messages(candidates, viewer_id, course_id, cohort_id)
        .await
        .map_err(engine_error)?;

    let messages: Vec<MessageResponse> = visible.into_iter().map(to_response).collect();
    Ok(Json(messages))
}

pub(crate) fn engine_error(e: VisibilityError) -> StatusCode {
    error!("Visibility lookup failed: {}", e);
    StatusCode::SERVICE_UNAVAILABLE
}

/// Rows with unparseable identifiers are dropped rather than shown with a
/// made-up sender, since the sender decides visibility.
fn row_to_message(row: MessageRow) -> Option<ChatMessage> {
    let parse = |field: &str, value: &str| {
        value
            .parse::<Uuid>()
            .map_err(|e| warn!("Corrupt {} '{}' on message '{}': {}", field, value, row.id, e))
            .ok()
    };

    let id = parse("id", &row.id)?;
    let course_id = parse("course_id", &row.course_id)?;
    let lesson_id = parse("lesson_id", &row.lesson_id)?;
    let sender_id = parse("sender_id", &row.sender_id)?;
    let receiver_id = match row.receiver_id.as_deref() {
        Some(r) => Some(parse("receiver_id", r)?),
        None => None,
    };
    let cohort_id = match row.cohort_id.as_deref() {
        Some(c) => Some(parse("cohort_id", c)?),
        None => None,
    };
    // A broken reply reference only loses the reply relation
    let replied_to_id = row.replied_to_id.as_deref().and_then(|r| parse("replied_to_id", r));

    let created_at = row
        .created_at
        .parse::<chrono::DateTime<chrono::Utc>>()
        .or_else(|_| {
            // SQLite's datetime() format has no timezone. Parse as naive UTC.
            chrono::NaiveDateTime::parse_from_str(&row.created_at, "%Y-%m-%d %H:%M:%S")
                .map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt created_at '{}' on message '{}': {}", row.created_at, row.id, e);
            chrono::DateTime::default()
        });

    Some(ChatMessage {
        id,
        course_id,
        lesson_id,
        sender_id,
        receiver_id,
        cohort_id,
        replied_to_id,
        is_system: row.is_system,
        sender_is_staff: row.sender_is_staff,
        body: row.body,
        created_at,
    })
}

fn to_response(m: ChatMessage) -> MessageResponse {
    MessageResponse {
        id: m.id,
        lesson_id: m.lesson_id,
        sender_id: m.sender_id,
        receiver_id: m.receiver_id,
        cohort_id: m.cohort_id,
        replied_to_id: m.replied_to_id,
        is_system: m.is_system,
        sender_is_staff: m.sender_is_staff,
        body: m.body,
        created_at: m.created_at,
    }
}
