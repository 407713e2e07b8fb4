use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::UnlockReason;
use crate::position::Position;

// -- JWT Claims --

/// JWT claims issued by the platform's auth service. Only `sub` is trusted
/// as the viewer identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    /// Informational only. Tokens issued without it are still valid.
    #[serde(default)]
    pub username: String,
    pub exp: usize,
}

// -- Messages --

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub id: Uuid,
    pub lesson_id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Option<Uuid>,
    pub cohort_id: Option<Uuid>,
    pub replied_to_id: Option<Uuid>,
    pub is_system: bool,
    pub sender_is_staff: bool,
    pub body: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

// -- Progress --

#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub learner_id: Uuid,
    pub course_id: Uuid,
    pub position: Position,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompleteLessonRequest {
    /// Learner being unlocked. Defaults to the caller.
    pub learner_id: Option<Uuid>,
    pub reason: UnlockReason,
}

#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CompleteLessonResponse {
    Advanced { from: Position, to: Position },
    Unchanged { current: Position },
}
