use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A chat message as seen by the visibility engine.
///
/// `replied_to_id` is only an identifier. The referenced message may or may
/// not be part of the same candidate window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub course_id: Uuid,
    pub lesson_id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Option<Uuid>,
    pub cohort_id: Option<Uuid>,
    pub replied_to_id: Option<Uuid>,
    pub is_system: bool,
    /// Whether the sender is teacher/staff in this course. Joined in by the
    /// message store, never computed by the engine.
    pub sender_is_staff: bool,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Why a learner's position is being advanced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnlockReason {
    /// A teacher reviewed the learner's exercise.
    ExerciseReviewed,
    /// The learner passed the lesson quiz.
    QuizPassed,
}

impl UnlockReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExerciseReviewed => "exercise_reviewed",
            Self::QuizPassed => "quiz_passed",
        }
    }
}
