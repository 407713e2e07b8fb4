use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum VisibilityError {
    #[error("progress store failed for course {course_id}: {cause:#}")]
    ProgressStore {
        course_id: Uuid,
        cause: anyhow::Error,
    },

    #[error("cohort store failed for learner {learner_id} in course {course_id}: {cause:#}")]
    CohortStore {
        learner_id: Uuid,
        course_id: Uuid,
        cause: anyhow::Error,
    },
}

pub type Result<T> = std::result::Result<T, VisibilityError>;
