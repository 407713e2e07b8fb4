use std::collections::HashMap;

use agora_types::position::Position;
use anyhow::Result;
use async_trait::async_trait;
use futures_util::future::try_join_all;
use uuid::Uuid;

/// Read access to learners' course progress.
///
/// Implementations must treat "no recorded progress" as [`Position::ORIGIN`],
/// never as an error. Errors mean the store itself could not be reached.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Most advanced recorded position of `learner_id` in `course_id`.
    async fn resolve_position(&self, learner_id: Uuid, course_id: Uuid) -> Result<Position>;

    /// Positions for a set of learners.
    ///
    /// Learners may be missing from the returned map; callers treat a missing
    /// entry exactly like [`Position::ORIGIN`]. Map iteration order carries no
    /// meaning. The default issues every single lookup concurrently; stores
    /// that can answer in one query should override it.
    async fn resolve_positions(
        &self,
        learner_ids: &[Uuid],
        course_id: Uuid,
    ) -> Result<HashMap<Uuid, Position>> {
        let lookups = learner_ids.iter().map(|&learner_id| async move {
            let position = self.resolve_position(learner_id, course_id).await?;
            Ok::<_, anyhow::Error>((learner_id, position))
        });

        Ok(try_join_all(lookups).await?.into_iter().collect())
    }
}

/// Read access to cohort (promotion) enrollment.
#[async_trait]
pub trait CohortStore: Send + Sync {
    /// The learner's active cohort in the course, or `None` for individual mode.
    async fn cohort_membership(&self, learner_id: Uuid, course_id: Uuid) -> Result<Option<Uuid>>;
}
