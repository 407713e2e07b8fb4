use std::collections::HashMap;
use std::sync::Arc;

use agora_types::models::ChatMessage;
use agora_types::position::Position;
use futures_util::future::try_join;
use tracing::debug;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::{Result, VisibilityError};
use crate::progress::{distinct_senders, position_or_origin, sender_positions, viewer_position};
use crate::provenance::{CandidateIndex, Provenance, classify};
use crate::store::{CohortStore, ProgressStore};

/// The viewer a batch of messages is being filtered for.
#[derive(Debug, Clone, Copy)]
pub struct Viewer {
    pub id: Uuid,
    pub cohort_id: Option<Uuid>,
    pub position: Position,
}

/// Outcome for a single candidate message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub message_id: Uuid,
    pub provenance: Provenance,
    pub visible: bool,
}

/// Whether `viewer` may see `message`, given its provenance.
///
/// Peer messages are visible only when the sender is at or before the viewer.
/// A sender missing from `sender_positions` counts as having no progress.
/// Peer traffic tagged with another cohort is never visible.
pub fn is_visible(
    message: &ChatMessage,
    provenance: Provenance,
    viewer: &Viewer,
    sender_positions: &HashMap<Uuid, Position>,
) -> bool {
    if provenance.bypasses_gating() {
        return true;
    }
    if message.cohort_id.is_some_and(|c| viewer.cohort_id != Some(c)) {
        return false;
    }
    position_or_origin(sender_positions, &message.sender_id).is_at_or_before(&viewer.position)
}

pub struct VisibilityEngine {
    progress: Arc<dyn ProgressStore>,
    cohorts: Arc<dyn CohortStore>,
    config: EngineConfig,
}

impl VisibilityEngine {
    pub fn new(
        progress: Arc<dyn ProgressStore>,
        cohorts: Arc<dyn CohortStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            progress,
            cohorts,
            config,
        }
    }

    /// The viewer's active cohort in the course. `None` means individual mode.
    pub async fn viewer_cohort(&self, viewer_id: Uuid, course_id: Uuid) -> Result<Option<Uuid>> {
        self.cohorts
            .cohort_membership(viewer_id, course_id)
            .await
            .map_err(|cause| VisibilityError::CohortStore {
                learner_id: viewer_id,
                course_id,
                cause,
            })
    }

    /// One decision per candidate, in candidate order.
    ///
    /// Without a cohort only system, own and addressed messages pass, and the
    /// progress store is not consulted. With a cohort, the viewer's position and
    /// the positions of peer senders are looked up concurrently.
    pub async fn decide(
        &self,
        candidates: &[ChatMessage],
        viewer_id: Uuid,
        course_id: Uuid,
        viewer_cohort_id: Option<Uuid>,
    ) -> Result<Vec<Decision>> {
        let index = CandidateIndex::new(candidates);
        let provenances: Vec<Provenance> = candidates
            .iter()
            .map(|m| classify(m, viewer_id, &index))
            .collect();

        let Some(cohort_id) = viewer_cohort_id else {
            debug!(
                "Viewer {} has no cohort in course {}, individual mode over {} candidates",
                viewer_id,
                course_id,
                candidates.len()
            );
            return Ok(candidates
                .iter()
                .zip(provenances)
                .map(|(m, provenance)| Decision {
                    message_id: m.id,
                    provenance,
                    visible: provenance.is_direct(),
                })
                .collect());
        };

        let peers = distinct_senders(
            candidates
                .iter()
                .zip(&provenances)
                .filter(|(_, p)| !p.bypasses_gating())
                .map(|(m, _)| m.sender_id),
        );

        let (position, positions) = if peers.is_empty() {
            (Position::ORIGIN, HashMap::new())
        } else {
            try_join(
                viewer_position(self.progress.as_ref(), viewer_id, course_id),
                sender_positions(
                    self.progress.as_ref(),
                    &peers,
                    course_id,
                    self.config.sender_lookup_failure,
                ),
            )
            .await?
        };

        let viewer = Viewer {
            id: viewer_id,
            cohort_id: Some(cohort_id),
            position,
        };

        let decisions: Vec<Decision> = candidates
            .iter()
            .zip(provenances)
            .map(|(m, provenance)| Decision {
                message_id: m.id,
                provenance,
                visible: is_visible(m, provenance, &viewer, &positions),
            })
            .collect();

        debug!(
            "Viewer {} at {} in cohort {}: {}/{} messages visible ({} peer senders)",
            viewer.id,
            viewer.position,
            cohort_id,
            decisions.iter().filter(|d| d.visible).count(),
            decisions.len(),
            peers.len()
        );

        Ok(decisions)
    }

    /// Keep the candidates the viewer may see, in their original order.
    pub async fn filter_visible_messages(
        &self,
        candidates: Vec<ChatMessage>,
        viewer_id: Uuid,
        course_id: Uuid,
        viewer_cohort_id: Option<Uuid>,
    ) -> Result<Vec<ChatMessage>> {
        let decisions = self
            .decide(&candidates, viewer_id, course_id, viewer_cohort_id)
            .await?;

        Ok(candidates
            .into_iter()
            .zip(decisions)
            .filter_map(|(m, d)| d.visible.then_some(m))
            .collect())
    }

    /// Resolve the viewer's cohort, then filter.
    pub async fn visible_messages_for(
        &self,
        candidates: Vec<ChatMessage>,
        viewer_id: Uuid,
        course_id: Uuid,
    ) -> Result<Vec<ChatMessage>> {
        let cohort_id = self.viewer_cohort(viewer_id, course_id).await?;
        self.filter_visible_messages(candidates, viewer_id, course_id, cohort_id)
            .await
    }
}
