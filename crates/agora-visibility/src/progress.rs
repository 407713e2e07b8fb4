use std::collections::{HashMap, HashSet};

use agora_types::position::Position;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::SenderLookupFailure;
use crate::error::{Result, VisibilityError};
use crate::store::ProgressStore;

/// Current position of the viewer. Store failures are hard failures.
pub async fn viewer_position<P>(store: &P, viewer_id: Uuid, course_id: Uuid) -> Result<Position>
where
    P: ProgressStore + ?Sized,
{
    store
        .resolve_position(viewer_id, course_id)
        .await
        .map_err(|cause| VisibilityError::ProgressStore { course_id, cause })
}

/// Deduplicate sender ids, keeping first-seen order.
pub fn distinct_senders<I>(sender_ids: I) -> Vec<Uuid>
where
    I: IntoIterator<Item = Uuid>,
{
    let mut seen = HashSet::new();
    sender_ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

/// Positions of message senders in one batch.
///
/// An empty sender list never reaches the store. Senders absent from the
/// result are meant to be read as [`Position::ORIGIN`].
pub async fn sender_positions<P>(
    store: &P,
    sender_ids: &[Uuid],
    course_id: Uuid,
    on_failure: SenderLookupFailure,
) -> Result<HashMap<Uuid, Position>>
where
    P: ProgressStore + ?Sized,
{
    if sender_ids.is_empty() {
        return Ok(HashMap::new());
    }

    match store.resolve_positions(sender_ids, course_id).await {
        Ok(positions) => {
            debug!(
                "Resolved {}/{} sender positions for course {}",
                positions.len(),
                sender_ids.len(),
                course_id
            );
            Ok(positions)
        }
        Err(cause) => match on_failure {
            SenderLookupFailure::Degrade => {
                warn!(
                    "Sender position lookup failed for course {}, treating {} senders as unprogressed: {:#}",
                    course_id,
                    sender_ids.len(),
                    cause
                );
                Ok(HashMap::new())
            }
            SenderLookupFailure::Propagate => {
                Err(VisibilityError::ProgressStore { course_id, cause })
            }
        },
    }
}

/// Position of `sender_id`, defaulting to the origin when unknown.
pub fn position_or_origin(positions: &HashMap<Uuid, Position>, sender_id: &Uuid) -> Position {
    positions.get(sender_id).copied().unwrap_or(Position::ORIGIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MockProgress, SparseProgress};

    #[test]
    fn distinct_senders_keeps_first_seen_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(distinct_senders([a, b, a, b, a]), vec![a, b]);
    }

    #[tokio::test]
    async fn viewer_without_progress_is_at_origin() {
        let store = MockProgress::new();
        let position = viewer_position(&store, Uuid::new_v4(), Uuid::new_v4()).await.unwrap();
        assert_eq!(position, Position::ORIGIN);
    }

    #[tokio::test]
    async fn viewer_lookup_failure_propagates() {
        let store = MockProgress::new().failing();
        let err = viewer_position(&store, Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, VisibilityError::ProgressStore { .. }));
    }

    #[tokio::test]
    async fn empty_sender_list_skips_the_store() {
        let store = SparseProgress::new();
        let positions = sender_positions(&store, &[], Uuid::new_v4(), SenderLookupFailure::Propagate)
            .await
            .unwrap();
        assert!(positions.is_empty());
        assert_eq!(store.total_calls(), 0);
    }

    #[tokio::test]
    async fn batch_failure_degrades_to_empty_map() {
        let store = SparseProgress::new().failing_batch();
        let sender = Uuid::new_v4();
        let positions = sender_positions(&store, &[sender], Uuid::new_v4(), SenderLookupFailure::Degrade)
            .await
            .unwrap();
        assert_eq!(position_or_origin(&positions, &sender), Position::ORIGIN);
    }

    #[tokio::test]
    async fn batch_failure_propagates_when_configured() {
        let store = SparseProgress::new().failing_batch();
        let result = sender_positions(
            &store,
            &[Uuid::new_v4()],
            Uuid::new_v4(),
            SenderLookupFailure::Propagate,
        )
        .await;
        assert!(matches!(result, Err(VisibilityError::ProgressStore { .. })));
    }
}
