use std::collections::HashMap;

use agora_types::models::ChatMessage;
use uuid::Uuid;

/// Where a message comes from, relative to one viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provenance {
    System,
    Own,
    AddressedToViewer,
    ReplyToViewer,
    FromStaff,
    FromPeer,
}

impl Provenance {
    /// Every provenance except `FromPeer` bypasses progress gating.
    pub fn bypasses_gating(self) -> bool {
        !matches!(self, Self::FromPeer)
    }

    /// The provenances an individual (cohort-less) viewer can ever receive.
    pub fn is_direct(self) -> bool {
        matches!(self, Self::System | Self::Own | Self::AddressedToViewer)
    }
}

/// Lookup of candidate messages by id, used to follow reply references
/// without going back to the message store.
pub struct CandidateIndex<'a> {
    by_id: HashMap<Uuid, &'a ChatMessage>,
}

impl<'a> CandidateIndex<'a> {
    pub fn new(candidates: &'a [ChatMessage]) -> Self {
        Self {
            by_id: candidates.iter().map(|m| (m.id, m)).collect(),
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<&'a ChatMessage> {
        self.by_id.get(id).copied()
    }
}

/// Classify `message` for `viewer_id`. First match wins:
/// system, own, addressed, reply to the viewer, staff, peer.
///
/// A reply whose target is not in `index` is classified as if it were not a
/// reply at all.
pub fn classify(message: &ChatMessage, viewer_id: Uuid, index: &CandidateIndex<'_>) -> Provenance {
    if message.is_system {
        return Provenance::System;
    }
    if message.sender_id == viewer_id {
        return Provenance::Own;
    }
    if message.receiver_id == Some(viewer_id) {
        return Provenance::AddressedToViewer;
    }
    let replies_to_viewer = message
        .replied_to_id
        .and_then(|target| index.get(&target))
        .is_some_and(|target| target.sender_id == viewer_id);
    if replies_to_viewer {
        return Provenance::ReplyToViewer;
    }
    if message.sender_is_staff {
        return Provenance::FromStaff;
    }
    Provenance::FromPeer
}
