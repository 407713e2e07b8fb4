//! In-memory stores and message builders for engine tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use agora_types::models::ChatMessage;
use agora_types::position::Position;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use uuid::Uuid;

use crate::store::{CohortStore, ProgressStore};

/// Progress store relying on the trait's default batch lookup.
#[derive(Default)]
pub struct MockProgress {
    positions: HashMap<Uuid, Position>,
    fail: bool,
    single_calls: AtomicUsize,
}

impl MockProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, learner_id: Uuid, position: Position) -> Self {
        self.positions.insert(learner_id, position);
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn single_calls(&self) -> usize {
        self.single_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProgressStore for MockProgress {
    async fn resolve_position(&self, learner_id: Uuid, _course_id: Uuid) -> Result<Position> {
        self.single_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(anyhow!("progress store offline"));
        }
        Ok(self.positions.get(&learner_id).copied().unwrap_or_default())
    }
}

/// Progress store answering batches in one call and omitting unknown learners,
/// like the SQLite store does.
#[derive(Default)]
pub struct SparseProgress {
    positions: HashMap<Uuid, Position>,
    fail_batch: bool,
    single_calls: AtomicUsize,
    batch_calls: AtomicUsize,
}

impl SparseProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, learner_id: Uuid, position: Position) -> Self {
        self.positions.insert(learner_id, position);
        self
    }

    pub fn failing_batch(mut self) -> Self {
        self.fail_batch = true;
        self
    }

    pub fn single_calls(&self) -> usize {
        self.single_calls.load(Ordering::SeqCst)
    }

    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.single_calls() + self.batch_calls()
    }
}

#[async_trait]
impl ProgressStore for SparseProgress {
    async fn resolve_position(&self, learner_id: Uuid, _course_id: Uuid) -> Result<Position> {
        self.single_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.positions.get(&learner_id).copied().unwrap_or_default())
    }

    async fn resolve_positions(
        &self,
        learner_ids: &[Uuid],
        _course_id: Uuid,
    ) -> Result<HashMap<Uuid, Position>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_batch {
            return Err(anyhow!("progress batch timed out"));
        }
        Ok(learner_ids
            .iter()
            .filter_map(|id| self.positions.get(id).map(|p| (*id, *p)))
            .collect())
    }
}

#[derive(Default)]
pub struct MockCohorts {
    memberships: HashMap<Uuid, Uuid>,
    fail: bool,
}

impl MockCohorts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, learner_id: Uuid, cohort_id: Uuid) -> Self {
        self.memberships.insert(learner_id, cohort_id);
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

#[async_trait]
impl CohortStore for MockCohorts {
    async fn cohort_membership(&self, learner_id: Uuid, _course_id: Uuid) -> Result<Option<Uuid>> {
        if self.fail {
            return Err(anyhow!("enrollment store offline"));
        }
        Ok(self.memberships.get(&learner_id).copied())
    }
}

/// Builds a chronologically increasing run of messages in one lesson.
pub struct Chat {
    pub course_id: Uuid,
    pub lesson_id: Uuid,
    pub cohort_id: Uuid,
    messages: Vec<ChatMessage>,
}

impl Chat {
    pub fn new() -> Self {
        Self {
            course_id: Uuid::new_v4(),
            lesson_id: Uuid::new_v4(),
            cohort_id: Uuid::new_v4(),
            messages: Vec::new(),
        }
    }

    fn push(&mut self, sender_id: Uuid, tweak: impl FnOnce(&mut ChatMessage)) -> Uuid {
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let mut message = ChatMessage {
            id: Uuid::new_v4(),
            course_id: self.course_id,
            lesson_id: self.lesson_id,
            sender_id,
            receiver_id: None,
            cohort_id: Some(self.cohort_id),
            replied_to_id: None,
            is_system: false,
            sender_is_staff: false,
            body: format!("message {}", self.messages.len()),
            created_at: base + Duration::minutes(self.messages.len() as i64),
        };
        tweak(&mut message);
        let id = message.id;
        self.messages.push(message);
        id
    }

    pub fn peer(&mut self, sender_id: Uuid) -> Uuid {
        self.push(sender_id, |_| {})
    }

    pub fn staff(&mut self, sender_id: Uuid) -> Uuid {
        self.push(sender_id, |m| m.sender_is_staff = true)
    }

    pub fn system(&mut self, sender_id: Uuid) -> Uuid {
        self.push(sender_id, |m| m.is_system = true)
    }

    pub fn direct(&mut self, sender_id: Uuid, receiver_id: Uuid) -> Uuid {
        self.push(sender_id, |m| m.receiver_id = Some(receiver_id))
    }

    pub fn reply(&mut self, sender_id: Uuid, replied_to_id: Uuid) -> Uuid {
        self.push(sender_id, |m| m.replied_to_id = Some(replied_to_id))
    }

    pub fn in_cohort(&mut self, sender_id: Uuid, cohort_id: Option<Uuid>) -> Uuid {
        self.push(sender_id, |m| m.cohort_id = cohort_id)
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.messages.clone()
    }
}

pub fn ids(messages: &[ChatMessage]) -> Vec<Uuid> {
    messages.iter().map(|m| m.id).collect()
}
