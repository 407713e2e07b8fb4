use std::collections::HashMap;
use std::sync::Arc;

use agora_types::position::Position;
use agora_visibility::{CohortStore, ProgressStore};
use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::warn;
use uuid::Uuid;

use crate::Database;

/// SQLite-backed progress and cohort stores for the visibility engine.
///
/// Every lookup runs on the blocking pool so the async runtime never waits
/// on the database mutex.
#[derive(Clone)]
pub struct SqliteStores {
    db: Arc<Database>,
}

impl SqliteStores {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(db.as_ref()))
            .await
            .context("spawn_blocking join error")?
    }
}

#[async_trait]
impl ProgressStore for SqliteStores {
    async fn resolve_position(&self, learner_id: Uuid, course_id: Uuid) -> Result<Position> {
        self.blocking(move |db| db.current_position(&learner_id.to_string(), &course_id.to_string()))
            .await
    }

    async fn resolve_positions(
        &self,
        learner_ids: &[Uuid],
        course_id: Uuid,
    ) -> Result<HashMap<Uuid, Position>> {
        let ids: Vec<String> = learner_ids.iter().map(Uuid::to_string).collect();
        let rows = self
            .blocking(move |db| db.positions_for(&ids, &course_id.to_string()))
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(id, position)| match id.parse::<Uuid>() {
                Ok(uid) => Some((uid, position)),
                Err(e) => {
                    warn!("Corrupt user_id '{}' in lesson_completions: {}", id, e);
                    None
                }
            })
            .collect())
    }
}

#[async_trait]
impl CohortStore for SqliteStores {
    async fn cohort_membership(&self, learner_id: Uuid, course_id: Uuid) -> Result<Option<Uuid>> {
        let cohort = self
            .blocking(move |db| db.active_cohort(&learner_id.to_string(), &course_id.to_string()))
            .await?;

        cohort
            .map(|id| {
                id.parse::<Uuid>()
                    .with_context(|| format!("corrupt cohort_id '{}'", id))
            })
            .transpose()
    }
}
