//! Learner progress: read side for the visibility engine, write side for the
//! unlock transition.
//!
//! Progress is an append-only log of lesson completions. A learner's position
//! is the highest `(level_rank, lesson_rank)` in that log, so positions can
//! only ever move forward.

use std::collections::HashMap;

use agora_types::models::UnlockReason;
use agora_types::position::Position;
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::Database;

/// Ids bound per `IN (...)` query. Keeps well under SQLite's host parameter
/// limit whatever the message window size.
const POSITION_BATCH_CHUNK: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    Advanced { from: Position, to: Position },
    /// The requested position was not ahead of the current one.
    Unchanged { current: Position },
}

#[derive(Debug, Error)]
pub enum UnlockError {
    #[error("lesson {lesson_id} does not belong to course {course_id}")]
    UnknownLesson { lesson_id: Uuid, course_id: Uuid },

    #[error("learner {learner_id} does not exist")]
    UnknownLearner { learner_id: String },

    #[error("lesson {lesson_id} at {target} is not the next lesson after {current}")]
    NotNextLesson {
        lesson_id: Uuid,
        current: Position,
        target: Position,
    },

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl Database {
    /// Most advanced completion of `user_id` in `course_id`, or the origin.
    pub fn current_position(&self, user_id: &str, course_id: &str) -> Result<Position> {
        self.with_conn(|conn| query_position(conn, user_id, course_id))
    }

    /// Positions for many learners, one query per `POSITION_BATCH_CHUNK`
    /// ids. Learners without any completion are left out of the map.
    pub fn positions_for(&self, user_ids: &[String], course_id: &str) -> Result<HashMap<String, Position>> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }

        self.with_conn(|conn| {
            let mut positions: HashMap<String, Position> = HashMap::new();
            for chunk in user_ids.chunks(POSITION_BATCH_CHUNK) {
                let placeholders: Vec<String> = (2..=chunk.len() + 1).map(|i| format!("?{}", i)).collect();
                let sql = format!(
                    "SELECT user_id, level_rank, lesson_rank FROM lesson_completions
                     WHERE course_id = ?1 AND user_id IN ({})",
                    placeholders.join(", ")
                );

                let mut stmt = conn.prepare(&sql)?;
                let mut params: Vec<&dyn rusqlite::types::ToSql> = Vec::with_capacity(chunk.len() + 1);
                params.push(&course_id);
                params.extend(chunk.iter().map(|id| id as &dyn rusqlite::types::ToSql));

                let rows = stmt
                    .query_map(params.as_slice(), |row| {
                        Ok((row.get::<_, String>(0)?, Position::new(row.get(1)?, row.get(2)?)))
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;

                for (user_id, position) in rows {
                    positions
                        .entry(user_id)
                        .and_modify(|best| *best = (*best).max(position))
                        .or_insert(position);
                }
            }
            Ok(positions)
        })
    }

    /// Unlock transition: move a learner forward to `target`.
    ///
    /// Never moves a learner backwards. Requests at or before the current
    /// position are reported as `Unchanged` and write nothing.
    pub fn advance_position(
        &self,
        user_id: &str,
        course_id: &str,
        target: Position,
        reason: UnlockReason,
    ) -> Result<AdvanceOutcome> {
        self.with_conn_mut(|conn| record_completion(conn, user_id, course_id, None, target, reason))
    }

    /// Unlock transition for a finished lesson: the learner advances to the
    /// lesson's own `(level, lesson)` ranks.
    ///
    /// A passed quiz only unlocks the lesson right after the learner's current
    /// position. A reviewed exercise may move the learner any distance forward.
    pub fn complete_lesson(
        &self,
        user_id: &str,
        course_id: Uuid,
        lesson_id: Uuid,
        reason: UnlockReason,
    ) -> std::result::Result<AdvanceOutcome, UnlockError> {
        let course = course_id.to_string();
        let lesson = lesson_id.to_string();

        self.with_conn_mut(|conn| {
            let Some(target) = query_lesson_position(conn, &course, &lesson)? else {
                return Ok(Err(UnlockError::UnknownLesson {
                    lesson_id,
                    course_id,
                }));
            };
            if !user_exists(conn, user_id)? {
                return Ok(Err(UnlockError::UnknownLearner {
                    learner_id: user_id.to_string(),
                }));
            }

            if reason == UnlockReason::QuizPassed {
                let current = query_position(conn, user_id, &course)?;
                if !target.is_at_or_before(&current) {
                    let next = query_next_position(conn, &course, current)?;
                    if next != Some(target) {
                        return Ok(Err(UnlockError::NotNextLesson {
                            lesson_id,
                            current,
                            target,
                        }));
                    }
                }
            }

            record_completion(conn, user_id, &course, Some(&lesson), target, reason).map(Ok)
        })?
    }
}

fn user_exists(conn: &Connection, user_id: &str) -> Result<bool> {
    let found = conn
        .query_row("SELECT 1 FROM users WHERE id = ?1", [user_id], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

/// Position of the first lesson strictly after `current` in the course.
fn query_next_position(conn: &Connection, course_id: &str, current: Position) -> Result<Option<Position>> {
    let position = conn
        .query_row(
            "SELECT lv.rank, ls.rank FROM lessons ls
             JOIN levels lv ON lv.id = ls.level_id
             WHERE ls.course_id = ?1
               AND (lv.rank > ?2 OR (lv.rank = ?2 AND ls.rank > ?3))
             ORDER BY lv.rank, ls.rank
             LIMIT 1",
            rusqlite::params![course_id, current.level_rank, current.lesson_rank],
            |row| Ok(Position::new(row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    Ok(position)
}

fn query_position(conn: &Connection, user_id: &str, course_id: &str) -> Result<Position> {
    let position = conn
        .query_row(
            "SELECT level_rank, lesson_rank FROM lesson_completions
             WHERE user_id = ?1 AND course_id = ?2
             ORDER BY level_rank DESC, lesson_rank DESC
             LIMIT 1",
            (user_id, course_id),
            |row| Ok(Position::new(row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    Ok(position.unwrap_or(Position::ORIGIN))
}

fn query_lesson_position(conn: &Connection, course_id: &str, lesson_id: &str) -> Result<Option<Position>> {
    let position = conn
        .query_row(
            "SELECT lv.rank, ls.rank FROM lessons ls
             JOIN levels lv ON lv.id = ls.level_id
             WHERE ls.id = ?1 AND ls.course_id = ?2",
            (lesson_id, course_id),
            |row| Ok(Position::new(row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    Ok(position)
}

fn record_completion(
    conn: &Connection,
    user_id: &str,
    course_id: &str,
    lesson_id: Option<&str>,
    target: Position,
    reason: UnlockReason,
) -> Result<AdvanceOutcome> {
    let current = query_position(conn, user_id, course_id)?;
    if target.is_at_or_before(&current) {
        debug!(
            "Unlock for {} in course {} to {} ignored, already at {}",
            user_id, course_id, target, current
        );
        return Ok(AdvanceOutcome::Unchanged { current });
    }

    conn.execute(
        "INSERT INTO lesson_completions (user_id, course_id, lesson_id, level_rank, lesson_rank, reason)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            user_id,
            course_id,
            lesson_id,
            target.level_rank,
            target.lesson_rank,
            reason.as_str()
        ],
    )?;

    info!(
        "Learner {} advanced in course {} from {} to {} ({})",
        user_id,
        course_id,
        current,
        target,
        reason.as_str()
    );
    Ok(AdvanceOutcome::Advanced {
        from: current,
        to: target,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        db: Database,
        course: Uuid,
        lessons: HashMap<(u32, u32), Uuid>,
    }

    /// Two levels of three lessons each.
    fn fixture() -> Fixture {
        let db = Database::open_in_memory().unwrap();
        let course = Uuid::new_v4();
        db.create_course(&course.to_string(), "Algebra").unwrap();
        for user in ["ana", "ben", "cy"] {
            db.create_user(user, user).unwrap();
        }

        let mut lessons = HashMap::new();
        for level_rank in 1..=2 {
            let level = Uuid::new_v4().to_string();
            db.create_level(&level, &course.to_string(), level_rank).unwrap();
            for lesson_rank in 1..=3 {
                let lesson = Uuid::new_v4();
                db.create_lesson(&lesson.to_string(), &level, lesson_rank).unwrap();
                lessons.insert((level_rank, lesson_rank), lesson);
            }
        }

        Fixture { db, course, lessons }
    }

    #[test]
    fn no_completion_is_origin() {
        let f = fixture();
        let position = f.db.current_position("ana", &f.course.to_string()).unwrap();
        assert_eq!(position, Position::ORIGIN);
    }

    #[test]
    fn completing_a_lesson_advances_to_its_ranks() {
        let f = fixture();
        let outcome = f
            .db
            .complete_lesson("ana", f.course, f.lessons[&(1, 1)], UnlockReason::QuizPassed)
            .unwrap();

        assert_eq!(
            outcome,
            AdvanceOutcome::Advanced {
                from: Position::ORIGIN,
                to: Position::new(1, 1)
            }
        );
        assert_eq!(
            f.db.current_position("ana", &f.course.to_string()).unwrap(),
            Position::new(1, 1)
        );
    }

    #[test]
    fn quiz_cannot_skip_ahead() {
        let f = fixture();
        let err = f
            .db
            .complete_lesson("ana", f.course, f.lessons[&(1, 3)], UnlockReason::QuizPassed)
            .unwrap_err();

        assert!(matches!(
            err,
            UnlockError::NotNextLesson { current, target, .. }
                if current == Position::ORIGIN && target == Position::new(1, 3)
        ));
        assert_eq!(
            f.db.current_position("ana", &f.course.to_string()).unwrap(),
            Position::ORIGIN
        );
    }

    #[test]
    fn quiz_crosses_into_the_next_level() {
        let f = fixture();
        f.db.complete_lesson("ana", f.course, f.lessons[&(1, 3)], UnlockReason::ExerciseReviewed)
            .unwrap();

        let err = f
            .db
            .complete_lesson("ana", f.course, f.lessons[&(2, 2)], UnlockReason::QuizPassed)
            .unwrap_err();
        assert!(matches!(err, UnlockError::NotNextLesson { .. }));

        let outcome = f
            .db
            .complete_lesson("ana", f.course, f.lessons[&(2, 1)], UnlockReason::QuizPassed)
            .unwrap();
        assert_eq!(
            outcome,
            AdvanceOutcome::Advanced {
                from: Position::new(1, 3),
                to: Position::new(2, 1)
            }
        );
    }

    #[test]
    fn reviewed_exercise_may_jump_forward() {
        let f = fixture();
        let outcome = f
            .db
            .complete_lesson("ana", f.course, f.lessons[&(2, 2)], UnlockReason::ExerciseReviewed)
            .unwrap();
        assert_eq!(
            outcome,
            AdvanceOutcome::Advanced {
                from: Position::ORIGIN,
                to: Position::new(2, 2)
            }
        );
    }

    #[test]
    fn unknown_learner_is_rejected_without_writing() {
        let f = fixture();
        let ghost = Uuid::new_v4().to_string();
        let err = f
            .db
            .complete_lesson(&ghost, f.course, f.lessons[&(1, 1)], UnlockReason::ExerciseReviewed)
            .unwrap_err();

        assert!(matches!(err, UnlockError::UnknownLearner { ref learner_id } if *learner_id == ghost));
        assert_eq!(
            f.db.current_position(&ghost, &f.course.to_string()).unwrap(),
            Position::ORIGIN
        );
    }

    #[test]
    fn position_never_moves_backwards() {
        let f = fixture();
        f.db.complete_lesson("ana", f.course, f.lessons[&(2, 1)], UnlockReason::ExerciseReviewed)
            .unwrap();

        let outcome = f
            .db
            .complete_lesson("ana", f.course, f.lessons[&(1, 3)], UnlockReason::QuizPassed)
            .unwrap();
        assert_eq!(
            outcome,
            AdvanceOutcome::Unchanged {
                current: Position::new(2, 1)
            }
        );

        let again = f
            .db
            .advance_position("ana", &f.course.to_string(), Position::new(2, 1), UnlockReason::QuizPassed)
            .unwrap();
        assert_eq!(
            again,
            AdvanceOutcome::Unchanged {
                current: Position::new(2, 1)
            }
        );
    }

    #[test]
    fn lesson_from_another_course_is_rejected() {
        let f = fixture();
        let err = f
            .db
            .complete_lesson("ana", Uuid::new_v4(), f.lessons[&(1, 1)], UnlockReason::QuizPassed)
            .unwrap_err();
        assert!(matches!(err, UnlockError::UnknownLesson { .. }));
    }

    #[test]
    fn batch_positions_take_the_highest_completion_per_learner() {
        let f = fixture();
        let course = f.course.to_string();
        f.db.advance_position("ana", &course, Position::new(1, 3), UnlockReason::QuizPassed)
            .unwrap();
        f.db.advance_position("ana", &course, Position::new(2, 1), UnlockReason::QuizPassed)
            .unwrap();
        f.db.advance_position("ben", &course, Position::new(1, 1), UnlockReason::QuizPassed)
            .unwrap();

        let ids = vec!["ana".to_string(), "ben".to_string(), "cy".to_string()];
        let positions = f.db.positions_for(&ids, &course).unwrap();

        assert_eq!(positions.get("ana"), Some(&Position::new(2, 1)));
        assert_eq!(positions.get("ben"), Some(&Position::new(1, 1)));
        assert_eq!(positions.get("cy"), None);
    }

    #[test]
    fn batch_positions_span_many_chunks() {
        let f = fixture();
        let course = f.course.to_string();
        let ids: Vec<String> = (0..POSITION_BATCH_CHUNK * 2 + 7).map(|i| format!("learner-{}", i)).collect();
        for id in &ids {
            f.db.create_user(id, id).unwrap();
        }
        let last = ids.last().unwrap();
        f.db.advance_position(&ids[0], &course, Position::new(1, 2), UnlockReason::QuizPassed)
            .unwrap();
        f.db.advance_position(last, &course, Position::new(2, 3), UnlockReason::QuizPassed)
            .unwrap();

        let positions = f.db.positions_for(&ids, &course).unwrap();

        assert_eq!(positions.len(), 2);
        assert_eq!(positions.get(&ids[0]), Some(&Position::new(1, 2)));
        assert_eq!(positions.get(last), Some(&Position::new(2, 3)));
    }

    #[test]
    fn batch_positions_are_scoped_to_the_course() {
        let f = fixture();
        let other = Uuid::new_v4().to_string();
        f.db.create_course(&other, "Geometry").unwrap();
        f.db.advance_position("ana", &other, Position::new(5, 5), UnlockReason::QuizPassed)
            .unwrap();

        let positions = f
            .db
            .positions_for(&["ana".to_string()], &f.course.to_string())
            .unwrap();
        assert!(positions.is_empty());
    }
}
