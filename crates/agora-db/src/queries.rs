use crate::Database;
use crate::models::{MessageRow, NewMessage};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};

impl Database {
    // -- Users --

    pub fn create_user(&self, id: &str, username: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, username) VALUES (?1, ?2)",
                (id, username),
            )?;
            Ok(())
        })
    }

    // -- Course structure --

    pub fn create_course(&self, id: &str, title: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute("INSERT INTO courses (id, title) VALUES (?1, ?2)", (id, title))?;
            Ok(())
        })
    }

    pub fn create_level(&self, id: &str, course_id: &str, rank: u32) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO levels (id, course_id, rank) VALUES (?1, ?2, ?3)",
                rusqlite::params![id, course_id, rank],
            )?;
            Ok(())
        })
    }

    /// Lessons inherit their course from the level they belong to.
    pub fn create_lesson(&self, id: &str, level_id: &str, rank: u32) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO lessons (id, level_id, course_id, rank)
                 SELECT ?1, id, course_id, ?3 FROM levels WHERE id = ?2",
                rusqlite::params![id, level_id, rank],
            )?;
            Ok(())
        })
    }

    // -- Staff --

    pub fn add_staff(&self, course_id: &str, user_id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO course_staff (course_id, user_id) VALUES (?1, ?2)",
                (course_id, user_id),
            )?;
            Ok(())
        })
    }

    pub fn is_staff(&self, course_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found = conn
                .query_row(
                    "SELECT 1 FROM course_staff WHERE course_id = ?1 AND user_id = ?2",
                    (course_id, user_id),
                    |_| Ok(()),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    // -- Cohorts --

    pub fn create_cohort(&self, id: &str, course_id: &str, name: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO cohorts (id, course_id, name) VALUES (?1, ?2, ?3)",
                (id, course_id, name),
            )?;
            Ok(())
        })
    }

    /// Put a learner in a cohort, retiring any other active membership they
    /// hold in the same course.
    pub fn join_cohort(&self, cohort_id: &str, user_id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            let course_id: String = conn.query_row(
                "SELECT course_id FROM cohorts WHERE id = ?1",
                [cohort_id],
                |row| row.get(0),
            )?;
            conn.execute(
                "UPDATE cohort_members SET active = 0 WHERE user_id = ?1 AND course_id = ?2",
                (user_id, &course_id),
            )?;
            conn.execute(
                "INSERT INTO cohort_members (cohort_id, course_id, user_id, active)
                 VALUES (?1, ?2, ?3, 1)
                 ON CONFLICT(cohort_id, user_id) DO UPDATE SET active = 1",
                (cohort_id, &course_id, user_id),
            )?;
            Ok(())
        })
    }

    pub fn active_cohort(&self, user_id: &str, course_id: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            let cohort = conn
                .query_row(
                    "SELECT cohort_id FROM cohort_members
                     WHERE user_id = ?1 AND course_id = ?2 AND active = 1",
                    (user_id, course_id),
                    |row| row.get(0),
                )
                .optional()?;
            Ok(cohort)
        })
    }

    // -- Messages --

    pub fn insert_message(&self, msg: &NewMessage<'_>) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO messages
                    (id, course_id, lesson_id, sender_id, receiver_id, cohort_id,
                     replied_to_id, is_system, body, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9,
                         COALESCE(?10, strftime('%Y-%m-%dT%H:%M:%fZ', 'now')))",
                rusqlite::params![
                    msg.id,
                    msg.course_id,
                    msg.lesson_id,
                    msg.sender_id,
                    msg.receiver_id,
                    msg.cohort_id,
                    msg.replied_to_id,
                    msg.is_system,
                    msg.body,
                    msg.created_at,
                ],
            )?;
            Ok(())
        })
    }

    /// The candidate window for a viewer in one lesson: the most recent
    /// `limit` messages the viewer could possibly see, oldest first.
    ///
    /// With a cohort, peer traffic of that cohort is included. Without one,
    /// only system messages and messages sent by or to the viewer are.
    pub fn candidate_messages(
        &self,
        viewer_id: &str,
        course_id: &str,
        lesson_id: &str,
        cohort_id: Option<&str>,
        limit: u32,
    ) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| query_candidates(conn, viewer_id, course_id, lesson_id, cohort_id, limit))
    }
}

fn query_candidates(
    conn: &Connection,
    viewer_id: &str,
    course_id: &str,
    lesson_id: &str,
    cohort_id: Option<&str>,
    limit: u32,
) -> Result<Vec<MessageRow>> {
    // JOIN course_staff to fetch the sender's role in a single query
    let mut stmt = conn.prepare(
        "SELECT m.id, m.course_id, m.lesson_id, m.sender_id, m.receiver_id, m.cohort_id,
                m.replied_to_id, m.is_system, s.user_id IS NOT NULL, m.body, m.created_at
         FROM messages m
         LEFT JOIN course_staff s ON s.course_id = m.course_id AND s.user_id = m.sender_id
         WHERE m.course_id = ?1
           AND m.lesson_id = ?2
           AND (m.is_system = 1
                OR m.sender_id = ?3
                OR m.receiver_id = ?3
                OR (?4 IS NOT NULL AND m.cohort_id = ?4))
         ORDER BY m.created_at DESC, m.rowid DESC
         LIMIT ?5",
    )?;

    let mut rows = stmt
        .query_map(
            rusqlite::params![course_id, lesson_id, viewer_id, cohort_id, limit],
            |row| {
                Ok(MessageRow {
                    id: row.get(0)?,
                    course_id: row.get(1)?,
                    lesson_id: row.get(2)?,
                    sender_id: row.get(3)?,
                    receiver_id: row.get(4)?,
                    cohort_id: row.get(5)?,
                    replied_to_id: row.get(6)?,
                    is_system: row.get(7)?,
                    sender_is_staff: row.get(8)?,
                    body: row.get(9)?,
                    created_at: row.get(10)?,
                })
            },
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    // Newest-first for the LIMIT, chronological for callers
    rows.reverse();
    Ok(rows)
}
