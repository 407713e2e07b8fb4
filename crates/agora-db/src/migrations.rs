use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (courses, cohorts, progress, messages)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                username    TEXT NOT NULL UNIQUE,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE courses (
                id          TEXT PRIMARY KEY,
                title       TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE levels (
                id          TEXT PRIMARY KEY,
                course_id   TEXT NOT NULL REFERENCES courses(id),
                rank        INTEGER NOT NULL CHECK (rank >= 0),
                UNIQUE(course_id, rank)
            );

            CREATE TABLE lessons (
                id          TEXT PRIMARY KEY,
                level_id    TEXT NOT NULL REFERENCES levels(id),
                course_id   TEXT NOT NULL REFERENCES courses(id),
                rank        INTEGER NOT NULL CHECK (rank >= 0),
                UNIQUE(level_id, rank)
            );

            CREATE TABLE course_staff (
                course_id   TEXT NOT NULL REFERENCES courses(id),
                user_id     TEXT NOT NULL REFERENCES users(id),
                PRIMARY KEY (course_id, user_id)
            );

            CREATE TABLE cohorts (
                id          TEXT PRIMARY KEY,
                course_id   TEXT NOT NULL REFERENCES courses(id),
                name        TEXT NOT NULL
            );

            CREATE TABLE cohort_members (
                cohort_id   TEXT NOT NULL REFERENCES cohorts(id),
                course_id   TEXT NOT NULL REFERENCES courses(id),
                user_id     TEXT NOT NULL REFERENCES users(id),
                active      INTEGER NOT NULL DEFAULT 1,
                joined_at   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                PRIMARY KEY (cohort_id, user_id)
            );

            -- At most one active cohort per learner per course
            CREATE UNIQUE INDEX idx_cohort_members_active
                ON cohort_members(user_id, course_id) WHERE active = 1;

            CREATE TABLE lesson_completions (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id         TEXT NOT NULL REFERENCES users(id),
                course_id       TEXT NOT NULL REFERENCES courses(id),
                lesson_id       TEXT REFERENCES lessons(id),
                level_rank      INTEGER NOT NULL CHECK (level_rank >= 0),
                lesson_rank     INTEGER NOT NULL CHECK (lesson_rank >= 0),
                reason          TEXT NOT NULL,
                completed_at    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX idx_completions_learner
                ON lesson_completions(course_id, user_id, level_rank, lesson_rank);

            CREATE TABLE messages (
                id              TEXT PRIMARY KEY,
                course_id       TEXT NOT NULL REFERENCES courses(id),
                lesson_id       TEXT NOT NULL REFERENCES lessons(id),
                sender_id       TEXT NOT NULL REFERENCES users(id),
                receiver_id     TEXT REFERENCES users(id),
                cohort_id       TEXT REFERENCES cohorts(id),
                replied_to_id   TEXT,
                is_system       INTEGER NOT NULL DEFAULT 0,
                body            TEXT NOT NULL,
                created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX idx_messages_lesson
                ON messages(course_id, lesson_id, created_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
