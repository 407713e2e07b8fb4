/// Database row types. These map directly to SQLite rows and are kept apart
/// from the agora-types domain models so the DB layer stays independent.

pub struct MessageRow {
    pub id: String,
    pub course_id: String,
    pub lesson_id: String,
    pub sender_id: String,
    pub receiver_id: Option<String>,
    pub cohort_id: Option<String>,
    pub replied_to_id: Option<String>,
    pub is_system: bool,
    /// Joined from `course_staff`.
    pub sender_is_staff: bool,
    pub body: String,
    pub created_at: String,
}

/// Input for `Database::insert_message`.
pub struct NewMessage<'a> {
    pub id: &'a str,
    pub course_id: &'a str,
    pub lesson_id: &'a str,
    pub sender_id: &'a str,
    pub receiver_id: Option<&'a str>,
    pub cohort_id: Option<&'a str>,
    pub replied_to_id: Option<&'a str>,
    pub is_system: bool,
    pub body: &'a str,
    /// RFC 3339; `None` stamps the row with the current time.
    pub created_at: Option<&'a str>,
}
