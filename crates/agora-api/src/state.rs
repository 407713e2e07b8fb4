use std::sync::Arc;

use agora_db::Database;
use agora_visibility::VisibilityEngine;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub engine: VisibilityEngine,
    pub jwt_secret: String,
    /// Upper bound on the candidate window per request.
    pub message_limit: u32,
}
