use play4me_engine::{database::Database, jobs::Jobs, session::SessionManager};
use std::sync::Arc;

pub struct AppState {
    pub database: Arc<Database>,
    pub sessions: Arc<SessionManager>,
    pub jobs: Jobs,
    /// Required in `x-refill-secret` on refill triggers when set.
    pub refill_secret: Option<String>,
}

impl AppState {
    pub fn refill_allowed(&self, presented: Option<&str>) -> bool {
        match &self.refill_secret {
            Some(secret) => presented == Some(secret.as_str()),
            None => true,
        }
    }
}
