use std::sync::Arc;
use std::time::Duration;

use reward_db::Database;
use reward_engine::{CompletionStore, ReferralResolver, Settlement, TaskCatalog, UserStore};

use crate::middleware::JwtAuth;

pub type AppState = Arc<AppStateInner>;

/// Each handler reaches only the component it needs; the components in turn
/// hold only the store capabilities they use.
pub struct AppStateInner {
    pub users: Arc<dyn UserStore>,
    pub completions: Arc<dyn CompletionStore>,
    pub settlement: Settlement,
    pub catalog: TaskCatalog,
    pub referrals: ReferralResolver,
    pub auth: JwtAuth,
    /// Deadline for a single engine call.
    pub request_timeout: Duration,
}

impl AppStateInner {
    pub fn new(db: Arc<Database>, auth: JwtAuth, request_timeout: Duration) -> AppState {
        let referrals = ReferralResolver::new(db.clone());
        let settlement = Settlement::new(db.clone(), db.clone(), db.clone(), referrals.clone());

        Arc::new(Self {
            users: db.clone(),
            completions: db.clone(),
            settlement,
            catalog: TaskCatalog::new(db),
            referrals,
            auth,
            request_timeout,
        })
    }
}
