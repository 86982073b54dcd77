use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::rate_limit::AttemptLimiter;
use crate::reset::{ResetLedger, ResetNotifier};

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub ledger: ResetLedger,
    pub notifier: Arc<dyn ResetNotifier>,
    pub login_limiter: AttemptLimiter,
    pub reset_limiter: AttemptLimiter,
}
