use std::sync::Arc;

use tracing::error;

use cycle_db::Database;

use crate::config::Config;
use crate::error::{ApiError, ApiResult};
use crate::images::ImageHost;
use crate::mail::Mailer;
use crate::session::TokenKeys;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub config: Config,
    pub keys: TokenKeys,
    pub mailer: Arc<dyn Mailer>,
    pub images: Arc<dyn ImageHost>,
}

impl AppStateInner {
    pub fn new(db: Database, config: Config, mailer: Arc<dyn Mailer>, images: Arc<dyn ImageHost>) -> AppState {
        let keys = TokenKeys::new(&config.jwt_secret);
        Arc::new(Self {
            db,
            config,
            keys,
            mailer,
            images,
        })
    }
}

/// Run `f` on the blocking pool. Argon2 hashing and verification go through
/// here so they don't stall the runtime.
pub async fn blocking<F, T>(state: &AppState, f: F) -> ApiResult<T>
where
    F: FnOnce(&AppStateInner) -> ApiResult<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow::anyhow!("blocking task failed: {}", e))
        })?
}
