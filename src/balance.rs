//! Cached player balance
//!
//! The store is written by round resolutions and by a periodic refresh.
//! Both read server truth, so the last writer wins.

use crate::api::client::TransportError;
use crate::common::traits::BalanceSource;
use crate::common::types::CachedUser;
use crate::notify::{Notification, NotificationSink};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Default interval of the background balance refresh
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Process-wide cached `CachedUser`, cheap to clone
#[derive(Clone)]
pub struct BalanceStore {
    user: Arc<RwLock<CachedUser>>,
    source: Arc<dyn BalanceSource>,
}

impl BalanceStore {
    pub fn new(user: CachedUser, source: Arc<dyn BalanceSource>) -> Self {
        Self {
            user: Arc::new(RwLock::new(user)),
            source,
        }
    }

    /// Current cached value, possibly stale
    pub fn get(&self) -> CachedUser {
        self.user.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn balance(&self) -> f64 {
        self.user.read().unwrap_or_else(PoisonError::into_inner).balance
    }

    /// Mutate the cached user in place
    pub fn update<F: FnOnce(&mut CachedUser)>(&self, f: F) {
        let mut user = self.user.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut user);
    }

    /// Store the balance reported by a settled round
    pub fn apply_round_balance(&self, new_balance: f64) {
        self.update(|user| user.balance = new_balance);
        debug!("Balance set to {:.2} from round outcome", new_balance);
    }

    /// Fetch the authoritative balance once.
    ///
    /// On failure the cached value is left untouched and the error is
    /// returned to the caller.
    pub async fn refresh(&self) -> Result<CachedUser, TransportError> {
        let user_id = self.get().user_id;
        match self.source.fetch_balance(&user_id).await {
            Ok(balance) => {
                self.update(|user| user.balance = balance);
                debug!("Balance refreshed for user {}: {:.2}", user_id, balance);
                Ok(self.get())
            }
            Err(e) => {
                warn!("Balance refresh failed for user {}: {}", user_id, e);
                Err(e)
            }
        }
    }

    /// Refresh every `period` until the returned handle is cancelled or dropped.
    ///
    /// Failures are reported to `sink` and do not stop the loop.
    pub fn spawn_refresh_loop(&self, period: Duration, sink: Arc<dyn NotificationSink>) -> RefreshHandle {
        let store = self.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if store.refresh().await.is_err() {
                    sink.notify(Notification::error("Failed to load user data"));
                }
            }
        });
        RefreshHandle { task: Some(task) }
    }
}

/// Owns the background refresh task
pub struct RefreshHandle {
    task: Option<JoinHandle<()>>,
}

impl RefreshHandle {
    /// Stop the refresh loop
    pub fn cancel(mut self) {
        self.abort();
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().map(|task| !task.is_finished()).unwrap_or(false)
    }

    fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.abort();
    }
}
