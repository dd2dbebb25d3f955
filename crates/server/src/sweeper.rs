use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use faqbot_chat::PendingQuestionStore;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Drops pending questions older than `ttl`. Returns how many were dropped.
pub async fn sweep_once(pending: &PendingQuestionStore, ttl: Duration) -> usize {
    let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(36_500));
    let Some(cutoff) = Utc::now().checked_sub_signed(ttl) else {
        return 0;
    };

    let expired = pending.purge_created_before(cutoff).await;
    if expired.is_empty() {
        debug!("no expired pending questions");
    } else {
        info!(
            event_name = "pending.expired",
            expired = expired.len(),
            form_ids = ?expired,
            "expired pending questions dropped"
        );
    }
    expired.len()
}

pub fn spawn(pending: Arc<PendingQuestionStore>, ttl: Duration, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick fires immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            sweep_once(&pending, ttl).await;
        }
    })
}
