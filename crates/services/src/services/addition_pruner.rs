//! Background task that keeps the trending addition log bounded.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::time::interval;
use tracing::{debug, error, info};

use super::storage::{CollectionStore, StoreError};

/// Background service deleting additions older than the retention window
pub struct AdditionLogPruner {
    store: Arc<dyn CollectionStore>,
    poll_interval: Duration,
    retention: chrono::Duration,
}

impl AdditionLogPruner {
    pub fn new(store: Arc<dyn CollectionStore>, retention_days: i64) -> Self {
        Self {
            store,
            poll_interval: Duration::from_secs(60 * 60),
            retention: chrono::Duration::days(retention_days.max(1)),
        }
    }

    /// Spawn the background pruner
    pub fn spawn(
        store: Arc<dyn CollectionStore>,
        retention_days: i64,
    ) -> tokio::task::JoinHandle<()> {
        let pruner = Self::new(store, retention_days);
        tokio::spawn(async move {
            pruner.start().await;
        })
    }

    async fn start(&self) {
        info!(
            "Starting addition log pruner with interval {:?}, retention: {} days",
            self.poll_interval,
            self.retention.num_days()
        );

        let mut interval = interval(self.poll_interval);
        loop {
            interval.tick().await;
            if let Err(e) = self.prune_once(Utc::now()).await {
                error!("Error pruning addition log: {}", e);
            }
        }
    }

    pub async fn prune_once(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let cutoff = now - self.retention;
        let removed = self.store.prune_additions(cutoff).await?;
        if removed > 0 {
            info!(removed, cutoff = %cutoff, "Pruned stale game additions");
        } else {
            debug!("Addition log pruner: nothing to remove");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use db::{DBService, models::game_addition::GameAddition};
    use uuid::Uuid;

    use super::*;
    use crate::services::sqlite_store::SqliteStore;

    #[tokio::test]
    async fn prune_once_drops_only_expired_rows() {
        let store: Arc<dyn CollectionStore> =
            Arc::new(SqliteStore::new(DBService::new_in_memory().await.unwrap()));
        let now = Utc::now();
        let user = Uuid::new_v4();
        for (id, age_days) in [(1, 1), (2, 89), (3, 91), (4, 200)] {
            store
                .record_addition(&GameAddition::new(
                    user,
                    id,
                    format!("game {id}"),
                    now - chrono::Duration::days(age_days),
                ))
                .await
                .unwrap();
        }

        let pruner = AdditionLogPruner::new(store.clone(), 90);
        assert_eq!(pruner.prune_once(now).await.unwrap(), 2);
        assert_eq!(pruner.prune_once(now).await.unwrap(), 0);

        let left = store
            .additions_since(now - chrono::Duration::days(365))
            .await
            .unwrap();
        let mut ids: Vec<i64> = left.iter().map(|a| a.thegamesdb_id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2]);
    }
}
