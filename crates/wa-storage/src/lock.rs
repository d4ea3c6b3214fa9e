//! Best-effort distributed mutex over a user's `locks/` prefix (C2).
//!
//! The tie-breaker is the object store's `LastModified` timestamp, not a
//! logical clock — two writers landing in the same server-side second can
//! race. This lock is appropriate for coalescing concurrent writes from
//! closely-collaborating workers, not for correctness-critical exclusion.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;
use wa_core::{CoreError, CoreResult};

use crate::object_store::ObjectStore;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Lease {
    owner_id: String,
    token: String,
    created_at: f64,
    ttl: f64,
}

#[derive(Debug, Clone)]
pub struct LockConfig {
    /// Lease time-to-live, in seconds. A lease older than `ttl + 1.0s` is
    /// considered stale and eligible for eviction.
    pub ttl_seconds: f64,
    pub poll_interval: Duration,
    pub acquire_timeout: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self { ttl_seconds: 30.0, poll_interval: Duration::from_millis(200), acquire_timeout: Duration::from_secs(15) }
    }
}

/// Acquires `<prefix>/locks/<owner_token>.json` and releases it on drop or
/// by explicit call to [`UserLockGuard::release`]. Release is best-effort:
/// failure to delete the lease is logged, never surfaced.
pub struct UserLockGuard {
    store: ObjectStore,
    lock_prefix: String,
    owner_token: String,
    released: bool,
}

impl UserLockGuard {
    fn lease_key(&self) -> String {
        format!("{}/{}.json", self.lock_prefix, self.owner_token)
    }

    pub async fn release(mut self) {
        self.release_inner().await;
    }

    async fn release_inner(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(err) = self.store.delete(&self.lease_key()).await {
            tracing::warn!(error = %err, key = %self.lease_key(), "failed to release user lock lease");
        }
    }
}

impl Drop for UserLockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let store = self.store.clone();
        let key = self.lease_key();
        tokio::spawn(async move {
            if let Err(err) = store.delete(&key).await {
                tracing::warn!(error = %err, key = %key, "failed to release user lock lease on drop");
            }
        });
    }
}

/// Acquire the mutex over `user_prefix` (e.g. `<operator_id>/<user_id>`).
/// Retries on a fixed poll interval until either we become the winner
/// (object with the earliest `LastModified`) or `acquire_timeout` elapses.
pub async fn acquire(store: &ObjectStore, user_prefix: &str, owner_id: &str, config: &LockConfig) -> CoreResult<UserLockGuard> {
    let lock_prefix = format!("{user_prefix}/locks");
    let owner_token = Uuid::new_v4().to_string();
    let lease_key = format!("{lock_prefix}/{owner_token}.json");

    let lease = Lease {
        owner_id: owner_id.to_string(),
        token: owner_token.clone(),
        created_at: now_epoch_seconds(),
        ttl: config.ttl_seconds,
    };
    store.put_json(&lease_key, &lease).await?;

    let deadline = tokio::time::Instant::now() + config.acquire_timeout;
    loop {
        let contenders = store.list_objects(&lock_prefix).await?;
        evict_stale(store, &contenders, config.ttl_seconds).await;

        let winner = contenders
            .iter()
            .min_by(|a, b| a.last_modified_epoch.total_cmp(&b.last_modified_epoch));

        if let Some(winner) = winner {
            if winner.key == lease_key {
                return Ok(UserLockGuard { store: store.clone(), lock_prefix, owner_token, released: false });
            }
        }

        if tokio::time::Instant::now() >= deadline {
            let _ = store.delete(&lease_key).await;
            return Err(CoreError::lock_timeout(format!("timed out acquiring lock for {user_prefix}")));
        }
        tokio::time::sleep(config.poll_interval).await;
    }
}

async fn evict_stale(store: &ObjectStore, contenders: &[crate::object_store::ObjectSummary], ttl_seconds: f64) {
    let now = now_epoch_seconds();
    for contender in contenders {
        if now - contender.last_modified_epoch > ttl_seconds + 1.0 {
            let _ = store.delete(&contender.key).await;
        }
    }
}

fn now_epoch_seconds() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
