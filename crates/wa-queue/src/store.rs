//! Queue store (C7): durable local queue of inbound webhook payloads.
//!
//! One SQL table, `incoming_queue`. `enqueue` dedups on the exact payload
//! body; `claim_next` hands out the oldest pending row atomically so
//! multiple worker processes against the same database never claim the
//! same row twice.

use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectOptions, Database, DatabaseConnection, DatabaseTransaction,
    EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use sea_orm_migration::MigratorTrait;

use crate::entities::incoming_queue::{self, Entity as IncomingQueue, QueueStatus};
use crate::error::{QueueError, QueueResult};
use crate::migration::Migrator;

/// A row claimed off the queue, ready for the worker to process.
#[derive(Debug, Clone)]
pub struct ClaimedJob {
    pub row_id: i64,
    pub payload: serde_json::Value,
}

pub struct QueueStore {
    db: DatabaseConnection,
}

impl QueueStore {
    /// Connects to `database_url` (a sqlite DSN, e.g. `sqlite://queue.db?mode=rwc`)
    /// and runs pending migrations.
    pub async fn connect(database_url: &str) -> QueueResult<Self> {
        let options = ConnectOptions::new(database_url.to_owned());
        let db = Database::connect(options).await?;
        Migrator::up(&db, None)
            .await
            .map_err(|e| QueueError::Migration(e.to_string()))?;
        Ok(Self { db })
    }

    /// Inserts `payload`, suppressing exact-duplicate bodies via the unique
    /// index on `payload`. Returns `true` iff a new row was inserted.
    pub async fn enqueue(&self, payload: &serde_json::Value) -> QueueResult<bool> {
        let payload_str = serde_json::to_string(payload)?;
        let now = wa_core::now_utc_iso();
        let active = incoming_queue::ActiveModel {
            payload: Set(payload_str),
            status: Set(QueueStatus::Pending),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };
        let rows_affected = IncomingQueue::insert(active)
            .on_conflict(
                OnConflict::column(incoming_queue::Column::Payload)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;
        Ok(rows_affected > 0)
    }

    /// Pins a single connection for the whole `SELECT oldest pending; UPDATE
    /// to processing` sequence and commits it as one unit, so two workers
    /// racing against the same database file can never both claim the same
    /// row: sea-orm hands out pooled connections per statement, so issuing
    /// `BEGIN`/the query/`COMMIT` as separate `self.db.execute` calls (as
    /// this used to) could scatter them across different connections and
    /// the transaction boundary would be a no-op.
    pub async fn claim_next(&self) -> QueueResult<Option<ClaimedJob>> {
        let txn = self.db.begin().await?;
        match self.claim_next_within_transaction(&txn).await {
            Ok(claimed) => {
                txn.commit().await?;
                Ok(claimed)
            }
            Err(e) => {
                let _ = txn.rollback().await;
                Err(e)
            }
        }
    }

    async fn claim_next_within_transaction(&self, txn: &DatabaseTransaction) -> QueueResult<Option<ClaimedJob>> {
        let row = IncomingQueue::find()
            .filter(incoming_queue::Column::Status.eq(QueueStatus::Pending))
            .order_by_asc(incoming_queue::Column::Id)
            .one(txn)
            .await?;

        let Some(model) = row else {
            return Ok(None);
        };

        let payload: serde_json::Value = serde_json::from_str(&model.payload)?;
        let row_id = model.id;

        let mut active: incoming_queue::ActiveModel = model.into();
        active.status = Set(QueueStatus::Processing);
        active.updated_at = Set(wa_core::now_utc_iso());
        active.update(txn).await?;

        Ok(Some(ClaimedJob { row_id, payload }))
    }

    pub async fn mark_done(&self, row_id: i64) -> QueueResult<()> {
        self.transition(row_id, QueueStatus::Done, None).await
    }

    pub async fn mark_error(&self, row_id: i64, message: impl Into<String>) -> QueueResult<()> {
        self.transition(row_id, QueueStatus::Error, Some(message.into()))
            .await
    }

    async fn transition(
        &self,
        row_id: i64,
        status: QueueStatus,
        last_error: Option<String>,
    ) -> QueueResult<()> {
        let model = IncomingQueue::find_by_id(row_id)
            .one(&self.db)
            .await?
            .ok_or(QueueError::NotFound(row_id))?;
        let mut active: incoming_queue::ActiveModel = model.into();
        active.status = Set(status);
        active.updated_at = Set(wa_core::now_utc_iso());
        if last_error.is_some() {
            active.last_error = Set(last_error);
        }
        active.update(&self.db).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> QueueStore {
        QueueStore::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn enqueue_dedups_identical_payload() {
        let store = store().await;
        let payload = serde_json::json!({"id": "wamid.A"});
        assert!(store.enqueue(&payload).await.unwrap());
        assert!(!store.enqueue(&payload).await.unwrap());
    }

    #[tokio::test]
    async fn claim_next_returns_oldest_pending_then_none() {
        let store = store().await;
        store.enqueue(&serde_json::json!({"id": 1})).await.unwrap();
        store.enqueue(&serde_json::json!({"id": 2})).await.unwrap();

        let first = store.claim_next().await.unwrap().unwrap();
        assert_eq!(first.payload, serde_json::json!({"id": 1}));

        let second = store.claim_next().await.unwrap().unwrap();
        assert_eq!(second.payload, serde_json::json!({"id": 2}));

        assert!(store.claim_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn mark_done_and_mark_error_transition_status() {
        let store = store().await;
        store.enqueue(&serde_json::json!({"id": 1})).await.unwrap();
        let job = store.claim_next().await.unwrap().unwrap();
        store.mark_done(job.row_id).await.unwrap();

        store.enqueue(&serde_json::json!({"id": 2})).await.unwrap();
        let job2 = store.claim_next().await.unwrap().unwrap();
        store.mark_error(job2.row_id, "boom").await.unwrap();
    }
}
