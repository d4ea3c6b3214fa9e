use thiserror::Error;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("database connection error: {0}")]
    Connection(String),
    #[error("migration error: {0}")]
    Migration(String),
    #[error("query error: {0}")]
    Query(String),
    #[error("row {0} not found")]
    NotFound(i64),
    #[error("payload serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<sea_orm::DbErr> for QueueError {
    fn from(err: sea_orm::DbErr) -> Self {
        match err {
            sea_orm::DbErr::ConnectionAcquire => {
                QueueError::Connection("failed to acquire database connection".to_string())
            }
            sea_orm::DbErr::Conn(e) => QueueError::Connection(e.to_string()),
            sea_orm::DbErr::Migration(msg) => QueueError::Migration(msg),
            other => QueueError::Query(other.to_string()),
        }
    }
}
