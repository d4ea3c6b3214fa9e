//! S3-backed object store (C1), best-effort user-directory lock (C2), and
//! the case storage layer built on top of both (C3).

pub mod lock;
pub mod object_store;
pub mod storage;

pub use lock::{acquire as acquire_user_lock, LockConfig, UserLockGuard};
pub use object_store::{BucketConfig, ObjectStore, ObjectSummary, PresignAction};
pub use storage::CaseStorage;
