pub mod error;
pub mod queue;
pub mod record;
pub mod redis_store;

pub use error::{StoreError, StoreResult};
pub use queue::{QueueKind, Store};
#[cfg(any(test, feature = "mock"))]
pub use queue::MockStore;
pub use record::{JobType, Status, TaskRecord, MAX_RETRIES, TASK_TTL_SECONDS};
pub use redis_store::RedisStore;
