//! Record persistence
//!
//! The collectors only know the [`RecordStore`] trait: an append-only sink
//! taking one flattened record at a time and returning the generated row id.
//! There is no update or delete path.

mod memory;
mod sqlite;

pub use memory::{MemoryStore, DEFAULT_MAX_RECORDS};
pub use sqlite::SqliteStore;

use crate::error::StoreError;
use crate::models::InventoryRecord;
use async_trait::async_trait;

/// Append-only sink for inventory records
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist a single record and return its generated identifier
    async fn insert(&self, record: InventoryRecord) -> Result<i64, StoreError>;
}
