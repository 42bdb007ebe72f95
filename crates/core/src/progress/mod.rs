//! Durable per-item download state.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqliteProgressStore;
pub use store::{ProgressError, ProgressStore};
pub use types::{DiscoveryState, DownloadItem, ItemStatus, StatusSummary};
