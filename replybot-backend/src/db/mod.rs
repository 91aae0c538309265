//! Reply log storage backends.

pub mod airtable;
pub mod sqlite;
mod tables;

pub use airtable::AirtableStore;
pub use sqlite::Database;

use crate::models::ReplyRecord;
use async_trait::async_trait;

/// Append-only store of reply records.
///
/// No uniqueness is enforced here; deduplication is the caller's
/// check-before-append.
#[async_trait]
pub trait ReplyStore: Send + Sync {
    /// Every record ever appended
    async fn query_all(&self) -> Result<Vec<ReplyRecord>, String>;

    async fn append(&self, record: &ReplyRecord) -> Result<(), String>;
}
