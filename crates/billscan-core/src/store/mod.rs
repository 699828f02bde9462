//! Storage collaborator: user lookup and append-only expense records.

mod jsonl;
mod memory;

pub use jsonl::JsonlStore;
pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::records::{ExpenseRecord, RegistryEntry, UserProfile};

/// Persistence used by the pipeline. Records are written once and never
/// updated.
#[async_trait]
pub trait ExpenseStore: Send + Sync {
    /// Look up a user by id.
    async fn find_user(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError>;

    /// Persist a verified expense.
    async fn insert_expense(&self, record: &ExpenseRecord) -> Result<(), StoreError>;

    /// Persist the outcome of a successful registry lookup.
    async fn insert_registry_record(&self, entry: &RegistryEntry) -> Result<(), StoreError>;
}
