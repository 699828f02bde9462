//! In-memory store for tests and ephemeral runs.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::models::records::{ExpenseRecord, RegistryEntry, UserProfile};

use super::ExpenseStore;

#[derive(Default)]
struct Tables {
    users: HashMap<String, UserProfile>,
    expenses: Vec<ExpenseRecord>,
    registry: Vec<RegistryEntry>,
}

/// Store that keeps everything in process memory.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with one user.
    pub fn with_user(user_id: impl Into<String>) -> Self {
        let id = user_id.into();
        let mut tables = Tables::default();
        tables.users.insert(
            id.clone(),
            UserProfile {
                id,
                email: None,
                name: None,
            },
        );
        Self {
            tables: Mutex::new(tables),
        }
    }

    pub async fn add_user(&self, user: UserProfile) {
        self.tables.lock().await.users.insert(user.id.clone(), user);
    }

    /// Snapshot of persisted expenses, in insertion order.
    pub async fn expenses(&self) -> Vec<ExpenseRecord> {
        self.tables.lock().await.expenses.clone()
    }

    /// Snapshot of persisted registry records, in insertion order.
    pub async fn registry_entries(&self) -> Vec<RegistryEntry> {
        self.tables.lock().await.registry.clone()
    }
}

#[async_trait]
impl ExpenseStore for MemoryStore {
    async fn find_user(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError> {
        Ok(self.tables.lock().await.users.get(user_id).cloned())
    }

    async fn insert_expense(&self, record: &ExpenseRecord) -> Result<(), StoreError> {
        self.tables.lock().await.expenses.push(record.clone());
        Ok(())
    }

    async fn insert_registry_record(&self, entry: &RegistryEntry) -> Result<(), StoreError> {
        self.tables.lock().await.registry.push(entry.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_find_user() {
        let store = MemoryStore::with_user("u-1");
        assert!(store.find_user("u-1").await.unwrap().is_some());
        assert!(store.find_user("u-2").await.unwrap().is_none());

        store
            .add_user(UserProfile {
                id: "u-2".to_string(),
                email: Some("asha@example.com".to_string()),
                name: None,
            })
            .await;
        let user = store.find_user("u-2").await.unwrap().unwrap();
        assert_eq!(user.email.as_deref(), Some("asha@example.com"));
    }
}
