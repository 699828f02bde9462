//! Append-only JSON-lines store.
//!
//! Layout under the data directory:
//! - `users.jsonl`: one [`UserProfile`] per line, later lines win
//! - `expenses.jsonl`: one [`ExpenseRecord`] per line
//! - `registry.jsonl`: one [`RegistryEntry`] per line

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::models::records::{ExpenseRecord, RegistryEntry, UserProfile};

use super::ExpenseStore;

const USERS: &str = "users.jsonl";
const EXPENSES: &str = "expenses.jsonl";
const REGISTRY: &str = "registry.jsonl";

/// File-backed store writing one JSON document per line.
pub struct JsonlStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlStore {
    /// Open (and create if needed) a store rooted at `dir`.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Register a user so that requests carrying its id are accepted.
    pub async fn add_user(&self, user: &UserProfile) -> Result<(), StoreError> {
        self.append(USERS, user).await
    }

    /// Read back all persisted expenses.
    pub async fn expenses(&self) -> Result<Vec<ExpenseRecord>, StoreError> {
        self.read_all(EXPENSES).await
    }

    /// Read back all persisted registry records.
    pub async fn registry_entries(&self) -> Result<Vec<RegistryEntry>, StoreError> {
        self.read_all(REGISTRY).await
    }

    async fn append<T: Serialize>(&self, file: &str, value: &T) -> Result<(), StoreError> {
        let mut line = serde_json::to_vec(value)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        let mut handle = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(file))
            .await?;
        handle.write_all(&line).await?;
        handle.flush().await?;

        debug!("Appended {} bytes to {}", line.len(), file);
        Ok(())
    }

    async fn read_all<T: DeserializeOwned>(&self, file: &str) -> Result<Vec<T>, StoreError> {
        let content = match tokio::fs::read_to_string(self.dir.join(file)).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut values = Vec::new();
        for (n, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(value) => values.push(value),
                // A torn final line from an interrupted write is skipped.
                Err(e) => warn!("Skipping unreadable line {} in {}: {}", n + 1, file, e),
            }
        }
        Ok(values)
    }
}

#[async_trait]
impl ExpenseStore for JsonlStore {
    async fn find_user(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError> {
        let users: Vec<UserProfile> = self.read_all(USERS).await?;
        Ok(users.into_iter().rev().find(|u| u.id == user_id))
    }

    async fn insert_expense(&self, record: &ExpenseRecord) -> Result<(), StoreError> {
        self.append(EXPENSES, record).await
    }

    async fn insert_registry_record(&self, entry: &RegistryEntry) -> Result<(), StoreError> {
        self.append(REGISTRY, entry).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn user(id: &str, name: &str) -> UserProfile {
        UserProfile {
            id: id.to_string(),
            email: None,
            name: Some(name.to_string()),
        }
    }

    #[tokio::test]
    async fn test_users_later_lines_win() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlStore::open(dir.path()).await.unwrap();

        assert!(store.find_user("u-1").await.unwrap().is_none());
        store.add_user(&user("u-1", "Asha")).await.unwrap();
        store.add_user(&user("u-1", "Asha K")).await.unwrap();

        let found = store.find_user("u-1").await.unwrap().unwrap();
        assert_eq!(found.name.as_deref(), Some("Asha K"));
    }

    #[tokio::test]
    async fn test_registry_records_append() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlStore::open(dir.path().join("data")).await.unwrap();

        for n in 0..2 {
            let entry = RegistryEntry {
                id: Uuid::new_v4(),
                user_id: "u-1".to_string(),
                registration_number: "27AAPFU0939F1ZV".to_string(),
                business_name: Some(format!("Shop {}", n)),
                address: None,
                location: None,
                created_at: Utc::now(),
            };
            store.insert_registry_record(&entry).await.unwrap();
        }

        let entries = store.registry_entries().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].business_name.as_deref(), Some("Shop 1"));
        assert!(store.expenses().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_torn_line_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlStore::open(dir.path()).await.unwrap();
        store.add_user(&user("u-1", "Asha")).await.unwrap();
        std::fs::OpenOptions::new()
            .append(true)
            .open(dir.path().join(USERS))
            .and_then(|mut f| std::io::Write::write_all(&mut f, br#"{"id": "u-2", "na"#))
            .unwrap();

        assert!(store.find_user("u-1").await.unwrap().is_some());
        assert!(store.find_user("u-2").await.unwrap().is_none());
    }
}
