//! Secure key-value storage.
//!
//! On a device this is the platform keychain; here it is a table in the app
//! database, or an in-memory map for tests and ephemeral runs.

use std::collections::BTreeMap;
use std::sync::Mutex;

use rusqlite::{Connection, OptionalExtension};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Invalid storage key: '{0}'")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

pub trait SecureStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Deleting a key that does not exist succeeds.
    fn delete(&self, key: &str) -> Result<(), StoreError>;
}

impl<T: SecureStore + ?Sized> SecureStore for &T {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        (**self).delete(key)
    }
}

/// Keys are opaque; any non-empty string is accepted as-is.
pub fn validate_key(key: &str) -> Result<(), StoreError> {
    if key.is_empty() {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Store backed by the `secure_store` table. Expects a migrated connection.
pub struct SqliteSecureStore<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteSecureStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

impl SecureStore for SqliteSecureStore<'_> {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        validate_key(key)?;
        let value = self
            .conn
            .query_row("SELECT value FROM secure_store WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        validate_key(key)?;
        self.conn.execute(
            "INSERT INTO secure_store (key, value) VALUES (?1, ?2)
             ON CONFLICT (key) DO UPDATE SET value = excluded.value",
            [key, value],
        )?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        validate_key(key)?;
        self.conn
            .execute("DELETE FROM secure_store WHERE key = ?1", [key])?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored entry, sorted by key.
    pub fn entries(&self) -> Vec<(String, String)> {
        match self.entries.lock() {
            Ok(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            Err(poisoned) => poisoned
                .into_inner()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    fn with_map<T>(&self, f: impl FnOnce(&mut BTreeMap<String, String>) -> T) -> Result<T, StoreError> {
        let mut map = self
            .entries
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))?;
        Ok(f(&mut map))
    }
}

impl SecureStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        validate_key(key)?;
        self.with_map(|map| map.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        validate_key(key)?;
        self.with_map(|map| {
            map.insert(key.to_string(), value.to_string());
        })
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        validate_key(key)?;
        self.with_map(|map| {
            map.remove(key);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{migrate, open_db};

    fn exercise(store: &dyn SecureStore) {
        assert_eq!(store.get("greeting").unwrap(), None);
        store.set("greeting", "hello").unwrap();
        assert_eq!(store.get("greeting").unwrap().as_deref(), Some("hello"));
        store.set("greeting", "bye").unwrap();
        assert_eq!(store.get("greeting").unwrap().as_deref(), Some("bye"));
        store.delete("greeting").unwrap();
        assert_eq!(store.get("greeting").unwrap(), None);
        store.delete("greeting").unwrap();
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("lucky_number_user-42_2025-06-01").is_ok());
        assert!(validate_key("fourdata.auth.session").is_ok());
        assert!(validate_key("lucky_number_alice@example.com_2025-06-01").is_ok());
        assert!(validate_key("@recent_searches").is_ok());
        assert!(validate_key("").is_err());
    }

    #[test]
    fn test_keys_with_any_characters_round_trip() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        let sqlite = SqliteSecureStore::new(&conn);
        let memory = MemoryStore::new();
        for store in [&sqlite as &dyn SecureStore, &memory] {
            for key in ["lucky_number_alice@example.com_2025-06-01", "has space", "a+b:c/é"] {
                store.set(key, "1234").unwrap();
                assert_eq!(store.get(key).unwrap().as_deref(), Some("1234"));
            }
        }
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        exercise(&store);
        assert!(matches!(store.set("bad key", "x"), Err(StoreError::InvalidKey(_))));
    }

    #[test]
    fn test_sqlite_store_in_memory() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        let store = SqliteSecureStore::new(&conn);
        exercise(&store);
    }

    #[test]
    fn test_sqlite_store_persists_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("app.db");
        {
            let conn = open_db(&path).unwrap();
            migrate(&conn).unwrap();
            SqliteSecureStore::new(&conn).set("token", "abc").unwrap();
        }
        let conn = open_db(&path).unwrap();
        migrate(&conn).unwrap();
        assert_eq!(SqliteSecureStore::new(&conn).get("token").unwrap().as_deref(), Some("abc"));
    }

    fn put_owned<S: SecureStore>(store: S) {
        store.set("k", "v").unwrap();
    }

    #[test]
    fn test_reference_forwarding() {
        let store = MemoryStore::new();
        put_owned(&store);
        assert_eq!(store.entries(), vec![("k".to_string(), "v".to_string())]);
    }
}
