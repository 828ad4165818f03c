//! The namespaced key/value store (design spec §6): `id.*`, `peer.*`,
//! `fav.*`, `ch.*` and friends, addressed through one small trait so the
//! daemon can run against a real SQLite file or an in-memory double in
//! tests without any other crate knowing the difference.

use std::collections::BTreeMap;
use std::sync::Mutex;

use rusqlite::{params, Connection};

use crate::{DbError, Result};

/// Split `full_key` (e.g. `"peer.deadbeef"`) into its namespace including
/// the trailing dot (`"peer."`) and the remainder (`"deadbeef"`).
fn split_namespace(full_key: &str) -> (&str, &str) {
    match full_key.find('.') {
        Some(idx) => (&full_key[..=idx], &full_key[idx + 1..]),
        None => ("", full_key),
    }
}

/// A namespaced key/value store.
///
/// Keys are opaque strings conventionally prefixed with a namespace and a
/// dot (`"peer.aabbccdd"`); values are opaque bytes. Implementations make
/// no attempt to interpret either.
pub trait KeyValueStore: Send + Sync {
    /// Fetch the value for `key`, or `None` if absent.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Insert or overwrite `key` with `value`.
    fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Remove `key`, if present. Not an error if it was already absent.
    fn delete(&self, key: &str) -> Result<()>;

    /// List all keys (with their values) whose key starts with `prefix`.
    fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>>;

    /// Remove every key in `namespace` (e.g. `"fav."` removes all
    /// `fav.*` keys, including `fav.` itself if literally set).
    fn clear_namespace(&self, namespace: &str) -> Result<()>;

    /// Wipe the entire store (design spec §6 `panic_clear_all`). Identity
    /// re-derivation after this call is the caller's responsibility —
    /// the store itself has no notion of which namespace is re-derivable.
    fn clear_all(&self) -> Result<()>;
}

/// A `rusqlite`-backed [`KeyValueStore`], persisted to disk via
/// `raven_db::open`.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new(conn: Connection) -> Self {
        Self { conn: Mutex::new(conn) }
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let (namespace, rest) = split_namespace(key);
        let conn = self.conn.lock().expect("kv store mutex poisoned");
        let result = conn.query_row(
            "SELECT value FROM kv_store WHERE namespace = ?1 AND key = ?2",
            params![namespace, rest],
            |row| row.get::<_, Vec<u8>>(0),
        );
        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DbError::Sqlite(e)),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let (namespace, rest) = split_namespace(key);
        let conn = self.conn.lock().expect("kv store mutex poisoned");
        conn.execute(
            "INSERT INTO kv_store (namespace, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(namespace, key) DO UPDATE SET value = excluded.value",
            params![namespace, rest, value],
        )?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let (namespace, rest) = split_namespace(key);
        let conn = self.conn.lock().expect("kv store mutex poisoned");
        conn.execute("DELETE FROM kv_store WHERE namespace = ?1 AND key = ?2", params![namespace, rest])?;
        Ok(())
    }

    fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let conn = self.conn.lock().expect("kv store mutex poisoned");
        let mut stmt = conn.prepare("SELECT namespace, key, value FROM kv_store")?;
        let rows = stmt.query_map([], |row| {
            let namespace: String = row.get(0)?;
            let key: String = row.get(1)?;
            let value: Vec<u8> = row.get(2)?;
            Ok((format!("{namespace}{key}"), value))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (full_key, value) = row?;
            if full_key.starts_with(prefix) {
                out.push((full_key, value));
            }
        }
        Ok(out)
    }

    fn clear_namespace(&self, namespace: &str) -> Result<()> {
        let conn = self.conn.lock().expect("kv store mutex poisoned");
        conn.execute("DELETE FROM kv_store WHERE namespace = ?1", params![namespace])?;
        Ok(())
    }

    fn clear_all(&self) -> Result<()> {
        let conn = self.conn.lock().expect("kv store mutex poisoned");
        conn.execute("DELETE FROM kv_store", [])?;
        Ok(())
    }
}

/// An in-memory [`KeyValueStore`], for tests and as a default before a
/// data directory is configured.
#[derive(Default)]
pub struct InMemoryStore {
    entries: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for InMemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.lock().expect("kv store mutex poisoned").get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.entries.lock().expect("kv store mutex poisoned").insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.entries.lock().expect("kv store mutex poisoned").remove(key);
        Ok(())
    }

    fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        Ok(self
            .entries
            .lock()
            .expect("kv store mutex poisoned")
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn clear_namespace(&self, namespace: &str) -> Result<()> {
        self.entries.lock().expect("kv store mutex poisoned").retain(|k, _| !k.starts_with(namespace));
        Ok(())
    }

    fn clear_all(&self) -> Result<()> {
        self.entries.lock().expect("kv store mutex poisoned").clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stores() -> Vec<Box<dyn KeyValueStore>> {
        vec![Box::new(SqliteStore::new(crate::open_memory().unwrap())), Box::new(InMemoryStore::new())]
    }

    #[test]
    fn get_missing_key_is_none() {
        for store in stores() {
            assert_eq!(store.get("peer.unknown").unwrap(), None);
        }
    }

    #[test]
    fn set_then_get_roundtrips() {
        for store in stores() {
            store.set("peer.aabb", b"fingerprint").unwrap();
            assert_eq!(store.get("peer.aabb").unwrap(), Some(b"fingerprint".to_vec()));
        }
    }

    #[test]
    fn set_overwrites_existing_value() {
        for store in stores() {
            store.set("fav.npub1", b"old").unwrap();
            store.set("fav.npub1", b"new").unwrap();
            assert_eq!(store.get("fav.npub1").unwrap(), Some(b"new".to_vec()));
        }
    }

    #[test]
    fn delete_removes_key() {
        for store in stores() {
            store.set("ch.general", b"1").unwrap();
            store.delete("ch.general").unwrap();
            assert_eq!(store.get("ch.general").unwrap(), None);
        }
    }

    #[test]
    fn delete_missing_key_is_not_an_error() {
        for store in stores() {
            store.delete("ch.missing").unwrap();
        }
    }

    #[test]
    fn scan_prefix_returns_only_matching_keys() {
        for store in stores() {
            store.set("peer.aabb", b"1").unwrap();
            store.set("peer.ccdd", b"2").unwrap();
            store.set("fav.npub1", b"3").unwrap();

            let mut results = store.scan_prefix("peer.").unwrap();
            results.sort();
            assert_eq!(results, vec![("peer.aabb".to_string(), b"1".to_vec()), ("peer.ccdd".to_string(), b"2".to_vec())]);
        }
    }

    #[test]
    fn clear_namespace_only_wipes_that_namespace() {
        for store in stores() {
            store.set("peer.aabb", b"1").unwrap();
            store.set("fav.npub1", b"2").unwrap();

            store.clear_namespace("peer.").unwrap();

            assert_eq!(store.get("peer.aabb").unwrap(), None);
            assert_eq!(store.get("fav.npub1").unwrap(), Some(b"2".to_vec()));
        }
    }

    #[test]
    fn clear_all_wipes_every_namespace() {
        for store in stores() {
            store.set("id.ed25519", b"secret").unwrap();
            store.set("peer.aabb", b"1").unwrap();
            store.set("fav.npub1", b"2").unwrap();

            store.clear_all().unwrap();

            assert_eq!(store.get("id.ed25519").unwrap(), None);
            assert_eq!(store.get("peer.aabb").unwrap(), None);
            assert_eq!(store.get("fav.npub1").unwrap(), None);
        }
    }

    #[test]
    fn keys_without_a_dot_fall_into_the_empty_namespace() {
        for store in stores() {
            store.set("singleton", b"x").unwrap();
            assert_eq!(store.get("singleton").unwrap(), Some(b"x".to_vec()));
        }
    }
}
