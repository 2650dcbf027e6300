//! Key/value store contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide get/put/remove/merge/clear/keys/list-all over one namespace.
//! - Provide the whole-store reset across namespaces (`clear_all`).
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - Keys are non-empty; listings are ordered by key.
//! - Batch writes and merges run inside a single transaction.
//! - Log lines carry namespace and sizes only, never keys or values.

use super::codec::{self, CURRENT_FORMAT_VERSION};
use super::{validate_key, CancelToken, StoreError, StoreResult};
use crate::db::ensure_store_schema;
use log::{debug, info, warn};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

const PAGE_DEFAULT_LIMIT: u32 = 50;
const PAGE_LIMIT_MAX: u32 = 500;

/// One page of a keyset-paginated listing.
#[derive(Debug, Clone, PartialEq)]
pub struct StorePage<T> {
    /// Entries ordered by key.
    pub entries: Vec<(String, T)>,
    /// Pass as `after` to fetch the next page; `None` on the last page.
    pub next_after: Option<String>,
}

/// Durable key/value persistence scoped to one namespace.
pub trait KeyValueStore {
    /// Serializes `value` and writes it under `key`, replacing any prior value.
    fn put<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StoreResult<()>;

    /// Writes `value` under `key` only if the key is free.
    ///
    /// Returns `false`, leaving the existing entry untouched, when `key` is
    /// already taken. The check and the write are one atomic step.
    fn put_if_absent<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StoreResult<bool>;

    /// Reads and decodes the value at `key`; `Ok(None)` when absent.
    fn get<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>>;

    /// Deletes `key`. Returns whether an entry existed.
    fn remove(&self, key: &str) -> StoreResult<bool>;

    /// Whether `key` holds an entry, without decoding it.
    fn contains_key(&self, key: &str) -> StoreResult<bool>;

    /// Shallow-merges the top-level fields of `partial` into the stored object.
    ///
    /// Writes `partial` as-is when `key` is absent.
    fn merge<T: Serialize + ?Sized>(&self, key: &str, partial: &T) -> StoreResult<()>;

    /// Deletes every entry in the namespace. Returns the number removed.
    fn clear(&self) -> StoreResult<usize>;

    /// Returns all keys, sorted.
    fn keys(&self) -> StoreResult<Vec<String>>;

    /// Returns the number of stored entries.
    fn len(&self) -> StoreResult<usize>;

    /// Decodes every entry, checking `cancel` between entries.
    fn get_all_cancellable<T: DeserializeOwned>(
        &self,
        cancel: &CancelToken,
    ) -> StoreResult<BTreeMap<String, T>>;

    /// Writes all `entries` atomically.
    fn multi_set<K, T>(&self, entries: &[(K, T)]) -> StoreResult<()>
    where
        K: AsRef<str>,
        T: Serialize;

    /// Returns entries with keys strictly greater than `after`, up to `limit`.
    ///
    /// `limit = 0` uses the default page size; larger values are clamped.
    fn list_page<T: DeserializeOwned>(
        &self,
        after: Option<&str>,
        limit: u32,
    ) -> StoreResult<StorePage<T>>;

    /// Like `get`, but an absent key is `Err(NotFound)`.
    fn require<T: DeserializeOwned>(&self, key: &str) -> StoreResult<T> {
        self.get(key)?
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    /// Decodes every entry. Fails as a whole if any entry fails.
    fn get_all<T: DeserializeOwned>(&self) -> StoreResult<BTreeMap<String, T>> {
        self.get_all_cancellable(&CancelToken::new())
    }

    /// Reads several keys; absent keys yield `None` in their slot.
    fn multi_get<T: DeserializeOwned>(
        &self,
        keys: &[&str],
    ) -> StoreResult<Vec<(String, Option<T>)>> {
        let mut items = Vec::with_capacity(keys.len());
        for key in keys {
            items.push(((*key).to_string(), self.get(key)?));
        }
        Ok(items)
    }

    fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }
}

/// SQLite-backed store over the `kv_entries` table.
pub struct SqliteKvStore<'conn> {
    conn: &'conn Connection,
    namespace: String,
}

impl<'conn> SqliteKvStore<'conn> {
    /// Binds a store to a migrated connection and a namespace.
    ///
    /// # Errors
    /// - `InvalidKey` when `namespace` is empty.
    /// - `StorageUnavailable` when the connection is not migrated.
    pub fn try_new(conn: &'conn Connection, namespace: impl Into<String>) -> StoreResult<Self> {
        let namespace = namespace.into();
        if namespace.trim().is_empty() {
            return Err(StoreError::InvalidKey(
                "namespace cannot be empty".to_string(),
            ));
        }
        ensure_store_schema(conn)?;
        Ok(Self { conn, namespace })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn read_raw(&self, key: &str) -> StoreResult<Option<(String, u32)>> {
        let row = self
            .conn
            .query_row(
                "SELECT value, format_version
                 FROM kv_entries
                 WHERE namespace = ?1 AND key = ?2;",
                params![self.namespace, key],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?;
        match row {
            Some((text, raw_version)) => {
                let version = codec::format_version(key, raw_version)?;
                Ok(Some((text, version)))
            }
            None => Ok(None),
        }
    }

    fn write_raw(&self, key: &str, text: &str) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO kv_entries (namespace, key, value, format_version, updated_at)
             VALUES (?1, ?2, ?3, ?4, (strftime('%s', 'now') * 1000))
             ON CONFLICT (namespace, key) DO UPDATE SET
                value = excluded.value,
                format_version = excluded.format_version,
                updated_at = excluded.updated_at;",
            params![self.namespace, key, text, CURRENT_FORMAT_VERSION],
        )?;
        Ok(())
    }

    fn insert_new(&self, key: &str, text: &str) -> StoreResult<bool> {
        let inserted = self.conn.execute(
            "INSERT INTO kv_entries (namespace, key, value, format_version, updated_at)
             VALUES (?1, ?2, ?3, ?4, (strftime('%s', 'now') * 1000))
             ON CONFLICT (namespace, key) DO NOTHING;",
            params![self.namespace, key, text, CURRENT_FORMAT_VERSION],
        )?;
        Ok(inserted == 1)
    }

    fn query_keys(&self) -> StoreResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key FROM kv_entries WHERE namespace = ?1 ORDER BY key ASC;")?;
        let keys = stmt
            .query_map([&self.namespace], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    fn read_all<T: DeserializeOwned>(
        &self,
        cancel: &CancelToken,
    ) -> StoreResult<BTreeMap<String, T>> {
        cancel.check()?;
        let mut stmt = self.conn.prepare(
            "SELECT key, value, format_version
             FROM kv_entries
             WHERE namespace = ?1
             ORDER BY key ASC;",
        )?;
        let mut rows = stmt.query([&self.namespace])?;
        let mut items = BTreeMap::new();
        while let Some(row) = rows.next()? {
            cancel.check()?;
            let (key, value) = decode_row(row)?;
            items.insert(key, value);
        }
        Ok(items)
    }

    fn write_all<K, T>(&self, entries: &[(K, T)]) -> StoreResult<()>
    where
        K: AsRef<str>,
        T: Serialize,
    {
        let tx = self.conn.unchecked_transaction()?;
        for (key, value) in entries {
            let key = key.as_ref();
            validate_key(key)?;
            self.write_raw(key, &codec::encode(key, value)?)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn read_page<T: DeserializeOwned>(
        &self,
        after: Option<&str>,
        limit: u32,
    ) -> StoreResult<StorePage<T>> {
        // Fetch one extra row to learn whether another page exists.
        let mut stmt = self.conn.prepare(
            "SELECT key, value, format_version
             FROM kv_entries
             WHERE namespace = ?1
               AND (?2 IS NULL OR key > ?2)
             ORDER BY key ASC
             LIMIT ?3;",
        )?;
        let mut rows = stmt.query(params![self.namespace, after, i64::from(limit) + 1])?;
        let mut entries = Vec::new();
        let mut has_more = false;
        while let Some(row) = rows.next()? {
            if entries.len() == limit as usize {
                has_more = true;
                break;
            }
            entries.push(decode_row(row)?);
        }
        let next_after = if has_more {
            entries.last().map(|(key, _)| key.clone())
        } else {
            None
        };
        Ok(StorePage {
            entries,
            next_after,
        })
    }

    fn log_failure(&self, op: &str, err: &StoreError) {
        warn!(
            "event=store_{op} module=store status=error namespace={} error_code={} error={}",
            self.namespace,
            err.code(),
            err
        );
    }

    fn logged<T>(&self, op: &str, result: StoreResult<T>) -> StoreResult<T> {
        if let Err(err) = &result {
            self.log_failure(op, err);
        }
        result
    }
}

impl KeyValueStore for SqliteKvStore<'_> {
    fn put<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StoreResult<()> {
        let result = validate_key(key)
            .and_then(|()| codec::encode(key, value))
            .and_then(|text| {
                self.write_raw(key, &text)?;
                Ok(text.len())
            });
        let bytes = self.logged("put", result)?;
        debug!(
            "event=store_put module=store status=ok namespace={} bytes={}",
            self.namespace, bytes
        );
        Ok(())
    }

    fn put_if_absent<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StoreResult<bool> {
        let result = validate_key(key)
            .and_then(|()| codec::encode(key, value))
            .and_then(|text| self.insert_new(key, &text));
        let inserted = self.logged("put_if_absent", result)?;
        debug!(
            "event=store_put_if_absent module=store status=ok namespace={} inserted={}",
            self.namespace, inserted
        );
        Ok(inserted)
    }

    fn get<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        let result = validate_key(key).and_then(|()| self.read_raw(key));
        let Some((text, version)) = self.logged("get", result)? else {
            return Ok(None);
        };
        let value = self.logged("get", codec::decode(key, &text, version))?;
        Ok(Some(value))
    }

    fn remove(&self, key: &str) -> StoreResult<bool> {
        let result = validate_key(key).and_then(|()| {
            let changed = self.conn.execute(
                "DELETE FROM kv_entries WHERE namespace = ?1 AND key = ?2;",
                params![self.namespace, key],
            )?;
            Ok(changed > 0)
        });
        let existed = self.logged("remove", result)?;
        debug!(
            "event=store_remove module=store status=ok namespace={} existed={}",
            self.namespace, existed
        );
        Ok(existed)
    }

    fn contains_key(&self, key: &str) -> StoreResult<bool> {
        let result = validate_key(key).and_then(|()| {
            let exists: i64 = self.conn.query_row(
                "SELECT EXISTS(
                    SELECT 1 FROM kv_entries WHERE namespace = ?1 AND key = ?2
                );",
                params![self.namespace, key],
                |row| row.get(0),
            )?;
            Ok(exists == 1)
        });
        self.logged("contains_key", result)
    }

    fn merge<T: Serialize + ?Sized>(&self, key: &str, partial: &T) -> StoreResult<()> {
        let result = validate_key(key).and_then(|()| {
            let patch = codec::to_json(key, partial)?;
            let tx = self.conn.unchecked_transaction()?;
            let merged = match self.read_raw(key)? {
                Some((text, version)) => {
                    let existing: Value = codec::decode(key, &text, version)?;
                    codec::shallow_merge(key, existing, patch)?
                }
                None => patch,
            };
            self.write_raw(key, &codec::encode(key, &merged)?)?;
            tx.commit()?;
            Ok(())
        });
        self.logged("merge", result)?;
        debug!(
            "event=store_merge module=store status=ok namespace={}",
            self.namespace
        );
        Ok(())
    }

    fn clear(&self) -> StoreResult<usize> {
        let result = self
            .conn
            .execute(
                "DELETE FROM kv_entries WHERE namespace = ?1;",
                [&self.namespace],
            )
            .map_err(StoreError::from);
        let removed = self.logged("clear", result)?;
        debug!(
            "event=store_clear module=store status=ok namespace={} removed={}",
            self.namespace, removed
        );
        Ok(removed)
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        self.logged("keys", self.query_keys())
    }

    fn len(&self) -> StoreResult<usize> {
        let result = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM kv_entries WHERE namespace = ?1;",
                [&self.namespace],
                |row| row.get::<_, i64>(0),
            )
            .map_err(StoreError::from);
        let count = self.logged("len", result)?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn get_all_cancellable<T: DeserializeOwned>(
        &self,
        cancel: &CancelToken,
    ) -> StoreResult<BTreeMap<String, T>> {
        let items = self.logged("get_all", self.read_all(cancel))?;
        debug!(
            "event=store_get_all module=store status=ok namespace={} count={}",
            self.namespace,
            items.len()
        );
        Ok(items)
    }

    fn multi_set<K, T>(&self, entries: &[(K, T)]) -> StoreResult<()>
    where
        K: AsRef<str>,
        T: Serialize,
    {
        self.logged("multi_set", self.write_all(entries))?;
        debug!(
            "event=store_multi_set module=store status=ok namespace={} count={}",
            self.namespace,
            entries.len()
        );
        Ok(())
    }

    fn list_page<T: DeserializeOwned>(
        &self,
        after: Option<&str>,
        limit: u32,
    ) -> StoreResult<StorePage<T>> {
        let limit = normalize_page_limit(limit);
        self.logged("list_page", self.read_page(after, limit))
    }
}

/// Deletes every entry in every namespace. Returns the number removed.
///
/// This is the whole-store reset; `KeyValueStore::clear` only empties one
/// namespace.
pub fn clear_all(conn: &Connection) -> StoreResult<usize> {
    ensure_store_schema(conn)?;
    let result = conn
        .execute("DELETE FROM kv_entries;", [])
        .map_err(StoreError::from);
    match result {
        Ok(removed) => {
            info!("event=store_clear_all module=store status=ok removed={removed}");
            Ok(removed)
        }
        Err(err) => {
            warn!(
                "event=store_clear_all module=store status=error error_code={} error={}",
                err.code(),
                err
            );
            Err(err)
        }
    }
}

fn decode_row<T: DeserializeOwned>(row: &Row<'_>) -> StoreResult<(String, T)> {
    let key: String = row.get(0)?;
    let text: String = row.get(1)?;
    let version = codec::format_version(&key, row.get(2)?)?;
    let value = codec::decode(&key, &text, version)?;
    Ok((key, value))
}

pub(super) fn normalize_page_limit(limit: u32) -> u32 {
    match limit {
        0 => PAGE_DEFAULT_LIMIT,
        value if value > PAGE_LIMIT_MAX => PAGE_LIMIT_MAX,
        value => value,
    }
}
