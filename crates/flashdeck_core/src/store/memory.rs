//! In-process store used as a test double for repositories and services.
//!
//! Values go through the same codec as the SQLite store, so serialization
//! failures surface identically. Contents are lost when the value drops.

use super::codec::{self, CURRENT_FORMAT_VERSION};
use super::kv_store::{KeyValueStore, StorePage};
use super::{validate_key, CancelToken, StoreResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{Mutex, MutexGuard, PoisonError};

type Entries = BTreeMap<String, (String, u32)>;

#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: Mutex<Entries>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes raw text at `key`, bypassing encoding. Lets tests plant
    /// corrupt or future-format payloads.
    pub fn insert_raw(&self, key: impl Into<String>, text: impl Into<String>, version: u32) {
        self.lock().insert(key.into(), (text.into(), version));
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyValueStore for MemoryKvStore {
    fn put<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StoreResult<()> {
        validate_key(key)?;
        let text = codec::encode(key, value)?;
        self.lock()
            .insert(key.to_string(), (text, CURRENT_FORMAT_VERSION));
        Ok(())
    }

    fn put_if_absent<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StoreResult<bool> {
        validate_key(key)?;
        let text = codec::encode(key, value)?;
        match self.lock().entry(key.to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert((text, CURRENT_FORMAT_VERSION));
                Ok(true)
            }
        }
    }

    fn get<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        validate_key(key)?;
        match self.lock().get(key) {
            Some((text, version)) => Ok(Some(codec::decode(key, text, *version)?)),
            None => Ok(None),
        }
    }

    fn remove(&self, key: &str) -> StoreResult<bool> {
        validate_key(key)?;
        Ok(self.lock().remove(key).is_some())
    }

    fn contains_key(&self, key: &str) -> StoreResult<bool> {
        validate_key(key)?;
        Ok(self.lock().contains_key(key))
    }

    fn merge<T: Serialize + ?Sized>(&self, key: &str, partial: &T) -> StoreResult<()> {
        validate_key(key)?;
        let patch = codec::to_json(key, partial)?;
        let mut entries = self.lock();
        let merged = match entries.get(key) {
            Some((text, version)) => {
                let existing: Value = codec::decode(key, text, *version)?;
                codec::shallow_merge(key, existing, patch)?
            }
            None => patch,
        };
        let text = codec::encode(key, &merged)?;
        entries.insert(key.to_string(), (text, CURRENT_FORMAT_VERSION));
        Ok(())
    }

    fn clear(&self) -> StoreResult<usize> {
        let mut entries = self.lock();
        let removed = entries.len();
        entries.clear();
        Ok(removed)
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        Ok(self.lock().keys().cloned().collect())
    }

    fn len(&self) -> StoreResult<usize> {
        Ok(self.lock().len())
    }

    fn get_all_cancellable<T: DeserializeOwned>(
        &self,
        cancel: &CancelToken,
    ) -> StoreResult<BTreeMap<String, T>> {
        cancel.check()?;
        let entries = self.lock();
        let mut items = BTreeMap::new();
        for (key, (text, version)) in entries.iter() {
            cancel.check()?;
            items.insert(key.clone(), codec::decode(key, text, *version)?);
        }
        Ok(items)
    }

    fn multi_set<K, T>(&self, entries: &[(K, T)]) -> StoreResult<()>
    where
        K: AsRef<str>,
        T: Serialize,
    {
        // Encode everything first so a failure leaves the map untouched.
        let mut encoded = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            let key = key.as_ref();
            validate_key(key)?;
            encoded.push((key.to_string(), codec::encode(key, value)?));
        }
        let mut map = self.lock();
        for (key, text) in encoded {
            map.insert(key, (text, CURRENT_FORMAT_VERSION));
        }
        Ok(())
    }

    fn list_page<T: DeserializeOwned>(
        &self,
        after: Option<&str>,
        limit: u32,
    ) -> StoreResult<StorePage<T>> {
        let limit = super::kv_store::normalize_page_limit(limit) as usize;
        let entries = self.lock();
        let lower = match after {
            Some(key) => Bound::Excluded(key.to_string()),
            None => Bound::Unbounded,
        };
        let mut range = entries.range((lower, Bound::Unbounded));
        let mut page = Vec::new();
        for (key, (text, version)) in range.by_ref().take(limit) {
            page.push((key.clone(), codec::decode(key, text, *version)?));
        }
        let next_after = if range.next().is_some() {
            page.last().map(|(key, _)| key.clone())
        } else {
            None
        };
        Ok(StorePage {
            entries: page,
            next_after,
        })
    }
}
