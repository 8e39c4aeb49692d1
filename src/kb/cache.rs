//! Persistent request cache
//!
//! Two column families: `http_requests` (response body by URL digest) and
//! `labels` (label by id, including "has no English label"). An LRU map
//! sits in front of both so repeated lookups within a run stay in memory.

use lru::LruCache;
use rocksdb::{ColumnFamilyDescriptor, Options, DB};
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, info};

const CF_REQUESTS: &str = "http_requests";
const CF_LABELS: &str = "labels";

/// Cache errors
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("Column family error: {0}")]
    ColumnFamily(String),

    #[error("Cache lock poisoned")]
    Poisoned,
}

pub type CacheResult<T> = Result<T, CacheError>;

/// RocksDB-backed cache of knowledge-base responses
pub struct RequestCache {
    db: DB,
    front: Mutex<LruCache<String, Vec<u8>>>,
}

impl RequestCache {
    /// Open or create the cache at `path`
    pub fn open(path: impl AsRef<Path>, lru_capacity: usize) -> CacheResult<Self> {
        info!("Opening request cache at: {}", path.as_ref().display());

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new("default", Options::default()),
            ColumnFamilyDescriptor::new(CF_REQUESTS, Self::cf_options()),
            ColumnFamilyDescriptor::new(CF_LABELS, Self::cf_options()),
        ];
        let db = DB::open_cf_descriptors(&opts, path.as_ref(), cf_descriptors)?;

        let capacity = NonZeroUsize::new(lru_capacity).unwrap_or(NonZeroUsize::MIN);
        Ok(Self {
            db,
            front: Mutex::new(LruCache::new(capacity)),
        })
    }

    fn cf_options() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn request_key(url: &str) -> String {
        format!("{:x}", Sha256::digest(url.as_bytes()))
    }

    fn get(&self, cf_name: &str, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let front_key = format!("{}:{}", cf_name, key);
        if let Some(bytes) = self.front.lock().map_err(|_| CacheError::Poisoned)?.get(&front_key) {
            return Ok(Some(bytes.clone()));
        }

        let cf = self
            .db
            .cf_handle(cf_name)
            .ok_or_else(|| CacheError::ColumnFamily(cf_name.to_string()))?;
        let stored = self.db.get_cf(&cf, key.as_bytes())?;
        if let Some(bytes) = &stored {
            self.front
                .lock()
                .map_err(|_| CacheError::Poisoned)?
                .put(front_key, bytes.clone());
        }
        Ok(stored)
    }

    fn put(&self, cf_name: &str, key: &str, bytes: Vec<u8>) -> CacheResult<()> {
        let cf = self
            .db
            .cf_handle(cf_name)
            .ok_or_else(|| CacheError::ColumnFamily(cf_name.to_string()))?;
        self.db.put_cf(&cf, key.as_bytes(), &bytes)?;
        self.front
            .lock()
            .map_err(|_| CacheError::Poisoned)?
            .put(format!("{}:{}", cf_name, key), bytes);
        Ok(())
    }

    /// Cached JSON response for a request URL
    pub fn get_request(&self, url: &str) -> CacheResult<Option<serde_json::Value>> {
        match self.get(CF_REQUESTS, &Self::request_key(url))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put_request(&self, url: &str, response: &serde_json::Value) -> CacheResult<()> {
        debug!("Caching response for {}", url);
        self.put(CF_REQUESTS, &Self::request_key(url), serde_json::to_vec(response)?)
    }

    /// `None` when the id was never cached; `Some(None)` when it is known to have no label
    pub fn get_label(&self, id: &str) -> CacheResult<Option<Option<String>>> {
        match self.get(CF_LABELS, id)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put_label(&self, id: &str, label: Option<&str>) -> CacheResult<()> {
        self.put(CF_LABELS, id, bincode::serialize(&label)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_request_round_trip_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let url = "https://query.wikidata.org/sparql?query=SELECT";
        {
            let cache = RequestCache::open(dir.path(), 4).unwrap();
            assert!(cache.get_request(url).unwrap().is_none());
            cache.put_request(url, &serde_json::json!({"results": {"bindings": []}})).unwrap();
        }
        let cache = RequestCache::open(dir.path(), 4).unwrap();
        let cached = cache.get_request(url).unwrap().unwrap();
        assert_eq!(cached["results"]["bindings"], serde_json::json!([]));
    }

    #[test]
    fn test_missing_label_is_distinguished_from_uncached() {
        let dir = TempDir::new().unwrap();
        let cache = RequestCache::open(dir.path(), 0).unwrap();
        cache.put_label("Q42", Some("Douglas Adams")).unwrap();
        cache.put_label("Q0", None).unwrap();
        assert_eq!(cache.get_label("Q42").unwrap(), Some(Some("Douglas Adams".to_string())));
        assert_eq!(cache.get_label("Q0").unwrap(), Some(None));
        assert_eq!(cache.get_label("Q1").unwrap(), None);
    }
}
