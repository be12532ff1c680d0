//! JSON file store.
//!
//! The whole map is kept in memory and rewritten to disk on every `set`.
//! Rewrites go to a sibling temp file that is renamed over the original, so a
//! crash mid-write leaves the previous contents in place.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;

use crate::storage::{KeyValueStore, StoreError};

/// Store persisted as a single JSON object on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    inner: Arc<DashMap<String, serde_json::Value>>,
    path: PathBuf,
    // Serializes rewrites of the file.
    write_lock: Arc<Mutex<()>>,
}

impl JsonFileStore {
    /// Open `path`, loading existing contents when the file exists.
    ///
    /// A file that does not parse is moved aside to `<path>.corrupt` and the
    /// store starts empty. Only I/O failures are returned.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let inner = Arc::new(DashMap::new());

        if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            match serde_json::from_reader::<_, HashMap<String, serde_json::Value>>(reader) {
                Ok(map) => {
                    for (k, v) in map {
                        inner.insert(k, v);
                    }
                    tracing::info!(path = ?path, keys = inner.len(), "Loaded relay state");
                }
                Err(e) => {
                    let aside = sibling(&path, "corrupt");
                    fs::rename(&path, &aside)?;
                    tracing::warn!(
                        path = ?path,
                        moved_to = ?aside,
                        error = %e,
                        "Relay state unreadable, starting from defaults"
                    );
                }
            }
        }

        Ok(Self {
            inner,
            path,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), StoreError> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let map: HashMap<_, _> = self
            .inner
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect();
        let tmp = sibling(&self.path, "tmp");
        let mut writer = BufWriter::new(File::create(&tmp)?);
        serde_json::to_writer_pretty(&mut writer, &map)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// `path` with `suffix` appended to its file name.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        Ok(self.inner.get(key).map(|r| r.value().clone()))
    }

    fn set(&self, key: &str, value: serde_json::Value) -> Result<(), StoreError> {
        self.inner.insert(key.to_string(), value);
        self.flush()
    }
}
