//! Durable store implementations.
//!
//! - [`MemoryStore`]: in-memory map, for tests and ephemeral sessions.
//! - [`FileStore`]: a single JSON file, written atomically.
//!
//! # File Format
//!
//! ```json
//! {
//!   "format_version": 1,
//!   "entries": {
//!     "model:last": "{\"elements\":{},\"relations\":{},\"views\":{}}"
//!   }
//! }
//! ```
//!
//! A missing file reads as empty. A file with another `format_version` is
//! logged and ignored rather than reported as an error.

use std::{
    collections::HashMap,
    fmt, fs,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex, RwLock},
};

use directories::ProjectDirs;
use futures::future::{self, BoxFuture, FutureExt};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use tokio::task;

use crate::{
    error::{Result, ViewsyncError},
    services::DurableStore,
};

/// A [`DurableStore`] backed by a `HashMap`.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `entries`.
    pub fn with_entries(entries: HashMap<String, String>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }

    fn read(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| ViewsyncError::Store("memory store lock poisoned".to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn write(&self, key: &str, value: String) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| ViewsyncError::Store("memory store lock poisoned".to_string()))?;
        entries.insert(key.to_string(), value);
        Ok(())
    }
}

impl DurableStore for MemoryStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>>> {
        future::ready(self.read(key)).boxed()
    }

    fn set<'a>(&'a self, key: &'a str, value: String) -> BoxFuture<'a, Result<()>> {
        future::ready(self.write(key, value)).boxed()
    }
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.entries.read().map(|e| e.len()).unwrap_or(0);
        f.debug_struct("MemoryStore")
            .field("entries", &count)
            .finish()
    }
}

#[derive(Serialize, Deserialize)]
struct StoreFile {
    format_version: u32,
    entries: HashMap<String, String>,
}

impl StoreFile {
    const FORMAT_VERSION: u32 = 1;

    fn new() -> Self {
        Self {
            format_version: Self::FORMAT_VERSION,
            entries: HashMap::new(),
        }
    }
}

/// A [`DurableStore`] persisted to one JSON file.
///
/// Writes go to `{path}.tmp` first and are renamed over the target, so a
/// crash mid-write never leaves a truncated store behind. File I/O runs on
/// Tokio's blocking pool.
pub struct FileStore {
    inner: Arc<StoreFileHandle>,
}

impl FileStore {
    /// Creates a store at `path`. The file is created on first write.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            inner: Arc::new(StoreFileHandle {
                path: path.as_ref().to_path_buf(),
                write_lock: Mutex::new(()),
            }),
        }
    }

    /// Creates a store in the platform data directory for `app_name`.
    ///
    /// Falls back to `./.{app_name}/state.json` when no home directory can
    /// be determined.
    pub fn default_for_app(app_name: &str) -> Self {
        let path = match ProjectDirs::from("com", app_name, app_name) {
            Some(dirs) => dirs.data_dir().join("state.json"),
            None => {
                debug!("Could not determine platform-specific data directory");
                PathBuf::from(format!(".{app_name}")).join("state.json")
            }
        };
        Self::new(path)
    }

    /// Returns the path of the backing file.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }
}

/// Runs `f` on the blocking pool.
async fn run_blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    task::spawn_blocking(f)
        .await
        .map_err(|err| ViewsyncError::Store(format!("file store task failed: {err}")))?
}

/// The blocking half of [`FileStore`].
struct StoreFileHandle {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl StoreFileHandle {
    fn temp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone();
        tmp.set_extension("json.tmp");
        tmp
    }

    fn load(&self) -> Result<StoreFile> {
        if !self.path.exists() {
            return Ok(StoreFile::new());
        }

        let content = fs::read_to_string(&self.path)?;
        let file: StoreFile = serde_json::from_str(&content)?;

        if file.format_version != StoreFile::FORMAT_VERSION {
            warn!(
                stored = file.format_version,
                expected = StoreFile::FORMAT_VERSION;
                "Store file format version mismatch, ignoring stored entries"
            );
            return Ok(StoreFile::new());
        }

        Ok(file)
    }

    fn save(&self, file: &StoreFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = self.temp_path();
        {
            let mut writer = BufWriter::new(fs::File::create(&tmp_path)?);
            serde_json::to_writer_pretty(&mut writer, file)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        debug!(
            path = self.path.display().to_string(),
            entries = file.entries.len();
            "Saved store file"
        );
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.load()?.entries.remove(key))
    }

    fn write(&self, key: &str, value: String) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| ViewsyncError::Store("file store lock poisoned".to_string()))?;
        let mut file = self.load()?;
        file.entries.insert(key.to_string(), value);
        self.save(&file)
    }
}

impl DurableStore for FileStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>>> {
        let handle = Arc::clone(&self.inner);
        let key = key.to_string();
        run_blocking(move || handle.read(&key)).boxed()
    }

    fn set<'a>(&'a self, key: &'a str, value: String) -> BoxFuture<'a, Result<()>> {
        let handle = Arc::clone(&self.inner);
        let key = key.to_string();
        run_blocking(move || handle.write(&key, value)).boxed()
    }
}

impl fmt::Debug for FileStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileStore")
            .field("path", &self.inner.path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();

        assert_eq!(store.get("key").await.unwrap(), None);
        store.set("key", "value".to_string()).await.unwrap();
        assert_eq!(store.get("key").await.unwrap().as_deref(), Some("value"));
    }

    #[tokio::test]
    async fn test_file_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("state.json"));

        assert_eq!(store.get("model:last").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        FileStore::new(&path)
            .set("model:last", "{}".to_string())
            .await
            .unwrap();
        FileStore::new(&path)
            .set("other", "1".to_string())
            .await
            .unwrap();

        let store = FileStore::new(&path);
        assert_eq!(store.get("model:last").await.unwrap().as_deref(), Some("{}"));
        assert_eq!(store.get("other").await.unwrap().as_deref(), Some("1"));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_file_store_concurrent_sets_keep_every_entry() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileStore::new(dir.path().join("state.json")));

        let writes = (0..8).map(|i| {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.set(&format!("key{i}"), i.to_string()).await })
        });
        for write in futures::future::join_all(writes).await {
            write.unwrap().unwrap();
        }

        for i in 0..8 {
            assert_eq!(
                store.get(&format!("key{i}")).await.unwrap(),
                Some(i.to_string())
            );
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_file_store_does_not_stall_current_thread_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("state.json"));
        let ticks = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let ticker = {
            let ticks = Arc::clone(&ticks);
            tokio::spawn(async move {
                loop {
                    ticks.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    tokio::task::yield_now().await;
                }
            })
        };
        store.set("model:last", "{}".to_string()).await.unwrap();
        ticker.abort();

        // The write was awaited off-thread, so the ticker got to run meanwhile.
        assert!(ticks.load(std::sync::atomic::Ordering::SeqCst) > 0);
    }

    #[tokio::test]
    async fn test_file_store_ignores_other_format_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(
            &path,
            r#"{ "format_version": 99, "entries": { "model:last": "{}" } }"#,
        )
        .unwrap();

        let store = FileStore::new(&path);
        assert_eq!(store.get("model:last").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_store_reports_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "not json").unwrap();

        let store = FileStore::new(&path);
        assert!(matches!(
            store.get("model:last").await,
            Err(ViewsyncError::Serialization(_))
        ));
    }
}
