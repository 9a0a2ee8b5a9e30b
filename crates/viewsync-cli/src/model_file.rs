//! A [`ModelBuilder`] reading model snapshots from a JSON file.

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
    time::SystemTime,
};

use futures::future::{BoxFuture, FutureExt};
use log::debug;
use tokio::fs;

use viewsync::{Result, ViewsyncError, model::Model, services::ModelBuilder};

/// Loads the model from a JSON file, re-reading it only when its
/// modification time moves.
pub struct ModelFile {
    path: PathBuf,
    cached: Mutex<Option<(SystemTime, Arc<Model>)>>,
}

impl ModelFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            cached: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the file's modification time.
    ///
    /// # Errors
    ///
    /// Returns [`ViewsyncError::Io`] if the file cannot be inspected.
    pub async fn modified(&self) -> Result<SystemTime> {
        Ok(fs::metadata(&self.path).await?.modified()?)
    }

    /// Reads and parses the file, or returns the cached model if the file has
    /// not been touched since.
    ///
    /// # Errors
    ///
    /// Returns [`ViewsyncError::Io`] if the file cannot be read and
    /// [`ViewsyncError::Model`] if it is not a valid model.
    pub async fn load(&self) -> Result<Arc<Model>> {
        let modified = self.modified().await?;
        if let Some(model) = self.cached_at(modified) {
            return Ok(model);
        }

        let content = fs::read_to_string(&self.path).await?;
        let model: Model = serde_json::from_str(&content).map_err(|err| {
            ViewsyncError::Model(format!("{}: {err}", self.path.display()))
        })?;
        debug!(
            path = self.path.display().to_string(),
            views = model.views_count();
            "Model file loaded"
        );

        let model = Arc::new(model);
        *self.cached.lock().unwrap_or_else(PoisonError::into_inner) =
            Some((modified, Arc::clone(&model)));
        Ok(model)
    }

    fn cached_at(&self, modified: SystemTime) -> Option<Arc<Model>> {
        self.cached
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|(at, _)| *at == modified)
            .map(|(_, model)| Arc::clone(model))
    }
}

impl ModelBuilder for ModelFile {
    fn build_model(&self) -> BoxFuture<'_, Result<Option<Arc<Model>>>> {
        async move { self.load().await.map(Some) }.boxed()
    }
}

impl fmt::Debug for ModelFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelFile").field("path", &self.path).finish()
    }
}
