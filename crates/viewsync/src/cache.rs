//! Memoization of layout and rendering results.
//!
//! Two caches with different keys and lifetimes:
//!
//! - [`LayoutCache`] maps a view's structural [`Fingerprint`] to its
//!   [`LayoutResult`]. It never holds the superseded views themselves:
//!   [`LayoutCache::retain_model`] drops every entry whose fingerprint is
//!   absent from the latest model, which is the only invalidation it needs.
//! - [`RenderedCache`] maps a layout description to its rendered text. The
//!   description fully determines the rendering, so entries stay valid for
//!   the life of the process and are shared between views.

use std::{
    collections::{HashMap, HashSet},
    fmt,
    future::Future,
    sync::{Arc, Mutex},
};

use log::{debug, trace};
use tokio::sync::OnceCell;

use viewsync_core::{
    fingerprint::Fingerprint,
    layout::LayoutResult,
    model::{Model, View},
};

use crate::error::Result;

/// Per-view layout results keyed by view fingerprint.
#[derive(Default)]
pub struct LayoutCache {
    entries: Mutex<HashMap<Fingerprint, Arc<LayoutResult>>>,
}

impl LayoutCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<Fingerprint, Arc<LayoutResult>>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns the cached layout of a view structurally equal to `view`.
    pub fn get(&self, view: &View) -> Option<Arc<LayoutResult>> {
        let fingerprint = view.fingerprint();
        let entries = self.entries();
        entries
            .get(&fingerprint)
            .filter(|result| result.view().as_ref() == view)
            .cloned()
    }

    /// Stores the layout of `view`, replacing any previous entry.
    pub fn insert(&self, view: &View, result: Arc<LayoutResult>) {
        let fingerprint = view.fingerprint();
        trace!(view_id:% = view.id(), fingerprint:% = fingerprint; "Caching layout");
        self.entries().insert(fingerprint, result);
    }

    /// Drops entries for views that no longer exist in `model`.
    ///
    /// Returns the number of entries removed.
    pub fn retain_model(&self, model: &Model) -> usize {
        let live: HashSet<Fingerprint> = model.views().map(View::fingerprint).collect();
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|fingerprint, _| live.contains(fingerprint));
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, remaining = entries.len(); "Pruned superseded layouts");
        }
        removed
    }

    /// Returns the number of cached layouts.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for LayoutCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayoutCache")
            .field("entries", &self.len())
            .finish()
    }
}

/// Rendered text keyed by layout description.
///
/// Concurrent requests for the same description share one render call.
#[derive(Default)]
pub struct RenderedCache {
    entries: Mutex<HashMap<String, Arc<OnceCell<Arc<str>>>>>,
}

impl RenderedCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    fn cell(&self, layout_description: &str) -> Arc<OnceCell<Arc<str>>> {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(
            entries
                .entry(layout_description.to_string())
                .or_default(),
        )
    }

    /// Returns the rendered text for `layout_description`, if rendered.
    pub fn get(&self, layout_description: &str) -> Option<Arc<str>> {
        let entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries
            .get(layout_description)
            .and_then(|cell| cell.get().cloned())
    }

    /// Returns the cached text, or runs `render` once to produce it.
    ///
    /// Callers racing on the same description wait for the first one. A
    /// failed render leaves the entry empty so a later call retries.
    pub async fn get_or_render<F, Fut>(&self, layout_description: &str, render: F) -> Result<Arc<str>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        let cell = self.cell(layout_description);
        if let Some(text) = cell.get() {
            trace!("Rendered output cache hit");
            return Ok(Arc::clone(text));
        }

        let text = cell
            .get_or_try_init(|| async { render().await.map(Arc::<str>::from) })
            .await?;
        Ok(Arc::clone(text))
    }

    /// Returns the number of rendered descriptions.
    pub fn len(&self) -> usize {
        let entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.values().filter(|cell| cell.initialized()).count()
    }

    /// Returns `true` if nothing has been rendered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for RenderedCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderedCache")
            .field("entries", &self.len())
            .finish()
    }
}
