//! The shared path to the layout engine.
//!
//! Every layout and render call, whether issued by a bulk operation or by a
//! live view subscription, goes through one [`Layouter`]: it checks the
//! caches, takes a [`ConcurrencyLimiter`] slot, and stores what the engine
//! returns. Bulk work and subscriptions may race on the same view; the
//! loser pays for a second engine call and overwrites an equal entry.

use std::{fmt, sync::Arc};

use log::debug;

use viewsync_core::{
    layout::LayoutResult,
    model::{Model, View},
};

use crate::{
    cache::{LayoutCache, RenderedCache},
    error::Result,
    limiter::ConcurrencyLimiter,
    services::LayoutEngine,
};

/// Cached, concurrency-bounded access to a [`LayoutEngine`].
pub struct Layouter {
    engine: Arc<dyn LayoutEngine>,
    limiter: ConcurrencyLimiter,
    layouts: LayoutCache,
    rendered: RenderedCache,
}

impl Layouter {
    /// Creates a layouter admitting `concurrency` simultaneous engine calls.
    pub fn new(engine: Arc<dyn LayoutEngine>, concurrency: usize) -> Self {
        Self {
            engine,
            limiter: ConcurrencyLimiter::new(concurrency),
            layouts: LayoutCache::new(),
            rendered: RenderedCache::new(),
        }
    }

    /// Returns the layout of `view`, from cache or from the engine.
    ///
    /// The cache check runs inside the limiter slot so that a view queued
    /// behind an identical one picks up the freshly stored result.
    ///
    /// # Errors
    ///
    /// Propagates the engine's error; nothing is cached in that case.
    pub async fn layout(&self, view: Arc<View>) -> Result<Arc<LayoutResult>> {
        self.limiter
            .run(|| async {
                if let Some(hit) = self.layouts.get(&view) {
                    debug!(view_id:% = view.id(); "Layout cache hit");
                    return Ok(hit);
                }

                debug!(view_id:% = view.id(); "Layout cache miss");
                let result = Arc::new(self.engine.layout(Arc::clone(&view)).await?);
                self.layouts.insert(&view, Arc::clone(&result));
                Ok(result)
            })
            .await
    }

    /// Returns the rendered text for a layout result's description.
    ///
    /// Results with textually identical descriptions share one render call,
    /// regardless of which view produced them.
    ///
    /// # Errors
    ///
    /// Propagates the engine's error; a later call retries.
    pub async fn render(&self, result: &LayoutResult) -> Result<Arc<str>> {
        let description = result.layout_description();
        self.rendered
            .get_or_render(description, || {
                self.limiter
                    .run(|| self.engine.render(description, result.diagram()))
            })
            .await
    }

    /// Drops cached layouts of views that `model` no longer contains.
    pub fn retain_model(&self, model: &Model) -> usize {
        self.layouts.retain_model(model)
    }

    /// Returns the per-view layout cache.
    pub fn layouts(&self) -> &LayoutCache {
        &self.layouts
    }

    /// Returns the rendered output cache.
    pub fn rendered(&self) -> &RenderedCache {
        &self.rendered
    }

    /// Returns the limiter shared by every engine call.
    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.limiter
    }
}

impl fmt::Debug for Layouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layouter")
            .field("limiter", &self.limiter)
            .field("layouts", &self.layouts)
            .field("rendered", &self.rendered)
            .finish()
    }
}
