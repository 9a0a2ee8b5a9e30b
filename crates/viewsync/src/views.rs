//! Bulk layout of every view in the model.
//!
//! [`Views::layout_all_views`] answers from an aggregate slot when it holds
//! a result for the current epoch. Otherwise it joins the bulk computation
//! already running for that epoch, or starts one that first waits for any
//! older computation still in flight. At most one fresh bulk computation
//! runs at a time, and concurrent callers share its result.
//!
//! Inside a computation every view is laid out through the shared
//! [`Layouter`], so per-view work still runs concurrently under its limiter.
//! A view whose layout fails is logged and left out. A computation that fails
//! as a whole (the model build errors) clears the slot and yields an empty
//! batch, so the next call starts over instead of serving a poisoned result.

use std::{
    fmt,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
};

use futures::future::{BoxFuture, FutureExt, Shared, join_all};
use log::{debug, error, info};

use viewsync_core::{
    layout::{Diagram, LayoutResult, RenderedOutput},
    model::{Model, View},
};

use crate::{error::Result, layouter::Layouter, services::ModelBuilder};

/// Ordered layout results of every view, shared between callers.
pub type LayoutBatch = Arc<[Arc<LayoutResult>]>;

/// Ordered rendered outputs of every view, shared between callers.
pub type RenderedBatch = Arc<[RenderedOutput]>;

/// One cached aggregate result, tagged with the epoch it was computed in.
struct AggregateSlot<T> {
    entry: Mutex<Option<(u64, T)>>,
}

impl<T: Clone> AggregateSlot<T> {
    fn new() -> Self {
        Self {
            entry: Mutex::new(None),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<(u64, T)>> {
        self.entry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn get(&self, epoch: u64) -> Option<T> {
        match &*self.lock() {
            Some((stored, value)) if *stored == epoch => Some(value.clone()),
            _ => None,
        }
    }

    fn set(&self, epoch: u64, value: T) {
        *self.lock() = Some((epoch, value));
    }

    fn clear(&self) {
        *self.lock() = None;
    }
}

/// The bulk computation currently registered for an epoch.
struct Flight {
    epoch: u64,
    batch: Shared<BoxFuture<'static, LayoutBatch>>,
}

impl Flight {
    fn is_running(&self) -> bool {
        self.batch.peek().is_none()
    }
}

struct ViewsInner {
    builder: Arc<dyn ModelBuilder>,
    layouter: Arc<Layouter>,
    epoch: AtomicU64,
    layouts_slot: AggregateSlot<LayoutBatch>,
    rendered_slot: AggregateSlot<RenderedBatch>,
    flight: Mutex<Option<Flight>>,
}

impl ViewsInner {
    fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Returns the flight to await for `epoch`, registering a new one if no
    /// flight for that epoch is still running.
    fn join_or_start(self: &Arc<Self>, epoch: u64) -> Shared<BoxFuture<'static, LayoutBatch>> {
        let mut flight = self
            .flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let previous = match flight.as_ref() {
            Some(current) if current.is_running() && current.epoch == epoch => {
                debug!(epoch; "Joining in-flight bulk layout");
                return current.batch.clone();
            }
            Some(current) if current.is_running() => Some(current.batch.clone()),
            _ => None,
        };

        let inner = Arc::clone(self);
        let batch = async move {
            if let Some(previous) = previous {
                previous.await;
            }
            inner.recompute(epoch).await
        }
        .boxed()
        .shared();

        *flight = Some(Flight {
            epoch,
            batch: batch.clone(),
        });
        batch
    }

    async fn recompute(&self, epoch: u64) -> LayoutBatch {
        // A flight that finished while this one was queued may have filled
        // the slot already.
        if let Some(batch) = self.layouts_slot.get(epoch) {
            debug!(epoch; "Using layouts cached by previous bulk layout");
            return batch;
        }

        match self.compute_layouts().await {
            Ok(Some(batch)) => {
                self.layouts_slot.set(epoch, Arc::clone(&batch));
                batch
            }
            Ok(None) => Arc::from(Vec::new()),
            Err(err) => {
                error!(err:err; "Bulk layout failed");
                self.layouts_slot.clear();
                self.rendered_slot.clear();
                Arc::from(Vec::new())
            }
        }
    }

    /// Lays out every view of the current model, in model order.
    ///
    /// Returns `Ok(None)` when there is no model to lay out.
    async fn compute_layouts(&self) -> Result<Option<LayoutBatch>> {
        let Some(model) = self.builder.build_model().await? else {
            debug!("No model to lay out");
            return Ok(None);
        };
        let pruned = self.layouter.retain_model(&model);
        if pruned > 0 {
            debug!(pruned; "Dropped layouts of superseded views");
        }

        let layouter = &self.layouter;
        let tasks = model.views().map(|view| {
            let view = Arc::new(view.clone());
            async move {
                let view_id = view.id();
                match layouter.layout(view).await {
                    Ok(result) => Some(result),
                    Err(err) => {
                        error!(view_id:% = view_id, err:err; "Failed to layout view");
                        None
                    }
                }
            }
        });
        let results: Vec<_> = join_all(tasks).await.into_iter().flatten().collect();

        info!(
            views = model.views_count(),
            laid_out = results.len();
            "Views laid out"
        );
        Ok(Some(Arc::from(results)))
    }
}

/// Bulk, cached access to the layouts of every view.
///
/// Cloning yields another handle to the same caches.
#[derive(Clone)]
pub struct Views {
    inner: Arc<ViewsInner>,
}

impl Views {
    /// Creates the bulk service on top of a shared [`Layouter`].
    pub fn new(builder: Arc<dyn ModelBuilder>, layouter: Arc<Layouter>) -> Self {
        Self {
            inner: Arc::new(ViewsInner {
                builder,
                layouter,
                epoch: AtomicU64::new(0),
                layouts_slot: AggregateSlot::new(),
                rendered_slot: AggregateSlot::new(),
                flight: Mutex::new(None),
            }),
        }
    }

    /// Returns the current epoch. Aggregate results of older epochs are stale.
    pub fn epoch(&self) -> u64 {
        self.inner.epoch()
    }

    /// Marks every aggregate result stale.
    ///
    /// Call whenever the model may have changed. Per-view layouts survive;
    /// the next bulk call reuses those whose view is unchanged.
    pub fn invalidate(&self) -> u64 {
        let epoch = self.inner.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(epoch; "Aggregate results invalidated");
        epoch
    }

    /// Makes `model` the reference for cached per-view layouts.
    ///
    /// Bumps the epoch and drops per-view layouts of views `model` no longer
    /// contains.
    pub fn observe_model(&self, model: &Model) {
        self.invalidate();
        self.inner.layouter.retain_model(model);
    }

    /// Lays out every view of the current model.
    ///
    /// The result follows the model's view order. Views whose layout failed
    /// are missing from it; if the model itself could not be built the result
    /// is empty. Neither case is reported as an error.
    pub async fn layout_all_views(&self) -> LayoutBatch {
        let epoch = self.inner.epoch();
        if let Some(batch) = self.inner.layouts_slot.get(epoch) {
            debug!(epoch; "Using cached layouts");
            return batch;
        }

        self.inner.join_or_start(epoch).await
    }

    /// Lays out and renders every view of the current model.
    ///
    /// Views whose layout descriptions are textually identical share one
    /// render call. Views whose render fails are left out.
    pub async fn views_with_rendered_output(&self) -> RenderedBatch {
        let epoch = self.inner.epoch();
        if let Some(batch) = self.inner.rendered_slot.get(epoch) {
            debug!(epoch; "Using cached rendered outputs");
            return batch;
        }

        let layouts = self.layout_all_views().await;
        let layouter = &self.inner.layouter;
        let tasks = layouts.iter().map(|result| async move {
            let view_id = result.view().id();
            match layouter.render(result).await {
                Ok(text) => Some(RenderedOutput::new(
                    view_id,
                    result.layout_description(),
                    text,
                )),
                Err(err) => {
                    error!(view_id:% = view_id, err:err; "Failed to render view");
                    None
                }
            }
        });
        let outputs: Vec<_> = join_all(tasks).await.into_iter().flatten().collect();
        let batch: RenderedBatch = Arc::from(outputs);

        // Only a batch built on successfully cached layouts may be cached.
        if self.inner.layouts_slot.get(epoch).is_some() {
            self.inner.rendered_slot.set(epoch, Arc::clone(&batch));
        }
        batch
    }

    /// Returns the placed geometry of every view.
    pub async fn diagrams(&self) -> Vec<Diagram> {
        self.layout_all_views()
            .await
            .iter()
            .map(|result| result.diagram().clone())
            .collect()
    }

    /// Returns the views of the current model without laying them out.
    ///
    /// # Errors
    ///
    /// Propagates the model builder's error.
    pub async fn computed_views(&self) -> Result<Vec<View>> {
        let model = self.inner.builder.build_model().await?;
        Ok(model
            .map(|model| model.views().cloned().collect())
            .unwrap_or_default())
    }

    /// Returns the shared layouter.
    pub fn layouter(&self) -> &Arc<Layouter> {
        &self.inner.layouter
    }
}

impl fmt::Debug for Views {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Views")
            .field("epoch", &self.epoch())
            .field("layouter", &self.inner.layouter)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_slot_is_epoch_scoped() {
        let slot: AggregateSlot<u32> = AggregateSlot::new();
        assert_eq!(slot.get(0), None);

        slot.set(3, 42);
        assert_eq!(slot.get(3), Some(42));
        assert_eq!(slot.get(4), None);

        slot.clear();
        assert_eq!(slot.get(3), None);
    }
}
