//! Live per-view layouts.
//!
//! A [`ViewSubscription`] follows one view through the models delivered by a
//! [`ModelStream`](crate::stream::ModelStream). Models without the view, or
//! whose view equals the last one laid out, are skipped. Otherwise the view
//! is laid out through the shared [`Layouter`] and the result handed to the
//! callback. When a newer view arrives while a layout is still running, the
//! older result is dropped on arrival; the layout itself still completes and
//! fills the cache.
//!
//! A failed layout is logged and skipped. The subscription stays live.

use std::{
    fmt,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, ThreadId},
};

use log::{error, info, trace};
use tokio::{
    sync::{oneshot, watch},
    task::{JoinError, JoinHandle},
};

use viewsync_core::{
    identifier::ViewId,
    layout::LayoutResult,
    model::{Model, View},
};

use crate::{error::Result, layouter::Layouter, stream::ModelSubscription};

/// Receives each new layout of a subscribed view.
pub type ViewCallback = Box<dyn FnMut(Arc<LayoutResult>) + Send>;

type PendingLayout = JoinHandle<Result<Arc<LayoutResult>>>;

/// The callback together with the flag that gates it.
///
/// Delivery holds the callback lock for the duration of the call, so closing
/// the slot from another thread waits for a running callback to return.
struct CallbackSlot {
    live: AtomicBool,
    callback: Mutex<Option<ViewCallback>>,
    delivering_on: Mutex<Option<ThreadId>>,
}

impl CallbackSlot {
    fn new(callback: ViewCallback) -> Self {
        Self {
            live: AtomicBool::new(true),
            callback: Mutex::new(Some(callback)),
            delivering_on: Mutex::new(None),
        }
    }

    fn callback(&self) -> MutexGuard<'_, Option<ViewCallback>> {
        self.callback
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn delivering_on(&self) -> MutexGuard<'_, Option<ThreadId>> {
        self.delivering_on
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    fn deliver(&self, result: Arc<LayoutResult>) -> bool {
        let mut callback = self.callback();
        if !self.is_live() {
            return false;
        }
        let Some(callback) = callback.as_mut() else {
            return false;
        };

        *self.delivering_on() = Some(thread::current().id());
        callback(result);
        *self.delivering_on() = None;
        true
    }

    fn close(&self) {
        self.live.store(false, Ordering::SeqCst);

        // Closed from inside the callback: the lock is ours already, and the
        // cleared flag stops any later delivery.
        if *self.delivering_on() == Some(thread::current().id()) {
            return;
        }
        self.callback().take();
    }
}

/// Handle to a live per-view subscription.
///
/// Dropping the handle disposes it.
pub struct ViewSubscription {
    view_id: ViewId,
    slot: Arc<CallbackSlot>,
    lease: Option<ModelSubscription>,
    stop: Option<oneshot::Sender<()>>,
}

impl ViewSubscription {
    /// Starts following `view_id` on the stream `lease` is attached to.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn start(
        view_id: ViewId,
        lease: ModelSubscription,
        layouter: Arc<Layouter>,
        callback: impl FnMut(Arc<LayoutResult>) + Send + 'static,
    ) -> Self {
        info!(view_id:%; "Subscribed to view");

        let slot = Arc::new(CallbackSlot::new(Box::new(callback)));
        let (stop_tx, stop_rx) = oneshot::channel();
        tokio::spawn(follow_view(
            view_id,
            lease.watch(),
            layouter,
            Arc::clone(&slot),
            stop_rx,
        ));

        Self {
            view_id,
            slot,
            lease: Some(lease),
            stop: Some(stop_tx),
        }
    }

    /// Returns the followed view.
    pub fn view_id(&self) -> ViewId {
        self.view_id
    }

    /// Returns `true` once disposed.
    pub fn is_disposed(&self) -> bool {
        !self.slot.is_live()
    }

    /// Stops the subscription.
    ///
    /// No callback runs after this returns, including for a layout that was
    /// already in flight. Calling it again does nothing.
    pub fn dispose(&mut self) {
        if self.is_disposed() {
            return;
        }

        self.slot.close();
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        self.lease.take();
        info!(view_id:% = self.view_id; "Unsubscribed from view");
    }
}

impl Drop for ViewSubscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for ViewSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewSubscription")
            .field("view_id", &self.view_id)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Returns the view to lay out next, if `model` changes it.
///
/// A model lacking the view leaves the last seen view in place, so a view
/// that disappears and comes back unchanged is not laid out again.
fn next_view(model: &Model, view_id: ViewId, last: &mut Option<Arc<View>>) -> Option<Arc<View>> {
    let view = model.view(view_id)?;
    if last.as_deref() == Some(view) {
        trace!(view_id:%; "View unchanged");
        return None;
    }

    let view = Arc::new(view.clone());
    *last = Some(Arc::clone(&view));
    Some(view)
}

async fn join_pending(
    pending: &mut Option<PendingLayout>,
) -> std::result::Result<Result<Arc<LayoutResult>>, JoinError> {
    match pending {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

async fn follow_view(
    view_id: ViewId,
    mut models: watch::Receiver<Option<Arc<Model>>>,
    layouter: Arc<Layouter>,
    slot: Arc<CallbackSlot>,
    mut stop: oneshot::Receiver<()>,
) {
    let mut last_view: Option<Arc<View>> = None;
    let mut pending: Option<PendingLayout> = None;
    let mut model = models.borrow_and_update().clone();

    loop {
        if let Some(view) = model
            .take()
            .and_then(|model| next_view(&model, view_id, &mut last_view))
        {
            let layouter = Arc::clone(&layouter);
            // A replaced handle detaches; that layout still finishes.
            pending = Some(tokio::spawn(async move { layouter.layout(view).await }));
        }

        tokio::select! {
            biased;

            _ = &mut stop => break,
            changed = models.changed() => {
                if changed.is_err() {
                    break;
                }
                model = models.borrow_and_update().clone();
            }
            joined = join_pending(&mut pending) => {
                pending = None;
                match joined {
                    Ok(Ok(result)) => {
                        slot.deliver(result);
                    }
                    Ok(Err(err)) => error!(view_id:%, err:err; "Failed to layout subscribed view"),
                    Err(err) => error!(view_id:%, err:err; "Layout task of subscribed view failed"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use viewsync_core::{identifier::Id, model::ViewNode};

    use super::*;

    fn counting_slot(calls: &Arc<AtomicUsize>) -> CallbackSlot {
        let calls = Arc::clone(calls);
        CallbackSlot::new(Box::new(move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
        }))
    }

    fn result() -> Arc<LayoutResult> {
        use viewsync_core::layout::Diagram;

        let view = View::new(Id::new("index"), "Index");
        let diagram = Diagram::new(view.id(), view.title(), 0.0, 0.0, vec![], vec![]);
        Arc::new(LayoutResult::new(Arc::new(view), "digraph {}", diagram))
    }

    #[test]
    fn test_closed_slot_drops_results() {
        let calls = Arc::new(AtomicUsize::new(0));
        let slot = counting_slot(&calls);

        assert!(slot.deliver(result()));
        slot.close();
        slot.close();
        assert!(!slot.deliver(result()));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_next_view_skips_absent_and_unchanged() {
        let view_id = Id::new("index");
        let with_view = |title: &str| {
            Model::new().with_view(
                View::new(view_id, title).with_node(ViewNode::new(Id::new("a"), "A", "system")),
            )
        };
        let mut last = None;

        assert!(next_view(&Model::new(), view_id, &mut last).is_none());
        assert!(next_view(&with_view("v1"), view_id, &mut last).is_some());
        assert!(next_view(&with_view("v1"), view_id, &mut last).is_none());
        assert!(next_view(&Model::new(), view_id, &mut last).is_none());
        assert!(next_view(&with_view("v1"), view_id, &mut last).is_none());
        assert!(next_view(&with_view("v2"), view_id, &mut last).is_some());
    }
}
