//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use std::{
    collections::HashSet,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use futures::future::{self, BoxFuture, FutureExt};
use tokio::sync::Semaphore;

use viewsync::{
    Result, ViewsyncError,
    engine::GridLayoutEngine,
    identifier::Id,
    layout::{Diagram, LayoutResult},
    model::{Model, View, ViewEdge, ViewNode},
    services::{LayoutEngine, ModelBuilder},
};

/// A model builder whose model and failures are set by the test.
#[derive(Default)]
pub struct TestBuilder {
    model: Mutex<Option<Arc<Model>>>,
    failures: AtomicUsize,
    calls: AtomicUsize,
}

impl TestBuilder {
    pub fn new(model: Model) -> Arc<Self> {
        let builder = Self::default();
        builder.set_model(model);
        Arc::new(builder)
    }

    pub fn empty() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Replaces the model with a new snapshot.
    pub fn set_model(&self, model: Model) {
        *self.model.lock().unwrap() = Some(Arc::new(model));
    }

    /// Makes the next `count` builds fail.
    pub fn fail_next(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ModelBuilder for TestBuilder {
    fn build_model(&self) -> BoxFuture<'_, Result<Option<Arc<Model>>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        let result = if failing {
            Err(ViewsyncError::Model("injected build failure".to_string()))
        } else {
            Ok(self.model.lock().unwrap().clone())
        };
        future::ready(result).boxed()
    }
}

/// A grid engine instrumented with call counters, an optional delay, an
/// optional gate, and per-view injected failures.
pub struct TestEngine {
    inner: GridLayoutEngine,
    delay: Duration,
    gate: Option<Arc<Semaphore>>,
    failing: Mutex<HashSet<String>>,
    layout_calls: AtomicUsize,
    render_calls: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl TestEngine {
    pub fn new() -> Self {
        Self {
            inner: GridLayoutEngine::default(),
            delay: Duration::ZERO,
            gate: None,
            failing: Mutex::new(HashSet::new()),
            layout_calls: AtomicUsize::new(0),
            render_calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Every layout call sleeps for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Every layout call waits for a permit of `gate` before answering.
    pub fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn fail_view(&self, view_id: &str) {
        self.failing.lock().unwrap().insert(view_id.to_string());
    }

    pub fn heal_view(&self, view_id: &str) {
        self.failing.lock().unwrap().remove(view_id);
    }

    pub fn layout_calls(&self) -> usize {
        self.layout_calls.load(Ordering::SeqCst)
    }

    pub fn render_calls(&self) -> usize {
        self.render_calls.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl LayoutEngine for TestEngine {
    fn layout(&self, view: Arc<View>) -> BoxFuture<'_, Result<LayoutResult>> {
        async move {
            self.layout_calls.fetch_add(1, Ordering::SeqCst);
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            if let Some(gate) = &self.gate {
                gate.acquire().await.unwrap().forget();
            }
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.active.fetch_sub(1, Ordering::SeqCst);

            if self.failing.lock().unwrap().contains(&view.id().to_string()) {
                return Err(ViewsyncError::new_layout_error(view.id(), "injected failure"));
            }
            self.inner.layout(view).await
        }
        .boxed()
    }

    fn render<'a>(
        &'a self,
        layout_description: &'a str,
        diagram: &'a Diagram,
    ) -> BoxFuture<'a, Result<String>> {
        self.render_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.render(layout_description, diagram)
    }
}

/// A view with two connected nodes.
pub fn view(id: &str, title: &str) -> View {
    View::new(Id::new(id), title)
        .with_node(ViewNode::new(Id::new("api"), "API", "system"))
        .with_node(ViewNode::new(Id::new("db"), "Database", "database"))
        .with_edge(ViewEdge::new(Id::new("api-db"), Id::new("api"), Id::new("db")).with_label("reads"))
}

/// A model with one view per id, each titled after its id.
pub fn model_with_views(ids: &[&str]) -> Model {
    ids.iter()
        .fold(Model::new(), |model, id| model.with_view(view(id, id)))
}
