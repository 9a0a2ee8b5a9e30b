//! Viewsync - Layout caching and model-change distribution for diagram views.
//!
//! Computes layouts for the views of a model, keeps them in sync as the model
//! changes, and serves them both to bulk consumers (an exporter) and to live
//! per-view subscribers (an editor preview) with as little recomputation as
//! possible.
//!
//! The [`Workspace`] ties the pieces together: a shared
//! [`Layouter`](layouter::Layouter) bounds and memoizes engine calls, the
//! bulk [`Views`](views::Views) service caches whole-model results, and an
//! optional [`ModelStream`](stream::ModelStream) feeds live subscriptions.

pub mod cache;
pub mod config;
pub mod engine;
pub mod layouter;
pub mod limiter;
pub mod notifier;
pub mod services;
pub mod store;
pub mod stream;
pub mod subscription;
pub mod views;

mod error;

pub use viewsync_core::{fingerprint, geometry, identifier, layout, model};

pub use error::{Result, ViewsyncError};

use std::{fmt, sync::Arc};

use log::{debug, info};

use config::AppConfig;
use identifier::ViewId;
use layout::{Diagram, LayoutResult};
use layouter::Layouter;
use model::{Model, View};
use services::{ChangeChannel, DurableStore, LayoutEngine, ModelBuilder, Registration};
use stream::ModelStream;
use subscription::ViewSubscription;
use views::{LayoutBatch, RenderedBatch, Views};

/// Entry point for computing and following view layouts.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
///
/// use futures::future::{self, BoxFuture, FutureExt};
/// use viewsync::{
///     Workspace, config::AppConfig, engine::GridLayoutEngine, model::Model,
///     services::ModelBuilder,
/// };
///
/// struct Fixed(Arc<Model>);
///
/// impl ModelBuilder for Fixed {
///     fn build_model(&self) -> BoxFuture<'_, viewsync::Result<Option<Arc<Model>>>> {
///         future::ready(Ok(Some(Arc::clone(&self.0)))).boxed()
///     }
/// }
///
/// # async fn run() {
/// let workspace = Workspace::new(
///     AppConfig::default(),
///     Arc::new(Fixed(Arc::new(Model::new()))),
///     Arc::new(GridLayoutEngine::default()),
/// );
/// let layouts = workspace.layout_all_views().await;
/// println!("{} views laid out", layouts.len());
/// # }
/// ```
pub struct Workspace {
    config: AppConfig,
    builder: Arc<dyn ModelBuilder>,
    views: Views,
    stream: Option<ModelStream>,
    invalidation: Option<Registration>,
}

impl Workspace {
    /// Create a workspace without a change stream.
    ///
    /// Bulk operations work right away. Live subscriptions need
    /// [`Workspace::with_stream`].
    ///
    /// # Arguments
    ///
    /// * `config` - Concurrency bound and stream timing.
    /// * `builder` - Source of model snapshots.
    /// * `engine` - Computes and renders layouts.
    pub fn new(
        config: AppConfig,
        builder: Arc<dyn ModelBuilder>,
        engine: Arc<dyn LayoutEngine>,
    ) -> Self {
        let layouter = Arc::new(Layouter::new(engine, config.layout().concurrency()));
        info!(concurrency = layouter.limiter().limit(); "Workspace created");

        Self {
            views: Views::new(Arc::clone(&builder), layouter),
            builder,
            config,
            stream: None,
            invalidation: None,
        }
    }

    /// Attach a change stream fed by `channel`, persisting to `store`.
    ///
    /// Every change signal marks the bulk results stale, and every model the
    /// stream delivers prunes the per-view layout cache to that model.
    ///
    /// # Arguments
    ///
    /// * `channel` - Pushes "model changed" signals.
    /// * `store` - Keeps the last snapshot across restarts.
    pub fn with_stream(
        mut self,
        channel: Arc<dyn ChangeChannel>,
        store: Arc<dyn DurableStore>,
    ) -> Self {
        let views = self.views.clone();
        self.invalidation = Some(channel.on_did_change(Box::new(move || {
            views.invalidate();
        })));

        let stream = ModelStream::new(
            Arc::clone(&self.builder),
            channel,
            store,
            self.config.stream().clone(),
        );
        let views = self.views.clone();
        stream.on_model(move |model| views.observe_model(model));
        self.stream = Some(stream);
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Returns the shared layouter.
    pub fn layouter(&self) -> &Arc<Layouter> {
        self.views.layouter()
    }

    /// Returns the attached change stream, if any.
    pub fn stream(&self) -> Option<&ModelStream> {
        self.stream.as_ref()
    }

    /// Lay out every view of the current model.
    ///
    /// See [`Views::layout_all_views`].
    pub async fn layout_all_views(&self) -> LayoutBatch {
        self.views.layout_all_views().await
    }

    /// Lay out and render every view of the current model.
    ///
    /// See [`Views::views_with_rendered_output`].
    pub async fn views_with_rendered_output(&self) -> RenderedBatch {
        self.views.views_with_rendered_output().await
    }

    /// Returns the placed geometry of every view.
    pub async fn diagrams(&self) -> Vec<Diagram> {
        self.views.diagrams().await
    }

    /// Returns the views of the current model, before layout.
    ///
    /// # Errors
    ///
    /// Propagates the model builder's error.
    pub async fn computed_views(&self) -> Result<Vec<View>> {
        self.views.computed_views().await
    }

    /// Follow one view, calling `callback` with each new layout.
    ///
    /// Must be called within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ViewsyncError::Config`] if no stream is attached.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use viewsync::{Workspace, identifier::Id};
    /// # fn run(workspace: &Workspace) -> viewsync::Result<()> {
    /// let mut subscription = workspace.subscribe(Id::new("index"), |result| {
    ///     println!("{}", result.layout_description());
    /// })?;
    ///
    /// subscription.dispose();
    /// # Ok(())
    /// # }
    /// ```
    pub fn subscribe(
        &self,
        view_id: ViewId,
        callback: impl FnMut(Arc<LayoutResult>) + Send + 'static,
    ) -> Result<ViewSubscription> {
        let stream = self.stream.as_ref().ok_or_else(|| {
            ViewsyncError::Config("workspace has no model stream attached".to_string())
        })?;

        Ok(ViewSubscription::start(
            view_id,
            stream.subscribe(),
            Arc::clone(self.views.layouter()),
            callback,
        ))
    }

    /// Returns the latest model delivered by the stream, without waiting.
    pub fn current_model(&self) -> Option<Arc<Model>> {
        self.stream.as_ref().and_then(ModelStream::current)
    }

    /// Mark every bulk result stale.
    pub fn invalidate(&self) {
        self.views.invalidate();
    }

    /// Stop the stream and stop reacting to change signals.
    ///
    /// A pending snapshot is written before this returns. Bulk operations
    /// keep working afterwards.
    pub async fn shutdown(&mut self) {
        if let Some(mut invalidation) = self.invalidation.take() {
            invalidation.dispose();
        }
        if let Some(stream) = &self.stream {
            stream.shutdown().await;
        }
        debug!("Workspace shut down");
    }
}

impl fmt::Debug for Workspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workspace")
            .field("views", &self.views)
            .field("stream", &self.stream)
            .finish()
    }
}
