//! Collaborator traits.
//!
//! The pipeline never builds models, lays out views, or talks to storage on
//! its own. It drives the implementations of these traits, which are shared
//! as `Arc<dyn Trait>` between the bulk path, the change stream, and every
//! live subscription.
//!
//! Methods return [`BoxFuture`] so the traits stay object safe. A
//! synchronous implementation returns [`futures::future::ready`] boxed.

use std::{fmt, sync::Arc};

use futures::future::BoxFuture;

use viewsync_core::{
    layout::{Diagram, LayoutResult},
    model::{Model, View},
};

use crate::error::Result;

/// Produces the current model snapshot.
pub trait ModelBuilder: Send + Sync {
    /// Builds (or returns a cached build of) the current model.
    ///
    /// `Ok(None)` means there is nothing to build yet, for example an empty
    /// workspace. Implementations should return the same [`Arc`] for as long
    /// as the underlying sources are unchanged.
    fn build_model(&self) -> BoxFuture<'_, Result<Option<Arc<Model>>>>;
}

/// Lays out views and renders layout descriptions.
///
/// Treated as a slow, fallible black box.
pub trait LayoutEngine: Send + Sync {
    /// Computes the layout of one view.
    fn layout(&self, view: Arc<View>) -> BoxFuture<'_, Result<LayoutResult>>;

    /// Renders a layout description to its final presentation text.
    ///
    /// The output must depend only on `layout_description`; `diagram` is
    /// passed along for engines that can use the placed geometry directly.
    fn render<'a>(
        &'a self,
        layout_description: &'a str,
        diagram: &'a Diagram,
    ) -> BoxFuture<'a, Result<String>>;
}

/// Callback invoked for every "something changed" signal.
pub type ChangeListener = Box<dyn Fn() + Send + Sync>;

/// A push channel of payload-less change signals.
pub trait ChangeChannel: Send + Sync {
    /// Registers `listener` until the returned [`Registration`] is disposed.
    fn on_did_change(&self, listener: ChangeListener) -> Registration;
}

/// Key/value storage that outlives the process.
pub trait DurableStore: Send + Sync {
    /// Reads the value stored under `key`.
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set<'a>(&'a self, key: &'a str, value: String) -> BoxFuture<'a, Result<()>>;
}

/// Handle to a listener registered with a [`ChangeChannel`].
///
/// Disposing it, explicitly or by dropping, unregisters the listener.
/// Disposing twice is a no-op.
pub struct Registration {
    on_dispose: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Registration {
    /// Creates a registration that runs `on_dispose` once when disposed.
    pub fn new(on_dispose: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            on_dispose: Some(Box::new(on_dispose)),
        }
    }

    /// Unregisters the listener.
    pub fn dispose(&mut self) {
        if let Some(on_dispose) = self.on_dispose.take() {
            on_dispose();
        }
    }

    /// Returns `true` once the registration has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.on_dispose.is_none()
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
