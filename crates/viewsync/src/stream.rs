//! The model change stream.
//!
//! [`ModelStream`] turns payload-less change signals from a [`ChangeChannel`]
//! into model snapshots fetched from a [`ModelBuilder`]:
//!
//! ```text
//!            first subscribe           signal            quiet period
//!   Idle ─────────────────────▶ Active ──────▶ Debouncing ──────────▶ Fetching
//!    ▲                            ▲  ▲            │ signal (restart)       │
//!    │     last unsubscribe       │  └────────────┘                        │
//!    └────────────────────────────┴────────────────────────────────────────┘
//!                                   shutdown() from any state ─▶ Stopped
//! ```
//!
//! Subscribing is itself treated as a change, so a fresh subscriber sees a
//! fetched model after one quiet period. A fetch that fails is logged and
//! ignored; the stream stays alive for the next signal. A fetched model equal
//! to the last delivered one is not delivered again.
//!
//! Every delivered model is also written to a [`DurableStore`] after its own,
//! longer quiet period, unless it equals the last written snapshot. When a
//! cycle starts without a known model, the stored snapshot is delivered first
//! so consumers have something to show before the first fetch completes.

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use log::{debug, error, info, trace, warn};
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
    time,
};

use viewsync_core::model::Model;

use crate::{
    config::StreamConfig,
    services::{ChangeChannel, DurableStore, ModelBuilder, Registration},
};

/// Lifecycle state of a [`ModelStream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    /// No subscribers; not registered with the change channel.
    Idle,
    /// Registered and waiting for a change signal.
    Active,
    /// A signal arrived; waiting for the quiet period to pass.
    Debouncing,
    /// Requesting a fresh model from the builder.
    Fetching,
    /// Shut down; never leaves this state.
    Stopped,
}

/// Callback run for every model the stream delivers.
pub type ModelObserver = Box<dyn Fn(&Arc<Model>) + Send + Sync>;

type Snapshot = Option<Arc<Model>>;

struct StreamState {
    phase: StreamPhase,
    subscribers: usize,
    registration: Option<Registration>,
    driver: Option<JoinHandle<()>>,
    persister: Option<JoinHandle<()>>,
    persist_rx: Option<mpsc::UnboundedReceiver<PersistCommand>>,
}

struct StreamInner {
    builder: Arc<dyn ModelBuilder>,
    channel: Arc<dyn ChangeChannel>,
    store: Arc<dyn DurableStore>,
    config: StreamConfig,
    latest: watch::Sender<Snapshot>,
    stopped: watch::Sender<bool>,
    observers: Mutex<Vec<ModelObserver>>,
    persist_tx: mpsc::UnboundedSender<PersistCommand>,
    state: Mutex<StreamState>,
}

impl StreamInner {
    fn state(&self) -> MutexGuard<'_, StreamState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Records driver progress. Idle and Stopped are owned by attach/release.
    fn set_phase(&self, phase: StreamPhase) {
        let mut state = self.state();
        if !matches!(state.phase, StreamPhase::Idle | StreamPhase::Stopped) {
            state.phase = phase;
        }
    }

    /// Counts a new subscriber, starting the stream on the first one.
    ///
    /// Returns `false` if the stream is stopped and nothing was attached.
    fn attach(self: &Arc<Self>) -> bool {
        let mut state = self.state();
        if state.phase == StreamPhase::Stopped {
            warn!("Subscribing to a stopped model stream");
            return false;
        }

        state.subscribers += 1;
        if state.subscribers > 1 {
            return true;
        }

        // Only the 0 -> 1 transition registers, and release() takes the
        // registration back on 1 -> 0.
        assert!(
            state.registration.is_none(),
            "model stream already started"
        );

        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let listener_tx = signal_tx.clone();
        state.registration = Some(self.channel.on_did_change(Box::new(move || {
            let _ = listener_tx.send(());
        })));
        // Subscribing counts as a change.
        let _ = signal_tx.send(());

        state.driver = Some(tokio::spawn(drive(Arc::clone(self), signal_rx)));
        if state.persister.is_none() {
            if let Some(persist_rx) = state.persist_rx.take() {
                let persister = Persister {
                    store: Arc::clone(&self.store),
                    key: self.config.persist_key().to_string(),
                    debounce: self.config.persist_debounce(),
                    last_persisted: None,
                };
                state.persister = Some(tokio::spawn(persister.run(persist_rx)));
            }
        }
        state.phase = StreamPhase::Active;

        info!("Model stream subscribed to change channel");
        true
    }

    /// Drops a subscriber, returning to Idle after the last one.
    fn release(&self) {
        let mut state = self.state();
        if state.subscribers == 0 {
            return;
        }
        state.subscribers -= 1;
        if state.subscribers > 0 || state.phase == StreamPhase::Stopped {
            return;
        }

        if let Some(mut registration) = state.registration.take() {
            registration.dispose();
        }
        if let Some(driver) = state.driver.take() {
            driver.abort();
        }
        state.phase = StreamPhase::Idle;

        info!("Model stream unsubscribed from change channel");
    }

    fn current(&self) -> Snapshot {
        self.latest.borrow().clone()
    }

    /// Publishes `model` unless it equals the current one.
    fn deliver(&self, model: &Arc<Model>) -> bool {
        if self.latest.borrow().as_deref() == Some(model.as_ref()) {
            debug!("Fetched model unchanged, skipping delivery");
            return false;
        }

        {
            let observers = self
                .observers
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            for observer in observers.iter() {
                observer(model);
            }
        }
        self.latest.send_replace(Some(Arc::clone(model)));
        true
    }

    async fn restore_snapshot(&self) {
        let key = self.config.persist_key();
        let json = match self.store.get(key).await {
            Ok(Some(json)) => json,
            Ok(None) => {
                debug!(key; "No persisted model snapshot");
                return;
            }
            Err(err) => {
                error!(key, err:err; "Failed to read persisted model snapshot");
                return;
            }
        };

        match serde_json::from_str::<Model>(&json) {
            Ok(model) => {
                let model = Arc::new(model);
                info!(key, views = model.views_count(); "Restored persisted model snapshot");
                let _ = self
                    .persist_tx
                    .send(PersistCommand::Restored(Arc::clone(&model)));
                self.deliver(&model);
            }
            Err(err) => error!(key, err:err; "Failed to decode persisted model snapshot"),
        }
    }

    async fn fetch(&self) {
        debug!("Fetching model");
        match self.builder.build_model().await {
            Ok(Some(model)) => {
                debug!(
                    elements = model.elements_count(),
                    relations = model.relations_count(),
                    views = model.views_count();
                    "Fetched model"
                );
                if self.deliver(&model) {
                    let _ = self.persist_tx.send(PersistCommand::Save(model));
                }
            }
            Ok(None) => debug!("Model builder returned no model"),
            Err(err) => error!(err:err; "Failed to fetch model"),
        }
    }
}

/// Driver task of one Active cycle.
async fn drive(inner: Arc<StreamInner>, mut signals: mpsc::UnboundedReceiver<()>) {
    if inner.current().is_none() {
        inner.restore_snapshot().await;
    }

    let debounce = inner.config.debounce();
    while signals.recv().await.is_some() {
        inner.set_phase(StreamPhase::Debouncing);
        loop {
            tokio::select! {
                signal = signals.recv() => {
                    if signal.is_none() {
                        return;
                    }
                    trace!("Change signal restarted quiet period");
                }
                _ = time::sleep(debounce) => break,
            }
        }

        inner.set_phase(StreamPhase::Fetching);
        inner.fetch().await;
        inner.set_phase(StreamPhase::Active);
    }
}

enum PersistCommand {
    /// Write after the quiet period unless equal to the last written model.
    Save(Arc<Model>),
    /// Remember a snapshot read back from the store without writing it.
    Restored(Arc<Model>),
    /// Write anything pending now, then acknowledge.
    Flush(oneshot::Sender<()>),
}

/// Debounced writer of model snapshots.
struct Persister {
    store: Arc<dyn DurableStore>,
    key: String,
    debounce: Duration,
    last_persisted: Option<Arc<Model>>,
}

impl Persister {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<PersistCommand>) {
        let mut pending: Option<Arc<Model>> = None;

        loop {
            let command = if pending.is_some() {
                tokio::select! {
                    command = commands.recv() => command,
                    _ = time::sleep(self.debounce) => {
                        if let Some(model) = pending.take() {
                            self.persist(model).await;
                        }
                        continue;
                    }
                }
            } else {
                commands.recv().await
            };

            match command {
                Some(PersistCommand::Save(model)) => pending = Some(model),
                Some(PersistCommand::Restored(model)) => self.last_persisted = Some(model),
                Some(PersistCommand::Flush(done)) => {
                    if let Some(model) = pending.take() {
                        self.persist(model).await;
                    }
                    let _ = done.send(());
                }
                None => {
                    if let Some(model) = pending.take() {
                        self.persist(model).await;
                    }
                    return;
                }
            }
        }
    }

    async fn persist(&mut self, model: Arc<Model>) {
        if self.last_persisted.as_deref() == Some(model.as_ref()) {
            debug!(key = self.key.as_str(); "Model unchanged since last write, skipping persistence");
            return;
        }

        let json = match serde_json::to_string(model.as_ref()) {
            Ok(json) => json,
            Err(err) => {
                error!(err:err; "Failed to encode model snapshot");
                return;
            }
        };

        match self.store.set(&self.key, json).await {
            Ok(()) => {
                debug!(key = self.key.as_str(); "Persisted model snapshot");
                self.last_persisted = Some(model);
            }
            Err(err) => error!(key = self.key.as_str(), err:err; "Failed to persist model snapshot"),
        }
    }
}

/// A debounced, deduplicated stream of model snapshots.
///
/// Cloning yields another handle to the same stream. The stream spawns Tokio
/// tasks when its first subscriber attaches, so [`ModelStream::subscribe`]
/// must be called within a Tokio runtime.
#[derive(Clone)]
pub struct ModelStream {
    inner: Arc<StreamInner>,
}

impl ModelStream {
    /// Creates an idle stream.
    pub fn new(
        builder: Arc<dyn ModelBuilder>,
        channel: Arc<dyn ChangeChannel>,
        store: Arc<dyn DurableStore>,
        config: StreamConfig,
    ) -> Self {
        let (persist_tx, persist_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(StreamInner {
                builder,
                channel,
                store,
                config,
                latest: watch::Sender::new(None),
                stopped: watch::Sender::new(false),
                observers: Mutex::new(Vec::new()),
                persist_tx,
                state: Mutex::new(StreamState {
                    phase: StreamPhase::Idle,
                    subscribers: 0,
                    registration: None,
                    driver: None,
                    persister: None,
                    persist_rx: Some(persist_rx),
                }),
            }),
        }
    }

    /// Attaches a subscriber, activating the stream if it was idle.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime while the stream is idle.
    pub fn subscribe(&self) -> ModelSubscription {
        let receiver = self.inner.latest.subscribe();
        let attached = self.inner.attach();
        ModelSubscription {
            inner: Arc::clone(&self.inner),
            receiver,
            attached,
        }
    }

    /// Registers `observer` to run for every delivered model, before
    /// subscribers see it.
    pub fn on_model(&self, observer: impl Fn(&Arc<Model>) + Send + Sync + 'static) {
        self.inner
            .observers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(Box::new(observer));
    }

    /// Returns the latest delivered model, without waiting.
    pub fn current(&self) -> Option<Arc<Model>> {
        self.inner.current()
    }

    /// Returns the current lifecycle state.
    pub fn phase(&self) -> StreamPhase {
        self.inner.state().phase
    }

    /// Returns the number of attached subscribers.
    pub fn subscribers(&self) -> usize {
        self.inner.state().subscribers
    }

    /// Resolves once the stream has been shut down.
    pub async fn stopped(&self) {
        let mut stopped = self.inner.stopped.subscribe();
        let _ = stopped.wait_for(|stopped| *stopped).await;
    }

    /// Stops the stream for good.
    ///
    /// Unregisters from the change channel, cancels any pending fetch, and
    /// writes a pending snapshot before returning.
    pub async fn shutdown(&self) {
        let (registration, driver, persister) = {
            let mut state = self.inner.state();
            if state.phase == StreamPhase::Stopped {
                return;
            }
            state.phase = StreamPhase::Stopped;
            (
                state.registration.take(),
                state.driver.take(),
                state.persister.take(),
            )
        };

        if let Some(mut registration) = registration {
            registration.dispose();
        }
        if let Some(driver) = driver {
            driver.abort();
        }
        if let Some(persister) = persister {
            let (done_tx, done_rx) = oneshot::channel();
            if self.inner.persist_tx.send(PersistCommand::Flush(done_tx)).is_ok() {
                let _ = done_rx.await;
            }
            persister.abort();
        }

        self.inner.stopped.send_replace(true);
        info!("Model stream stopped");
    }
}

impl fmt::Debug for ModelStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state();
        f.debug_struct("ModelStream")
            .field("phase", &state.phase)
            .field("subscribers", &state.subscribers)
            .field("has_model", &self.inner.latest.borrow().is_some())
            .finish()
    }
}

/// A subscriber's lease on a [`ModelStream`].
///
/// Dropping it detaches the subscriber; the last one to go returns the
/// stream to Idle.
pub struct ModelSubscription {
    inner: Arc<StreamInner>,
    receiver: watch::Receiver<Snapshot>,
    attached: bool,
}

impl ModelSubscription {
    /// Returns the latest delivered model and marks it seen.
    pub fn latest(&mut self) -> Option<Arc<Model>> {
        self.receiver.borrow_and_update().clone()
    }

    /// Waits for a model not yet seen by this subscription.
    ///
    /// Returns `None` once the stream can no longer deliver.
    pub async fn changed(&mut self) -> Option<Arc<Model>> {
        loop {
            self.receiver.changed().await.ok()?;
            if let Some(model) = self.receiver.borrow_and_update().clone() {
                return Some(model);
            }
        }
    }

    /// Returns an independent receiver of delivered models.
    ///
    /// The receiver does not count as a subscriber; it only sees models
    /// while this lease or another keeps the stream active.
    pub fn watch(&self) -> watch::Receiver<Option<Arc<Model>>> {
        self.receiver.clone()
    }

    /// Returns a handle to the stream this lease is attached to.
    pub fn stream(&self) -> ModelStream {
        ModelStream {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Drop for ModelSubscription {
    fn drop(&mut self) {
        if self.attached {
            self.attached = false;
            self.inner.release();
        }
    }
}

impl fmt::Debug for ModelSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSubscription")
            .field("attached", &self.attached)
            .finish()
    }
}
