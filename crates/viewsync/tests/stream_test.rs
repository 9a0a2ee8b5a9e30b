//! Integration tests for live view subscriptions and the change stream.

mod common;

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{Semaphore, mpsc},
    time,
};

use viewsync::{
    Workspace,
    config::{AppConfig, LayoutConfig, StreamConfig},
    identifier::Id,
    layout::LayoutResult,
    model::Model,
    notifier::ChangeNotifier,
    services::DurableStore,
    store::MemoryStore,
    stream::StreamPhase,
};

use common::{TestBuilder, TestEngine, model_with_views, view};

struct Fixture {
    builder: Arc<TestBuilder>,
    engine: Arc<TestEngine>,
    notifier: ChangeNotifier,
    store: Arc<MemoryStore>,
    workspace: Workspace,
}

fn fixture(model: Model, engine: TestEngine) -> Fixture {
    let builder = TestBuilder::new(model);
    let engine = Arc::new(engine);
    let notifier = ChangeNotifier::new();
    let store = Arc::new(MemoryStore::new());
    let config = AppConfig::new(
        LayoutConfig::default(),
        StreamConfig::default()
            .with_debounce(Duration::from_millis(200), Duration::from_secs(5)),
    );
    let workspace = Workspace::new(config, builder.clone(), engine.clone())
        .with_stream(Arc::new(notifier.clone()), store.clone());

    Fixture {
        builder,
        engine,
        notifier,
        store,
        workspace,
    }
}

fn collect(
    workspace: &Workspace,
    view_id: &str,
) -> (
    viewsync::subscription::ViewSubscription,
    mpsc::UnboundedReceiver<Arc<LayoutResult>>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let subscription = workspace
        .subscribe(Id::new(view_id), move |result| {
            let _ = tx.send(result);
        })
        .unwrap();
    (subscription, rx)
}

async fn settle() {
    time::sleep(Duration::from_millis(300)).await;
}

#[tokio::test(start_paused = true)]
async fn test_subscriber_receives_initial_layout() {
    let f = fixture(model_with_views(&["index", "context"]), TestEngine::new());
    assert!(f.workspace.current_model().is_none());

    let (_subscription, mut rx) = collect(&f.workspace, "index");
    let result = rx.recv().await.unwrap();

    assert_eq!(result.view().id(), Id::new("index"));
    assert_eq!(f.builder.calls(), 1);
    assert_eq!(f.engine.layout_calls(), 1);
    assert!(f.workspace.current_model().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_burst_of_notifications_fetches_once() {
    let f = fixture(model_with_views(&["index"]), TestEngine::new());
    let (_subscription, mut rx) = collect(&f.workspace, "index");
    rx.recv().await.unwrap();
    assert_eq!(f.builder.calls(), 1);

    f.notifier.notify();
    time::sleep(Duration::from_millis(50)).await;
    f.notifier.notify();
    time::sleep(Duration::from_millis(50)).await;
    f.notifier.notify();
    settle().await;

    assert_eq!(f.builder.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_equal_snapshots_emit_once() {
    let f = fixture(model_with_views(&["index"]), TestEngine::new());
    let (_subscription, mut rx) = collect(&f.workspace, "index");
    rx.recv().await.unwrap();

    f.builder.set_model(model_with_views(&["index"]));
    f.notifier.notify();
    settle().await;

    assert_eq!(f.builder.calls(), 2);
    assert!(rx.try_recv().is_err());

    f.builder
        .set_model(Model::new().with_view(view("index", "Index, renamed")));
    f.notifier.notify();
    settle().await;

    let result = rx.try_recv().unwrap();
    assert_eq!(result.diagram().title(), "Index, renamed");
}

#[tokio::test(start_paused = true)]
async fn test_change_to_other_view_does_not_emit() {
    let f = fixture(model_with_views(&["index", "context"]), TestEngine::new());
    let (_subscription, mut rx) = collect(&f.workspace, "index");
    rx.recv().await.unwrap();

    f.builder.set_model(
        model_with_views(&["index"]).with_view(view("context", "Context, renamed")),
    );
    f.notifier.notify();
    settle().await;

    assert!(rx.try_recv().is_err());
    assert_eq!(f.engine.layout_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_dispose_drops_in_flight_layout() {
    let gate = Arc::new(Semaphore::new(0));
    let f = fixture(
        model_with_views(&["index"]),
        TestEngine::new().with_gate(gate.clone()),
    );
    let (mut subscription, mut rx) = collect(&f.workspace, "index");
    settle().await;
    assert_eq!(f.engine.layout_calls(), 1);

    subscription.dispose();
    subscription.dispose();
    assert!(subscription.is_disposed());

    gate.add_permits(1);
    settle().await;

    assert!(rx.try_recv().is_err());
    // The abandoned layout still completed and was cached.
    assert_eq!(f.workspace.layouter().layouts().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_layout_failure_keeps_subscription_live() {
    let engine = TestEngine::new();
    engine.fail_view("index");
    let f = fixture(model_with_views(&["index"]), engine);
    let (_subscription, mut rx) = collect(&f.workspace, "index");
    settle().await;
    assert!(rx.try_recv().is_err());

    f.engine.heal_view("index");
    f.builder
        .set_model(Model::new().with_view(view("index", "Index, fixed")));
    f.notifier.notify();

    let result = rx.recv().await.unwrap();
    assert_eq!(result.diagram().title(), "Index, fixed");
}

#[tokio::test(start_paused = true)]
async fn test_dispose_of_last_subscriber_unregisters() {
    let f = fixture(model_with_views(&["index"]), TestEngine::new());
    let stream = f.workspace.stream().unwrap();
    // The workspace keeps one listener for invalidating bulk results.
    assert_eq!(f.notifier.listeners_count(), 1);

    let (first, _rx1) = collect(&f.workspace, "index");
    let (second, _rx2) = collect(&f.workspace, "index");
    assert_eq!(stream.subscribers(), 2);
    assert_eq!(f.notifier.listeners_count(), 2);

    drop(first);
    assert_eq!(stream.phase(), StreamPhase::Active);
    drop(second);
    assert_eq!(stream.phase(), StreamPhase::Idle);
    assert_eq!(f.notifier.listeners_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_delivered_model_refreshes_bulk_results() {
    let f = fixture(model_with_views(&["index"]), TestEngine::new());
    assert_eq!(f.workspace.layout_all_views().await.len(), 1);

    let (_subscription, mut rx) = collect(&f.workspace, "index");
    rx.recv().await.unwrap();

    f.builder.set_model(model_with_views(&["index", "context"]));
    f.notifier.notify();
    settle().await;

    assert_eq!(f.workspace.current_model().unwrap().views_count(), 2);
    assert_eq!(f.workspace.layout_all_views().await.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_persists_and_stops() {
    let mut f = fixture(model_with_views(&["index"]), TestEngine::new());
    let (_subscription, mut rx) = collect(&f.workspace, "index");
    rx.recv().await.unwrap();
    assert_eq!(f.store.get("model:last").await.unwrap(), None);

    f.workspace.shutdown().await;

    assert_eq!(f.workspace.stream().unwrap().phase(), StreamPhase::Stopped);
    assert_eq!(f.notifier.listeners_count(), 0);
    let persisted = f.store.get("model:last").await.unwrap().unwrap();
    let model: Model = serde_json::from_str(&persisted).unwrap();
    assert_eq!(model, model_with_views(&["index"]));
}

#[tokio::test]
async fn test_subscribe_requires_stream() {
    let workspace = Workspace::new(
        AppConfig::default(),
        TestBuilder::new(Model::new()),
        Arc::new(TestEngine::new()),
    );

    assert!(workspace.subscribe(Id::new("index"), |_| {}).is_err());
    assert!(workspace.current_model().is_none());
}
