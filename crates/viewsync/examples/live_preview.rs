//! Example: Bulk layout and a live view subscription
//!
//! This example builds a small model in memory, lays out every view once,
//! then follows one view while the model changes underneath it.

use std::sync::{Arc, Mutex};

use futures::future::{self, BoxFuture, FutureExt};
use viewsync::{
    Workspace,
    config::AppConfig,
    engine::GridLayoutEngine,
    identifier::Id,
    model::{Element, Model, Relation, View, ViewEdge, ViewNode},
    notifier::ChangeNotifier,
    services::ModelBuilder,
    store::MemoryStore,
};

/// Serves whatever model was last handed to it.
struct SharedModel(Mutex<Arc<Model>>);

impl ModelBuilder for SharedModel {
    fn build_model(&self) -> BoxFuture<'_, viewsync::Result<Option<Arc<Model>>>> {
        let model = self.0.lock().map(|model| Arc::clone(&*model)).ok();
        future::ready(Ok(model)).boxed()
    }
}

fn landscape(title: &str) -> Model {
    let client = Id::new("client");
    let server = Id::new("server");

    Model::new()
        .with_element(Element::new(client, "actor", "Web Client"))
        .with_element(Element::new(server, "system", "API Server"))
        .with_relation(Relation::new(Id::new("client-server"), client, server).with_title("calls"))
        .with_view(
            View::new(Id::new("index"), title)
                .with_node(ViewNode::new(client, "Web Client", "actor"))
                .with_node(ViewNode::new(server, "API Server", "system"))
                .with_edge(
                    ViewEdge::new(Id::new("client-server"), client, server).with_label("calls"),
                ),
        )
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let builder = Arc::new(SharedModel(Mutex::new(Arc::new(landscape("Landscape")))));
    let notifier = ChangeNotifier::new();

    let mut workspace = Workspace::new(
        AppConfig::default(),
        builder.clone(),
        Arc::new(GridLayoutEngine::default()),
    )
    .with_stream(Arc::new(notifier.clone()), Arc::new(MemoryStore::new()));

    println!("Laying out all views...\n");
    for result in workspace.layout_all_views().await.iter() {
        println!("{}", result.layout_description());
    }

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let mut subscription = workspace.subscribe(Id::new("index"), move |result| {
        let _ = tx.send(result.diagram().title().to_string());
    })?;

    println!("Initial layout of `index`: {:?}", rx.recv().await);

    if let Ok(mut model) = builder.0.lock() {
        *model = Arc::new(landscape("Landscape, revised"));
    }
    notifier.notify();
    println!("After the change: {:?}", rx.recv().await);

    subscription.dispose();
    workspace.shutdown().await;
    Ok(())
}
