//! Live preview: follow a model file and rewrite each view's SVG as it
//! changes.

use std::{collections::HashMap, path::PathBuf, sync::Arc, time::Duration};

use log::{debug, error, info, warn};
use tokio::{sync::mpsc, time};

use viewsync::{
    Result, Workspace,
    config::AppConfig,
    engine::GridLayoutEngine,
    identifier::ViewId,
    layout::LayoutResult,
    layouter::Layouter,
    model::Model,
    notifier::ChangeNotifier,
    store::FileStore,
    subscription::ViewSubscription,
};

use crate::{
    args::{Format, WatchArgs},
    export::write_view_file,
    model_file::ModelFile,
};

/// Follow the model file until Ctrl-C.
///
/// Every view gets a live subscription whose layouts are rendered and written
/// to `<output>/<view-id>.svg`. The file is polled for modification; a change
/// notifies the workspace's stream, which debounces, rebuilds, and pushes the
/// views that actually changed.
///
/// # Errors
///
/// Returns an error if the model file cannot be loaded at startup or the
/// output directory cannot be created.
pub async fn run(args: &WatchArgs, config: AppConfig) -> Result<()> {
    let builder = Arc::new(ModelFile::new(&args.model));
    let initial = builder.load().await?;
    let output_dir = PathBuf::from(&args.output);
    std::fs::create_dir_all(&output_dir)?;

    let notifier = ChangeNotifier::new();
    let store = Arc::new(FileStore::default_for_app("viewsync"));
    info!(
        model_path = args.model,
        output_dir = args.output,
        store_path = store.path().display().to_string();
        "Watching model file"
    );

    let engine = Arc::new(GridLayoutEngine::from_config(config.layout()));
    let mut workspace = Workspace::new(config, builder.clone(), engine)
        .with_stream(Arc::new(notifier.clone()), store);

    let mut watcher = ViewWatcher::new(output_dir);
    watcher.sync(&workspace, &initial)?;

    let mut last_modified = builder.modified().await.ok();
    let mut ticker = time::interval(Duration::from_millis(args.poll_ms.max(1)));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            signal = &mut ctrl_c => {
                if let Err(err) = signal {
                    warn!(err:err; "Failed to listen for Ctrl-C");
                }
                break;
            }
            _ = ticker.tick() => {
                let modified = builder.modified().await.ok();
                if modified == last_modified {
                    continue;
                }
                last_modified = modified;
                info!("Model file changed");
                notifier.notify();

                // Pick up added and removed views.
                match builder.load().await {
                    Ok(model) => watcher.sync(&workspace, &model)?,
                    Err(err) => warn!(err:err; "Model file is not readable yet"),
                }
            }
        }
    }

    info!(views = watcher.len(); "Stopping");
    drop(watcher);
    workspace.shutdown().await;
    Ok(())
}

/// One live subscription per view of the model.
struct ViewWatcher {
    output_dir: PathBuf,
    subscriptions: HashMap<ViewId, ViewSubscription>,
}

impl ViewWatcher {
    fn new(output_dir: PathBuf) -> Self {
        Self {
            output_dir,
            subscriptions: HashMap::new(),
        }
    }

    fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Subscribe to views new in `model` and dispose of the ones it lost.
    fn sync(&mut self, workspace: &Workspace, model: &Model) -> Result<()> {
        self.subscriptions
            .retain(|view_id, _| model.view(*view_id).is_some());

        for view in model.views() {
            let view_id = view.id();
            if self.subscriptions.contains_key(&view_id) {
                continue;
            }
            let subscription = workspace.subscribe(
                view_id,
                preview_writer(
                    Arc::clone(workspace.layouter()),
                    self.output_dir.clone(),
                    view_id,
                ),
            )?;
            debug!(view_id:%; "Following view");
            self.subscriptions.insert(view_id, subscription);
        }
        Ok(())
    }
}

/// Callback handing each delivered layout to the view's writer task.
///
/// One task per view renders and writes in delivery order, so an older
/// layout can never overwrite a newer preview. Layouts that pile up while a
/// render is running are skipped in favour of the newest. The task ends once
/// the callback is dropped.
///
/// Must be called within a Tokio runtime.
pub fn preview_writer(
    layouter: Arc<Layouter>,
    output_dir: PathBuf,
    view_id: ViewId,
) -> impl FnMut(Arc<LayoutResult>) + Send + 'static {
    let (tx, mut rx) = mpsc::unbounded_channel::<Arc<LayoutResult>>();

    tokio::spawn(async move {
        while let Some(mut result) = rx.recv().await {
            while let Ok(newer) = rx.try_recv() {
                result = newer;
            }

            let written = match layouter.render(&result).await {
                Ok(svg) => write_view_file(&output_dir, view_id, Format::Svg, &svg),
                Err(err) => Err(err),
            };
            match written {
                Ok(path) => info!(view_id:%, path = path.display().to_string(); "Preview updated"),
                Err(err) => error!(view_id:%, err:err; "Failed to update preview"),
            }
        }
        debug!(view_id:%; "Preview writer stopped");
    });

    move |result| {
        let _ = tx.send(result);
    }
}
