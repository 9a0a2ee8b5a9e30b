//! One-shot export of every view of a model file.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};

use log::{debug, info, warn};

use viewsync::{
    Result, Workspace, config::AppConfig, engine::GridLayoutEngine, identifier::ViewId,
};

use crate::{
    args::{ExportArgs, Format},
    model_file::ModelFile,
};

/// Lay out every view and write one file per view into the output directory.
///
/// Returns the number of files written. Views whose layout fails are logged
/// and skipped; the export still succeeds for the rest.
///
/// # Errors
///
/// Returns an error if the model file cannot be loaded or an output file
/// cannot be written.
pub async fn run(args: &ExportArgs, config: AppConfig) -> Result<usize> {
    let started = Instant::now();
    info!(
        model_path = args.model,
        output_dir = args.output,
        format:? = args.format;
        "Exporting views"
    );

    let builder = Arc::new(ModelFile::new(&args.model));
    // Bulk operations only log a failed build, so surface it here first.
    let model = builder.load().await?;
    let engine = Arc::new(GridLayoutEngine::from_config(config.layout()));
    let workspace = Workspace::new(config, builder, engine);

    let output_dir = Path::new(&args.output);
    fs::create_dir_all(output_dir)?;

    let written = match args.format {
        Format::Svg => {
            let outputs = workspace.views_with_rendered_output().await;
            for output in outputs.iter() {
                write_view_file(output_dir, output.id(), args.format, output.rendered_text())?;
            }
            outputs.len()
        }
        Format::Json => {
            let layouts = workspace.layout_all_views().await;
            for result in layouts.iter() {
                let json = serde_json::to_string_pretty(result.diagram())?;
                write_view_file(output_dir, result.view().id(), args.format, &json)?;
            }
            layouts.len()
        }
    };

    if written < model.views_count() {
        warn!(
            expected = model.views_count(),
            written;
            "Some views could not be exported"
        );
    }
    info!(
        views = written,
        elapsed_ms = started.elapsed().as_millis() as u64;
        "Export done"
    );

    Ok(written)
}

/// Write `contents` to `<dir>/<view-id>.<ext>`.
pub(crate) fn write_view_file(
    dir: &Path,
    view_id: ViewId,
    format: Format,
    contents: &str,
) -> Result<PathBuf> {
    let path = dir.join(format!("{}.{}", file_stem(view_id), format.extension()));
    fs::write(&path, contents)?;
    debug!(path = path.display().to_string(); "View file written");
    Ok(path)
}

/// File name for a view id, keeping only characters safe in paths.
fn file_stem(view_id: ViewId) -> String {
    view_id
        .to_string()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
