//! CLI logic for the viewsync tool.
//!
//! `export` lays out every view of a JSON model file once and writes one file
//! per view. `watch` keeps each view's SVG current while the file is edited.

pub mod error_adapter;

mod args;
mod config;
mod export;
mod model_file;
mod watch;

pub use args::{Args, Command, ExportArgs, Format, WatchArgs};
pub use model_file::ModelFile;
pub use watch::preview_writer;

use log::debug;

use viewsync::ViewsyncError;

/// Run the viewsync CLI application
///
/// Loads the configuration, starts a Tokio runtime, and runs the chosen
/// subcommand on it.
///
/// # Errors
///
/// Returns `ViewsyncError` for:
/// - Configuration loading errors
/// - Model file I/O and parsing errors
/// - Output file write errors
pub fn run(args: &Args) -> Result<(), ViewsyncError> {
    let app_config = config::load_config(args.config.as_ref())?;
    debug!(config:? = app_config; "Configuration loaded");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    match &args.command {
        Command::Export(export_args) => {
            runtime.block_on(export::run(export_args, app_config))?;
            Ok(())
        }
        Command::Watch(watch_args) => runtime.block_on(watch::run(watch_args, app_config)),
    }
}
