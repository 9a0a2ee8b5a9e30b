//! Command-line argument definitions for the viewsync CLI.
//!
//! This module defines the [`Args`] structure parsed from the command line
//! using [`clap`]. A subcommand picks between a one-shot export and a watch
//! loop; configuration file selection and logging verbosity are global.

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for the viewsync tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Lay out every view of a model file once and write the results
    Export(ExportArgs),
    /// Follow a model file and rewrite each view's SVG when it changes
    Watch(WatchArgs),
}

#[derive(clap::Args, Debug)]
pub struct ExportArgs {
    /// Path to the model file (JSON)
    #[arg(help = "Path to the model file")]
    pub model: String,

    /// Directory receiving one file per view
    #[arg(short, long, default_value = "out")]
    pub output: String,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Svg)]
    pub format: Format,
}

#[derive(clap::Args, Debug)]
pub struct WatchArgs {
    /// Path to the model file (JSON)
    #[arg(help = "Path to the model file")]
    pub model: String,

    /// Directory receiving one SVG per view
    #[arg(short, long, default_value = "out")]
    pub output: String,

    /// How often the model file is checked for changes, in milliseconds
    #[arg(long, default_value_t = 500)]
    pub poll_ms: u64,
}

/// Format of exported view files.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    /// Rendered SVG documents
    Svg,
    /// Placed diagram geometry as JSON
    Json,
}

impl Format {
    /// File extension used for this format.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Svg => "svg",
            Self::Json => "json",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_export_with_defaults() {
        let args = Args::try_parse_from(["viewsync", "export", "model.json"]).unwrap();

        assert_eq!(args.log_level, "info");
        assert!(args.config.is_none());
        match args.command {
            Command::Export(export) => {
                assert_eq!(export.model, "model.json");
                assert_eq!(export.output, "out");
                assert_eq!(export.format, Format::Svg);
            }
            Command::Watch(_) => panic!("Expected export"),
        }
    }

    #[test]
    fn test_parse_watch_with_global_flags() {
        let args = Args::try_parse_from([
            "viewsync",
            "watch",
            "model.json",
            "-o",
            "previews",
            "--poll-ms",
            "100",
            "--log-level",
            "debug",
            "-c",
            "viewsync.toml",
        ])
        .unwrap();

        assert_eq!(args.log_level, "debug");
        assert_eq!(args.config.as_deref(), Some("viewsync.toml"));
        match args.command {
            Command::Watch(watch) => {
                assert_eq!(watch.output, "previews");
                assert_eq!(watch.poll_ms, 100);
            }
            Command::Export(_) => panic!("Expected watch"),
        }
    }

    #[test]
    fn test_format_extension() {
        assert_eq!(Format::Json.extension(), "json");
        assert_eq!(Format::Svg.extension(), "svg");
    }
}
