//! Error adapter for converting ViewsyncError to miette diagnostics.
//!
//! This module provides the bridge between the library's standard error type
//! and miette's rich diagnostic formatting used in the CLI.

use std::fmt;

use miette::{Diagnostic as MietteDiagnostic, LabeledSpan};

use viewsync::ViewsyncError;

/// Adapter presenting a [`ViewsyncError`] as a miette diagnostic.
pub struct ErrorAdapter<'a>(pub &'a ViewsyncError);

impl fmt::Debug for ErrorAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for ErrorAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for ErrorAdapter<'_> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl MietteDiagnostic for ErrorAdapter<'_> {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let code = match &self.0 {
            ViewsyncError::Io(_) => "viewsync::io",
            ViewsyncError::Model(_) => "viewsync::model",
            ViewsyncError::Layout { .. } => "viewsync::layout",
            ViewsyncError::Render(_) => "viewsync::render",
            ViewsyncError::Store(_) => "viewsync::store",
            ViewsyncError::Serialization(_) => "viewsync::serialization",
            ViewsyncError::Config(_) => "viewsync::config",
        };
        Some(Box::new(code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let help = match &self.0 {
            ViewsyncError::Model(_) => "the model file must hold a JSON model with a `views` map keyed by view id",
            ViewsyncError::Config(_) => "check the TOML file passed with --config",
            _ => return None,
        };
        Some(Box::new(help))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        None
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        None
    }
}
