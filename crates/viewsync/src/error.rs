//! Error types for viewsync operations.
//!
//! This module provides the main error type [`ViewsyncError`] shared by the
//! pipeline and by the collaborator traits in [`crate::services`].

use std::io;

use thiserror::Error;

use viewsync_core::identifier::ViewId;

/// A type alias for `Result<T, ViewsyncError>`.
pub type Result<T> = std::result::Result<T, ViewsyncError>;

/// The main error type for viewsync operations.
///
/// None of these errors reach consumers of the bulk or per-view APIs; those
/// log and degrade instead. They surface from the collaborator traits and
/// from the stores and configuration helpers.
#[derive(Debug, Error)]
pub enum ViewsyncError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Layout error in view `{view}`: {message}")]
    Layout { view: ViewId, message: String },

    #[error("Render error: {0}")]
    Render(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ViewsyncError {
    /// Create a new `Layout` error for the given view.
    pub fn new_layout_error(view: ViewId, message: impl Into<String>) -> Self {
        Self::Layout {
            view,
            message: message.into(),
        }
    }
}
