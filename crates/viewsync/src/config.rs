//! Configuration types for the viewsync pipeline.
//!
//! This module provides configuration structures that control how much
//! layout work may run at once, how the reference layout engine sizes its
//! grid, and how the model change stream debounces and persists snapshots.
//! All types implement [`serde::Deserialize`] for loading from TOML.
//!
//! # Overview
//!
//! - [`AppConfig`] - Top-level configuration combining layout and stream settings.
//! - [`LayoutConfig`] - Concurrency bound and grid geometry.
//! - [`StreamConfig`] - Debounce windows and the persistence key.
//!
//! # Example
//!
//! ```
//! # use viewsync::config::AppConfig;
//! let config = AppConfig::default();
//! assert_eq!(config.layout().concurrency(), 4);
//! assert_eq!(config.stream().debounce().as_millis(), 200);
//! ```

use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, ViewsyncError};

/// Top-level configuration combining layout and stream settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Layout configuration section.
    #[serde(default)]
    layout: LayoutConfig,

    /// Change stream configuration section.
    #[serde(default)]
    stream: StreamConfig,
}

impl AppConfig {
    /// Creates a new [`AppConfig`] from its sections.
    ///
    /// # Arguments
    ///
    /// * `layout` - Concurrency and grid geometry settings.
    /// * `stream` - Debounce and persistence settings.
    pub fn new(layout: LayoutConfig, stream: StreamConfig) -> Self {
        Self { layout, stream }
    }

    /// Returns the layout configuration.
    pub fn layout(&self) -> &LayoutConfig {
        &self.layout
    }

    /// Returns the stream configuration.
    pub fn stream(&self) -> &StreamConfig {
        &self.stream
    }

    /// Checks values that deserialize fine but make no sense.
    ///
    /// # Errors
    ///
    /// Returns [`ViewsyncError::Config`] when the concurrency bound is zero or
    /// a grid dimension is not positive.
    pub fn validate(&self) -> Result<()> {
        if self.layout.concurrency == 0 {
            return Err(ViewsyncError::Config(
                "layout.concurrency must be at least 1".to_string(),
            ));
        }
        if self.layout.cell_width <= 0.0 || self.layout.cell_height <= 0.0 {
            return Err(ViewsyncError::Config(
                "layout.cell_width and layout.cell_height must be positive".to_string(),
            ));
        }
        if self.stream.persist_key.is_empty() {
            return Err(ViewsyncError::Config(
                "stream.persist_key must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Concurrency bound and grid geometry.
#[derive(Debug, Clone, Deserialize)]
pub struct LayoutConfig {
    /// Maximum number of simultaneous layout engine calls.
    #[serde(default = "LayoutConfig::default_concurrency")]
    concurrency: usize,

    /// Width of one grid cell.
    #[serde(default = "LayoutConfig::default_cell_width")]
    cell_width: f32,

    /// Height of one grid cell.
    #[serde(default = "LayoutConfig::default_cell_height")]
    cell_height: f32,

    /// Gap between grid cells and around the canvas.
    #[serde(default = "LayoutConfig::default_spacing")]
    spacing: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            concurrency: Self::default_concurrency(),
            cell_width: Self::default_cell_width(),
            cell_height: Self::default_cell_height(),
            spacing: Self::default_spacing(),
        }
    }
}

impl LayoutConfig {
    fn default_concurrency() -> usize {
        4
    }

    fn default_cell_width() -> f32 {
        180.0
    }

    fn default_cell_height() -> f32 {
        90.0
    }

    fn default_spacing() -> f32 {
        40.0
    }

    /// Sets the concurrency bound.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Returns the concurrency bound, never less than one.
    pub fn concurrency(&self) -> usize {
        self.concurrency.max(1)
    }

    /// Returns the grid cell width.
    pub fn cell_width(&self) -> f32 {
        self.cell_width
    }

    /// Returns the grid cell height.
    pub fn cell_height(&self) -> f32 {
        self.cell_height
    }

    /// Returns the spacing between cells.
    pub fn spacing(&self) -> f32 {
        self.spacing
    }
}

/// Debounce windows and persistence key for the model change stream.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    /// Quiet period after a change notification before fetching.
    #[serde(default = "StreamConfig::default_debounce_ms")]
    debounce_ms: u64,

    /// Quiet period before a delivered model is written to the durable store.
    #[serde(default = "StreamConfig::default_persist_debounce_ms")]
    persist_debounce_ms: u64,

    /// Durable store key of the last model snapshot.
    #[serde(default = "StreamConfig::default_persist_key")]
    persist_key: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            debounce_ms: Self::default_debounce_ms(),
            persist_debounce_ms: Self::default_persist_debounce_ms(),
            persist_key: Self::default_persist_key(),
        }
    }
}

impl StreamConfig {
    fn default_debounce_ms() -> u64 {
        200
    }

    fn default_persist_debounce_ms() -> u64 {
        5000
    }

    fn default_persist_key() -> String {
        "model:last".to_string()
    }

    /// Sets both debounce windows.
    pub fn with_debounce(mut self, debounce: Duration, persist_debounce: Duration) -> Self {
        self.debounce_ms = debounce.as_millis() as u64;
        self.persist_debounce_ms = persist_debounce.as_millis() as u64;
        self
    }

    /// Returns the change notification debounce window.
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Returns the persistence debounce window.
    pub fn persist_debounce(&self) -> Duration {
        Duration::from_millis(self.persist_debounce_ms)
    }

    /// Returns the durable store key of the last snapshot.
    pub fn persist_key(&self) -> &str {
        &self.persist_key
    }
}
