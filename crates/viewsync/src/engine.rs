//! Reference layout engine.
//!
//! [`GridLayoutEngine`] places view nodes on a square grid and routes edges as
//! straight segments between node borders. It is deliberately simple; real
//! deployments plug their own [`LayoutEngine`](crate::services::LayoutEngine)
//! in its place.

mod description;
mod grid;
mod render;

pub use grid::GridLayoutEngine;
