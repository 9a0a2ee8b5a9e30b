//! Viewsync Core Types and Definitions
//!
//! This crate provides the value types shared by every viewsync layer. It
//! includes:
//!
//! - **Identifiers**: String-interned identifiers ([`identifier::Id`])
//! - **Model**: Immutable model snapshots and computed views ([`model`] module)
//! - **Fingerprints**: Structural hashes used as cache keys ([`fingerprint`] module)
//! - **Geometry**: Basic geometric types ([`geometry`] module)
//! - **Layout**: Layout and rendering results ([`layout`] module)

pub mod fingerprint;
pub mod geometry;
pub mod identifier;
pub mod layout;
pub mod model;
