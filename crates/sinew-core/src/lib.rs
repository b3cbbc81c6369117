//! sinew-core: relationship schema and integrity engine.
//!
//! A declarative graph of typed relationships between content and user
//! entities, stored in heterogeneous low-level attribute encodings, resolved
//! on demand, and continuously audited and repaired for consistency.
//!
//! # Conventions
//!
//! - **Errors**: typed `thiserror` enums at the seams, `anyhow::Result` at
//!   the edges. Data-level inconsistencies are [`check::Issue`] values, not
//!   errors.
//! - **Logging**: `tracing` macros (`info!`, `warn!`, `debug!`); store-layer
//!   failures are logged and isolated, never propagated out of a pass.

pub mod audit;
pub mod check;
pub mod codec;
pub mod config;
pub mod error;
pub mod model;
pub mod render;
pub mod repair;
pub mod resolve;
pub mod schema;
pub mod store;
