//! roadwatch-core library.
//!
//! Issue records, the local and realtime issue stores, marker
//! reconciliation and the interaction controller that ties them together.
//!
//! # Conventions
//!
//! - **Errors**: typed `thiserror` enums in library code, each mapping to an
//!   [`error::ErrorCode`]; `anyhow::Result` for config loading and binaries.
//! - **Logging**: Use `tracing` macros (`info!` for writes, `warn!` for
//!   recoverable failures, `debug!` for reconciliation steps).

pub mod config;
pub mod controller;
pub mod error;
pub mod lock;
pub mod map;
pub mod model;
pub mod photo;
pub mod picker;
pub mod reconcile;
pub mod store;
