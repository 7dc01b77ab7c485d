//! ocelfk-core library.
//!
//! Log model, type catalog, name normalization, lead-type scoping,
//! cardinality classification and table materialization. The graph side of
//! schema derivation lives in `ocelfk-graph`.
//!
//! # Conventions
//!
//! - **Errors**: derivation stages return [`error::DeriveError`]; file and
//!   config boundaries use `anyhow::Result` with context.
//! - **Logging**: use `tracing` macros (`info!`, `warn!`, `debug!`); stage
//!   entry points carry `#[instrument]`.

pub mod cardinality;
pub mod catalog;
pub mod config;
pub mod error;
pub mod log;
pub mod materialize;
pub mod normalize;
pub mod relation;
pub mod scope;
pub mod sql;
pub mod table;

pub use error::{DeriveError, ErrorCode};
