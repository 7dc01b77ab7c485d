//! Graph side of `ocelfk` schema derivation.
//!
//! # Overview
//!
//! [`derive::derive`] runs the whole pipeline over an [`ocelfk_core::log::EventLog`]:
//! catalog and scoping, materialization and classification (from
//! `ocelfk-core`), then the acyclic graph builder in [`build`], the cycle
//! checks in [`cycles`] and inclusion filtering in [`reach`]. The result,
//! a [`derive::DerivedSchema`], goes to an upload target through
//! [`publish::publish`].

pub mod build;
pub mod cycles;
pub mod derive;
pub mod publish;
pub mod reach;

pub use build::{Admission, AdmissionDecision, SchemaGraph, SchemaGraphBuilder, SchemaNode};
pub use cycles::{CycleWitness, would_close_cycle};
pub use derive::{DerivedSchema, derive};
pub use publish::{SchemaSink, TableCatalog, publish};
pub use reach::{Inclusion, included};
