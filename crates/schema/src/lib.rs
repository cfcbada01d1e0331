//! Schema initialization through the project's own ORM tooling.
//!
//! Every supported ORM is a [`SchemaInitializer`] strategy that detects
//! itself in a workspace, applies the schema (primary migration path with
//! a recognized-failure fallback) and regenerates its client. The
//! [`SchemaInitializerRegistry`] picks the strategy.

pub mod initializer;
pub mod registry;
pub mod runner;
pub mod strategies;
pub mod tables;

pub use initializer::{InitContext, SchemaInitializer};
pub use registry::{SchemaInitializerRegistry, SchemaOutcome};
