//! Pure domain logic for database provisioning.
//!
//! Everything in this crate is deterministic and free of network access:
//! the data model shared by every other crate, static requirement analysis
//! of a project's files, `.env` merging, the per-run rollback plan, and
//! the narrow execution-context trait that strategies and the orchestrator
//! use to touch a project workspace.

pub mod analysis;
pub mod context;
pub mod credentials;
pub mod drafting;
pub mod env_file;
pub mod error;
pub mod naming;
pub mod requirements;
pub mod results;
pub mod rollback;
pub mod types;
