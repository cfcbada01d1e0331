//! Cloud database provisioning backends.
//!
//! Each supported provider implements [`DatabaseProvider`] against its
//! management HTTP API. [`ProviderRegistry`] maps every [`ProviderKind`]
//! to the configured backend and answers availability queries.
//!
//! [`ProviderKind`]: dbprov_core::types::ProviderKind

pub mod config;
pub mod error;
pub mod http;
pub mod probe;
pub mod provider;
pub mod providers;
pub mod regions;
pub mod registry;

pub use config::ProviderConfig;
pub use error::ProviderError;
pub use provider::{DatabaseProvider, ProvisionOptions};
pub use registry::ProviderRegistry;
