//! Discovery: the registry and configuration collaborators, and the adapter
//! that turns their records into unit descriptors.

pub mod adapter;
pub mod config;
pub mod registry;

pub use adapter::*;
pub use config::*;
pub use registry::*;
