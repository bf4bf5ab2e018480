//! Data model shared by every stage of the orchestrator.

pub mod application;
pub mod phase;
pub mod unit;

pub use application::*;
pub use phase::*;
pub use unit::*;
