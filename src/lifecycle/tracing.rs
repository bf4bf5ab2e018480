//! # Observability & Tracing
//!
//! Tracing setup for the orchestrator and the units it drives.
//!
//! ## Overview
//!
//! The [`setup_tracing`] function initializes structured logging with the `tracing` crate.
//! Every orchestration step logs with structured `unit`, `tier` and `phase` fields, so
//! a bootstrap can be followed (or filtered) unit by unit.
//!
//! ## Configuration
//!
//! The subscriber uses a compact format that hides the crate/module prefix (`with_target(false)`).
//! Log levels come from the `RUST_LOG` environment variable.
//!
//! ## What Gets Traced
//!
//! | Level   | Events |
//! |---------|--------|
//! | `info`  | Core discovery, resolved core order, core binding, user activation, teardown |
//! | `debug` | User discovery, hook registration, every phase handler invocation |
//! | `warn`  | Disabled units, skipped user units, unknown phases, failed uninstall hooks |
//! | `error` | Core validation and cycle failures, failing phase handlers (before re-raising) |
//!
//! ## Usage Examples
//!
//! ```bash
//! # Bootstrap summary
//! RUST_LOG=info cargo run
//!
//! # Every hook registration and handler call
//! RUST_LOG=debug cargo run
//!
//! # Only the lifecycle machinery
//! RUST_LOG=unit_orchestrator::lifecycle=debug cargo run
//! ```
//!
//! ## Bootstrap Trace Example
//!
//! **With `RUST_LOG=info`**:
//!
//! ```text
//! INFO ✓ Discovered core unit unit="Router"
//! INFO ✓ Discovered core unit unit="Serve"
//! INFO Core load order resolved order=["Trace", "Router", "Serve"]
//! INFO ✓ Core unit bound unit="Trace" hooks=1
//! INFO ✓ User unit loaded unit="Audit"
//! ```
//!
//! **With `RUST_LOG=debug`**, each phase emission adds its handler calls:
//!
//! ```text
//! DEBUG Emitting phase phase=load-router listeners=1
//! DEBUG Running phase handler unit="Router" phase=load-router handler="init"
//! ```
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false) // Unit and phase fields identify the source
        .compact()
        .init();
}
