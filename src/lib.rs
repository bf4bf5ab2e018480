#![doc(html_logo_url = "https://www.rust-lang.org/logos/rust-logo-128x128.png")]
#![doc(html_favicon_url = "https://www.rust-lang.org/favicon.ico")]
//! # Unit Orchestrator
//!
//! > **Dependency resolution and lifecycle orchestration for pluggable units.**
//!
//! A host application registers extension *units* (components and plugins). This
//! crate discovers them, checks their dependencies, computes a safe load order and
//! binds their handlers to the application's lifecycle phases.
//!
//! ## 🏗️ Design Philosophy
//!
//! ### Two Tiers, Two Severities
//!
//! - **Core** units are framework infrastructure. Their dependency graph is a hard
//!   gate: any missing dependency, unsatisfied contract, active conflict or cycle
//!   aborts startup with one operator-readable diagnostic.
//! - **User** units are application extensions. They load best-effort after the
//!   core tier is bound; a broken user unit is skipped with a warning.
//!
//! ### Declared, Not Inspected
//! A unit *declares* what it does as data: its phase handlers, whether it has a
//! default entry, whether it has an uninstall hook. The orchestrator never probes
//! the instance to find out.
//!
//! ## 🚀 Core Concepts
//!
//! ### Dependencies
//! - **Required**: another unit, by name, must be enabled. Orders loading.
//! - **Optional**: nice to have. A warning when missing, never orders loading.
//! - **Contract**: some core unit must provide a named [`Capability`](model::Capability),
//!   optionally checked by a predicate against the live application. Orders loading.
//!
//! ### Phases
//! Handlers bind to the closed set of [`Phase`](model::Phase)s and fire **at most
//! once** per bootstrap cycle. The host drives timing by emitting phases on the bus.
//!
//! ## 🗺️ Module Tour
//!
//! ### 1. The Data ([`model`])
//! - **Key items**: [`Unit`](model::Unit), [`UnitDescriptor`](model::UnitDescriptor),
//!   [`Phase`](model::Phase), [`Application`](model::Application).
//!
//! ### 2. Discovery ([`catalog`])
//! Pulls raw entries from a [`UnitRegistry`](catalog::UnitRegistry), applies the
//! plugin configuration and splits the result into the two tiers.
//!
//! ### 3. Resolution ([`capability`], [`validator`], [`resolver`])
//! Capability index, tier-specific validation and load order.
//!
//! ### 4. The Lifecycle ([`lifecycle`])
//! - **Key items**: [`LifecycleBinder`](lifecycle::LifecycleBinder),
//!   [`EventBus`](lifecycle::EventBus), [`setup_tracing`](lifecycle::tracing::setup_tracing).
//!
//! ### 5. The Conductor ([`orchestrator`])
//! [`Orchestrator`](orchestrator::Orchestrator) ties everything together behind a
//! small state machine and exposes the query API.
//!
//! ## 🚀 Quick Start
//!
//! ```rust,ignore
//! let registry = Arc::new(StaticRegistry::new());
//! registry.component("Router", Router, UnitMetadata::core()
//!     .provides(Capability::new("router", "1.0.0"))
//!     .on(Phase::LoadRouter, "init"));
//!
//! let app = Arc::new(Application::new("demo", Arc::new(StaticConfig::empty())));
//! let bus = Arc::new(EventBus::new());
//! let mut orchestrator = Orchestrator::new(app.clone(), registry, bus.clone());
//!
//! orchestrator.bootstrap().await?;
//! bus.emit_startup(&app).await?;
//! ```
//!
//! ### Running the Demo
//!
//! ```bash
//! RUST_LOG=info cargo run
//! ```
//!
//! ### Running Tests
//!
//! ```bash
//! cargo test
//! ```

pub mod capability;
pub mod catalog;
pub mod error;
pub mod lifecycle;
pub mod mock;
pub mod model;
pub mod orchestrator;
pub mod resolver;
pub mod validator;

pub use error::{OrchestratorError, UnitError};
pub use orchestrator::{Orchestrator, OrchestratorState, Stats};
