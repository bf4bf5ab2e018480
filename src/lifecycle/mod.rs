//! # Phase Lifecycle
//!
//! Everything that happens once the load order is known: binding unit
//! handlers to lifecycle phases ([`LifecycleBinder`]) and dispatching those
//! phases ([`EventBus`]).
//!
//! ## Wiring
//!
//! ```rust,ignore
//! let bus = Arc::new(EventBus::new());
//! let mut orchestrator = Orchestrator::new(app.clone(), registry, bus.clone());
//! orchestrator.bootstrap().await?;
//!
//! // The host drives timing by emitting phases.
//! bus.emit_startup(&app).await?;
//! bus.emit(Phase::Stop, &app).await?;
//! orchestrator.deactivate_all().await;
//! ```
//!
//! The binder only ever sees the [`PhaseBus`] trait, so a host with its own
//! event system can plug it in instead of [`EventBus`]. Whatever the
//! implementation, listeners of one phase must be awaited one after the other
//! or the resolved load order is not honored at runtime.

pub mod binder;
pub mod bus;
pub mod tracing;

pub use binder::{BindOutcome, DefaultEntry, HookKey, LifecycleBinder};
pub use bus::{EventBus, Listener, ListenerFuture, PhaseBus};
