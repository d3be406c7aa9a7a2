//! Reactive Primitives
//!
//! This module implements the public surface of the engine: the system
//! orchestrator plus signals, computeds, effects, and effect scopes.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. Reading it inside a tracking
//! context (a computed getter or an effect body) registers the dependency
//! automatically; writing it marks dependents stale and queues effects.
//!
//! ## Computeds
//!
//! A Computed is a derived value that caches its result and recomputes
//! lazily, only when read and only when an upstream change is confirmed
//! real. An unchanged result stops propagation.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation re-run whenever its
//! dependencies change. An EffectScope groups effects for collective
//! disposal without tracking anything itself.
//!
//! # Implementation Notes
//!
//! Dependency detection is transparent: the system keeps the currently
//! tracking subscriber in a field (never global state), and every read
//! consults it. Each run of a subscriber re-declares its dependency set
//! from scratch, reusing unchanged prefix links, so dependency sets are
//! dynamic rather than static.

mod computed;
mod effect;
mod signal;
mod system;

pub use computed::Computed;
pub use effect::StopHandle;
pub use signal::Signal;
pub use system::ReactiveSystem;
