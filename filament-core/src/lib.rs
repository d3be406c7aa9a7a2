//! Filament Core
//!
//! A fine-grained reactive-computation engine: a dependency graph of
//! mutable sources ([`Signal`]), lazily recomputed derived values
//! ([`Computed`]), and reactive side-effects, with a propagation algorithm
//! that recomputes each node at most once per update batch regardless of
//! graph shape — diamonds and re-converging paths included.
//!
//! # Architecture
//!
//! The crate is organized into two layers:
//!
//! - `graph`: the arena-backed dependency graph — nodes, links, the
//!   idempotent link-management protocol, and the iterative marking walks.
//!   Purely structural; never runs user code.
//! - `reactive`: the orchestrator and the public primitives built on top —
//!   tracking contexts, batching, staleness resolution, and effect
//!   notification.
//!
//! # Example
//!
//! ```rust
//! use filament_core::ReactiveSystem;
//!
//! let rs = ReactiveSystem::new();
//!
//! let count = rs.signal(1);
//! let reader = count.clone();
//! let doubled = rs.computed(move |_| reader.get() * 2);
//!
//! assert_eq!(doubled.get(), 2);
//!
//! count.set(5);
//! assert_eq!(doubled.get(), 10);
//! ```
//!
//! # Concurrency
//!
//! One system owns one graph, and the graph assumes a single logical
//! mutator: there is no internal lock and the handles are not `Send`.
//! Callers that drive a system from concurrent contexts must serialize
//! every entry point themselves.

pub mod error;
mod graph;
pub mod reactive;

pub use error::Error;
pub use graph::NodeId;
pub use reactive::{Computed, ReactiveSystem, Signal, StopHandle};
