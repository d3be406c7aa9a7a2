//! Graph Nodes and Links
//!
//! This module defines the records that live in the dependency graph: the
//! node (one per signal, computed, effect, or effect scope) and the link
//! (one per observed-by edge).
//!
//! # Capabilities
//!
//! Every node structurally carries both halves of the graph:
//!
//! - The *dependency* half: a subscriber list (`subs`/`subs_tail`) of the
//!   nodes observing it.
//! - The *subscriber* half: a dependency list (`deps`/`deps_tail`) of the
//!   nodes it observes, plus the flags word recording its reactive state.
//!
//! Which half a node actually uses is a capability question answered by its
//! flags: a signal is a pure dependency, a computed is both a dependency and
//! a subscriber, an effect is a subscriber that can also be depended upon
//! (nested effects attach to their parent through the dependency half).
//!
//! # Links
//!
//! A link is a directed edge `(dependency, subscriber)` that belongs to two
//! lists at once: the subscriber's dependency list (singly linked through
//! `next_dep`) and the dependency's subscriber list (doubly linked through
//! `prev_sub`/`next_sub`). It is detached from both simultaneously and its
//! arena slot is then recycled.

use std::rc::Rc;

use crate::error::Error;

/// Stable index of a node in the graph arena.
///
/// Node slots live as long as their owning system, so an id never dangles.
/// Ids from different systems must not be mixed; each system owns exactly
/// one graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index as u32)
    }

    pub(crate) fn index(&self) -> usize {
        self.0 as usize
    }

    /// Get the raw id value.
    pub fn raw(&self) -> u32 {
        self.0
    }
}

/// Stable index of a link in the graph arena.
///
/// Unlike node slots, link slots are recycled once the edge is detached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct LinkId(u32);

impl LinkId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index as u32)
    }

    pub(crate) fn index(&self) -> usize {
        self.0 as usize
    }
}

bitflags::bitflags! {
    /// The per-subscriber state machine.
    ///
    /// Several states are meaningful at once (for example `DIRTY` together
    /// with `PENDING_EFFECT`), so this is a flags word rather than an enum.
    ///
    /// - `DIRTY`: must recompute or rerun unconditionally.
    /// - `PENDING_COMPUTED`: an ancestor changed; check before acting.
    /// - `PENDING_EFFECT`: some descendant effect is queued behind this node.
    /// - `TRACKING`: mid-recompute or mid-run right now.
    /// - `NOTIFIED`/`RECURSED`: propagation bookkeeping preventing duplicate
    ///   queueing and handling re-converging paths.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) struct SubscriberFlags: u16 {
        const COMPUTED = 1 << 0;
        const EFFECT = 1 << 1;
        const TRACKING = 1 << 2;
        const NOTIFIED = 1 << 3;
        const RECURSED = 1 << 4;
        const DIRTY = 1 << 5;
        const PENDING_COMPUTED = 1 << 6;
        const PENDING_EFFECT = 1 << 7;
        const EFFECT_SCOPE = 1 << 8;

        /// Any staleness-confidence level.
        const PROPAGATED = Self::DIRTY.bits()
            | Self::PENDING_COMPUTED.bits()
            | Self::PENDING_EFFECT.bits();
    }
}

/// Recompute a computed's cached value; reports whether it changed.
pub(crate) type UpdateFn = Rc<dyn Fn() -> bool>;

/// Run an effect body.
pub(crate) type RunFn = Rc<dyn Fn() -> Result<(), Error>>;

/// A node in the dependency graph.
pub(crate) struct Node {
    /// Current reactive state.
    pub flags: SubscriberFlags,

    /// Head of the dependency list (what this node observes).
    pub deps: Option<LinkId>,

    /// Cursor into the dependency list, advanced while tracking.
    pub deps_tail: Option<LinkId>,

    /// Head of the subscriber list (who observes this node).
    pub subs: Option<LinkId>,

    /// Tail of the subscriber list.
    pub subs_tail: Option<LinkId>,

    /// Recompute behavior; present on computed nodes only.
    pub update: Option<UpdateFn>,

    /// Side-effect behavior; present on effect nodes only.
    pub run: Option<RunFn>,
}

impl Node {
    fn bare(flags: SubscriberFlags) -> Self {
        Self {
            flags,
            deps: None,
            deps_tail: None,
            subs: None,
            subs_tail: None,
            update: None,
            run: None,
        }
    }

    /// Create a source (signal) node: a pure dependency with no flags.
    pub fn source() -> Self {
        Self::bare(SubscriberFlags::empty())
    }

    /// Create a derived (computed) node.
    ///
    /// Starts `DIRTY` so the first read always computes.
    pub fn derived(update: UpdateFn) -> Self {
        let mut node = Self::bare(SubscriberFlags::COMPUTED | SubscriberFlags::DIRTY);
        node.update = Some(update);
        node
    }

    /// Create an effect node.
    pub fn effect(run: RunFn) -> Self {
        let mut node = Self::bare(SubscriberFlags::EFFECT);
        node.run = Some(run);
        node
    }

    /// Create an effect-scope node.
    ///
    /// A scope is a grouping subscriber: it owns inner effects through its
    /// dependency list but never re-runs user code itself.
    pub fn scope() -> Self {
        Self::bare(SubscriberFlags::EFFECT | SubscriberFlags::EFFECT_SCOPE)
    }

    /// Whether this node uses the subscriber capability (observes others).
    pub fn is_subscriber(&self) -> bool {
        self.flags
            .intersects(SubscriberFlags::COMPUTED | SubscriberFlags::EFFECT)
    }
}

/// A directed edge from a dependency to a subscriber.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Link {
    /// The observed node.
    pub dep: NodeId,

    /// The observing node.
    pub sub: NodeId,

    /// Previous link in the dependency's subscriber list.
    pub prev_sub: Option<LinkId>,

    /// Next link in the dependency's subscriber list.
    pub next_sub: Option<LinkId>,

    /// Next link in the subscriber's dependency list.
    pub next_dep: Option<LinkId>,
}
