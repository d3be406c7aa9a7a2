//! Computed Implementation
//!
//! A Computed is a lazily evaluated, memoized derived value. It is both a
//! dependency (others may observe it) and a subscriber (it observes its
//! inputs).
//!
//! # How Computeds Work
//!
//! 1. Creation does no work; the node starts dirty so the first read
//!    computes.
//!
//! 2. A read first resolves staleness: `DIRTY` recomputes outright, while
//!    `PENDING_COMPUTED` checks upstream before committing to any work.
//!
//! 3. A recompute compares the getter's result against the cached value.
//!    An unchanged result stops propagation here — downstream subscribers
//!    are not re-marked, which is what keeps diamond-shaped graphs at one
//!    recompute per node per update.
//!
//! The getter receives the previous cached value (`None` on the first run),
//! which allows incremental derivations without extra state.

use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;

use crate::graph::{Node, NodeId, SubscriberFlags, UpdateFn};

use super::system::{ReactiveSystem, Runtime};

/// A read-only, memoized derived value of type `T`.
pub struct Computed<T>
where
    T: Clone + PartialEq + 'static,
{
    pub(crate) runtime: Rc<Runtime>,
    pub(crate) id: NodeId,
    value: Rc<RefCell<Option<T>>>,
}

impl ReactiveSystem {
    /// Create a computed from a getter.
    ///
    /// The getter is called with the previous cached value, `None` on the
    /// first evaluation. It should be pure with respect to the reactive
    /// values it reads; reads establish dependencies automatically.
    pub fn computed<T, F>(&self, getter: F) -> Computed<T>
    where
        T: Clone + PartialEq + 'static,
        F: Fn(Option<&T>) -> T + 'static,
    {
        let value = Rc::new(RefCell::new(None::<T>));
        let cell = Rc::clone(&value);
        let update: UpdateFn = Rc::new(move || {
            let previous = cell.borrow().clone();
            let next = getter(previous.as_ref());
            let changed = previous.as_ref() != Some(&next);
            *cell.borrow_mut() = Some(next);
            changed
        });

        let id = self.runtime.graph.borrow_mut().add_node(Node::derived(update));
        Computed {
            runtime: Rc::clone(&self.runtime),
            id,
            value,
        }
    }
}

impl<T> Computed<T>
where
    T: Clone + PartialEq + 'static,
{
    /// Get the node id of this computed.
    pub fn node_id(&self) -> NodeId {
        self.id
    }

    /// Get the current value, recomputing first if it may be stale.
    ///
    /// Like a signal read, this links the computed to the active tracking
    /// context, so computeds compose into deeper derivations.
    pub fn get(&self) -> T {
        let flags = self.runtime.graph.borrow().node(self.id).flags;
        if flags.intersects(SubscriberFlags::DIRTY | SubscriberFlags::PENDING_COMPUTED) {
            self.runtime.process_computed_update(self.id, flags);
        }

        self.runtime.link_to_active(self.id);

        self.value
            .borrow()
            .clone()
            .expect("resolved computed should have a value")
    }

    /// Whether a value has been computed yet.
    pub fn has_value(&self) -> bool {
        self.value.borrow().is_some()
    }
}

impl<T> Clone for Computed<T>
where
    T: Clone + PartialEq + 'static,
{
    fn clone(&self) -> Self {
        Self {
            runtime: Rc::clone(&self.runtime),
            id: self.id,
            value: Rc::clone(&self.value),
        }
    }
}

impl<T> Debug for Computed<T>
where
    T: Clone + PartialEq + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.id.raw())
            .field("value", &self.value.borrow())
            .finish()
    }
}

impl Runtime {
    /// Recompute a computed's cached value, re-tracking its dependencies.
    ///
    /// Returns whether the value actually changed. The previous tracking
    /// context is restored afterwards; if the getter unwinds, the guard
    /// also re-marks the node dirty so a later read retries.
    pub(crate) fn update_computed(&self, id: NodeId) -> bool {
        let update = self
            .graph
            .borrow()
            .node(id)
            .update
            .clone()
            .expect("update_computed called on a node without a getter");

        tracing::trace!(node = id.raw(), "recomputing");
        let _guard = self.begin_tracking(id, true);
        update()
    }

    /// Bring a computed current before its value is read.
    ///
    /// `DIRTY` recomputes unconditionally. `PENDING_COMPUTED` first asks
    /// `check_dirty` whether any upstream change is real; if not, the flag
    /// is simply cleared and the cache stands. A recompute whose value
    /// changed upgrades direct subscribers via `shallow_propagate`.
    pub(crate) fn process_computed_update(&self, id: NodeId, flags: SubscriberFlags) {
        let mut dirty = flags.contains(SubscriberFlags::DIRTY);

        if !dirty {
            let deps = self.graph.borrow().node(id).deps;
            dirty = match deps {
                Some(head) => self.check_dirty(head),
                None => false,
            };
            self.graph
                .borrow_mut()
                .node_mut(id)
                .flags
                .remove(SubscriberFlags::PENDING_COMPUTED);
        }

        if dirty && self.update_computed(id) {
            let subs = self.graph.borrow().node(id).subs;
            if let Some(head) = subs {
                self.graph.borrow_mut().shallow_propagate(head);
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
