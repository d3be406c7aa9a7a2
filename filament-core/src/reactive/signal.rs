//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive: a mutable leaf holding a
//! value and the list of subscribers observing it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read while a subscriber is tracking, the signal is
//!    linked to that subscriber.
//!
//! 2. When a signal's value changes, staleness flags propagate through the
//!    subscriber graph; nothing recomputes until it is read or, for
//!    effects, notified.
//!
//! 3. A write carrying a value equal to the current one is a silent no-op:
//!    no propagation, no effect runs.
//!
//! # Handles
//!
//! `Signal<T>` is a cheap handle. Clones share the same value and the same
//! graph node, so a getter closure can capture its own clone while the
//! caller keeps writing through another.

use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;

use crate::graph::{Node, NodeId};

use super::system::{ReactiveSystem, Runtime};

/// A mutable reactive source holding a value of type `T`.
pub struct Signal<T>
where
    T: Clone + PartialEq + 'static,
{
    pub(crate) runtime: Rc<Runtime>,
    pub(crate) id: NodeId,
    value: Rc<RefCell<T>>,
}

impl ReactiveSystem {
    /// Create a signal with the given initial value.
    pub fn signal<T>(&self, initial: T) -> Signal<T>
    where
        T: Clone + PartialEq + 'static,
    {
        let id = self.runtime.graph.borrow_mut().add_node(Node::source());
        Signal {
            runtime: Rc::clone(&self.runtime),
            id,
            value: Rc::new(RefCell::new(initial)),
        }
    }
}

impl<T> Signal<T>
where
    T: Clone + PartialEq + 'static,
{
    /// Get the node id of this signal.
    pub fn node_id(&self) -> NodeId {
        self.id
    }

    /// Get the current value.
    ///
    /// If a tracking context is active (the running subscriber, else the
    /// nearest enclosing effect scope), this also registers the dependency.
    pub fn get(&self) -> T {
        self.runtime.link_to_active(self.id);
        self.value.borrow().clone()
    }

    /// Get the current value without establishing a dependency.
    pub fn get_untracked(&self) -> T {
        self.value.borrow().clone()
    }

    /// Set a new value and propagate to subscribers.
    ///
    /// A value equal to the current one is a no-op. Outside a batch this
    /// drains the pending-effect queue before returning, so dependent
    /// effects run synchronously.
    pub fn set(&self, value: T) {
        if *self.value.borrow() == value {
            return;
        }
        *self.value.borrow_mut() = value;

        let subs = self.runtime.graph.borrow().node(self.id).subs;
        if let Some(head) = subs {
            self.runtime.graph.borrow_mut().propagate(head);
            if self.runtime.batch_depth.get() == 0 {
                self.runtime.process_effect_notifications();
            }
        }
    }

    /// Update the value using a function of the current value.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let new_value = {
            let current = self.value.borrow();
            f(&current)
        };
        self.set(new_value);
    }

    /// Current number of subscriber links.
    pub fn subscriber_count(&self) -> usize {
        let graph = self.runtime.graph.borrow();
        let mut count = 0;
        let mut cursor = graph.node(self.id).subs;
        while let Some(id) = cursor {
            count += 1;
            cursor = graph.link(id).next_sub;
        }
        count
    }
}

impl<T> Clone for Signal<T>
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

impl<T> Debug for Signal<T>
where
    T: Clone + PartialEq + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.id.raw())
            .field("value", &self.get_untracked())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
