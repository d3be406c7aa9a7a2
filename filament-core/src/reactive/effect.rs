//! Effect Implementation
//!
//! An Effect is a side-effecting subscriber that re-runs whenever its
//! dependencies change. An EffectScope is a non-reactive grouping
//! subscriber: it owns the effects created inside its body so they can be
//! disposed collectively, but never re-runs user code itself.
//!
//! # Dependency Tracking
//!
//! Each run fully replaces the effect's dependency set with whatever it
//! read *this* time. A branch not taken this run drops the dependencies
//! behind it, so the effect only ever wakes for values it currently cares
//! about.
//!
//! # Nesting and Ordering
//!
//! An effect created inside another effect (or inside a scope) is linked
//! under its parent at construction time. During propagation, such an
//! effect is not queued directly; its notification rides on the parent's
//! `PENDING_EFFECT` flag and is dispatched after the parent has dealt with
//! its own run. The observable guarantee: an outer effect completes its
//! body, including declaring inner effects, before any inner effect body
//! runs.
//!
//! # Disposal
//!
//! Stopping an effect is "track nothing, then commit": open and immediately
//! close a tracking window, which detaches every dependency link without
//! establishing new ones. For a scope this transitively detaches each owned
//! effect from everything it was reading.

use std::rc::Rc;

use crate::error::Error;
use crate::graph::{Node, NodeId, RunFn, SubscriberFlags};

use super::system::{ReactiveSystem, Runtime};

/// Handle that stops an effect or effect scope.
///
/// Dropping the handle does not stop anything; the effect keeps running
/// until [`stop`](Self::stop) is called or its parent is disposed.
#[must_use = "dropping the handle does not stop the effect; call `stop`"]
pub struct StopHandle {
    runtime: Rc<Runtime>,
    node: NodeId,
}

impl StopHandle {
    /// Get the node id of the effect this handle controls.
    pub fn node_id(&self) -> NodeId {
        self.node
    }

    /// Detach the effect from everything it observes.
    ///
    /// No future propagation reaches it afterwards. An already-running body
    /// is not interrupted.
    pub fn stop(self) {
        let mut graph = self.runtime.graph.borrow_mut();
        graph.start_tracking(self.node);
        graph.end_tracking(self.node);
    }
}

impl ReactiveSystem {
    /// Create an effect and run it immediately.
    ///
    /// The body's reactive reads establish its dependency set; any error it
    /// returns is forwarded to the system's error hook together with the
    /// effect's node. If a tracking context is active when the effect is
    /// created, the effect attaches under it, so disposing the parent also
    /// disposes this effect.
    pub fn effect<F>(&self, body: F) -> StopHandle
    where
        F: Fn() -> Result<(), Error> + 'static,
    {
        let run: RunFn = Rc::new(body);
        let id = self.runtime.graph.borrow_mut().add_node(Node::effect(run));
        self.runtime.link_to_active(id);
        self.runtime.run_effect(id);
        StopHandle {
            runtime: Rc::clone(&self.runtime),
            node: id,
        }
    }

    /// Create an effect scope and run its body immediately.
    ///
    /// While the body executes, effects it creates attach to the scope
    /// rather than becoming tracked dependencies; the scope itself does not
    /// track value reads. Stopping the returned handle disposes every
    /// effect created inside.
    pub fn effect_scope<F>(&self, body: F) -> StopHandle
    where
        F: FnOnce() -> Result<(), Error>,
    {
        let id = self.runtime.graph.borrow_mut().add_node(Node::scope());
        self.runtime.run_effect_scope(id, body);
        StopHandle {
            runtime: Rc::clone(&self.runtime),
            node: id,
        }
    }
}

impl Runtime {
    /// Run an effect's body inside a fresh tracking window.
    pub(crate) fn run_effect(&self, id: NodeId) {
        let run = self
            .graph
            .borrow()
            .node(id)
            .run
            .clone()
            .expect("run_effect called on a node without a body");

        tracing::trace!(node = id.raw(), "running effect");
        let guard = self.begin_tracking(id, false);
        if let Err(error) = run() {
            self.report_error(id, &error);
        }
        drop(guard);
    }

    /// Run a scope body with the scope as the enclosing tracking context.
    pub(crate) fn run_effect_scope<F>(&self, id: NodeId, body: F)
    where
        F: FnOnce() -> Result<(), Error>,
    {
        let prev = self.active_scope.replace(Some(id));
        self.graph.borrow_mut().start_tracking(id);
        let guard = ScopeGuard {
            runtime: self,
            node: id,
            prev,
        };
        if let Err(error) = body() {
            self.report_error(id, &error);
        }
        drop(guard);
    }

    /// React to a queued notification.
    ///
    /// A scope only ever re-dispatches pending inner effects; it returns
    /// `false` when there is nothing pending so the caller can clear its
    /// `NOTIFIED` bit. An effect re-runs when confirmed stale (`DIRTY`, or
    /// `PENDING_COMPUTED` resolving dirty); otherwise its pending inner
    /// effects are dispatched without re-running it.
    pub(crate) fn notify_effect(&self, id: NodeId) -> bool {
        let flags = self.graph.borrow().node(id).flags;

        if flags.contains(SubscriberFlags::EFFECT_SCOPE) {
            if flags.contains(SubscriberFlags::PENDING_EFFECT) {
                self.process_pending_inner_effects(id, flags);
                return true;
            }
            return false;
        }

        if flags.contains(SubscriberFlags::DIRTY)
            || (flags.contains(SubscriberFlags::PENDING_COMPUTED) && self.update_dirty_flag(id))
        {
            self.run_effect(id);
        } else {
            self.process_pending_inner_effects(id, flags);
        }
        true
    }

    /// Dispatch notifications to inner effects riding on `PENDING_EFFECT`.
    ///
    /// Called when a subscriber decides not to re-run itself but may own
    /// effects that were marked along the same propagation pass.
    pub(crate) fn process_pending_inner_effects(&self, id: NodeId, flags: SubscriberFlags) {
        if !flags.contains(SubscriberFlags::PENDING_EFFECT) {
            return;
        }
        self.graph
            .borrow_mut()
            .node_mut(id)
            .flags
            .remove(SubscriberFlags::PENDING_EFFECT);

        let mut cursor = self.graph.borrow().node(id).deps;
        while let Some(link_id) = cursor {
            let (dep, next) = {
                let graph = self.graph.borrow();
                let link = graph.link(link_id);
                (link.dep, link.next_dep)
            };
            let dep_flags = self.graph.borrow().node(dep).flags;
            if dep_flags.contains(SubscriberFlags::EFFECT)
                && dep_flags.intersects(SubscriberFlags::PROPAGATED)
            {
                self.notify_effect(dep);
            }
            cursor = next;
        }
    }

    /// Drain the pending-effect queue, oldest first.
    ///
    /// Effects queued while draining (by writes performed inside effect
    /// bodies) are processed in the same drain. A declined notification
    /// clears `NOTIFIED` so the node can be queued again by a later pass.
    pub(crate) fn process_effect_notifications(&self) {
        loop {
            let next = self.graph.borrow_mut().dequeue_effect();
            let Some(id) = next else {
                break;
            };
            if !self.notify_effect(id) {
                self.graph
                    .borrow_mut()
                    .node_mut(id)
                    .flags
                    .remove(SubscriberFlags::NOTIFIED);
            }
        }
    }
}

/// Restores the enclosing scope on drop, panicking or not.
struct ScopeGuard<'a> {
    runtime: &'a Runtime,
    node: NodeId,
    prev: Option<NodeId>,
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.runtime.active_scope.set(self.prev);
        self.runtime.graph.borrow_mut().end_tracking(self.node);
    }
}
