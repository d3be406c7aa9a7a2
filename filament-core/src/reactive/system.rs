//! Reactive System
//!
//! The system is the central coordinator that connects signals, computeds,
//! and effects. It owns the dependency graph, the current tracking context,
//! the batch depth, and the pending-effect queue.
//!
//! # How It Works
//!
//! 1. Reading a signal or computed links it to the currently tracking
//!    subscriber.
//!
//! 2. Writing a signal propagates staleness flags through the graph without
//!    recomputing anything.
//!
//! 3. Queued effects drain when the write happened outside a batch, or when
//!    the outermost batch ends.
//!
//! 4. Computeds are lazy: a node marked `PENDING_COMPUTED` resolves whether
//!    it is actually stale (`check_dirty`) only when read or notified.
//!
//! # Threading
//!
//! One system owns one graph, and the graph assumes a single logical
//! mutator: there is no internal lock, and the tracking context lives in
//! plain fields on the system rather than in global or thread-local state.
//! Callers driving a system from several threads must serialize every entry
//! point themselves; the handle types are deliberately not `Send`.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use smallvec::SmallVec;

use crate::error::{Error, ErrorHook};
use crate::graph::{Graph, LinkId, NodeId, SubscriberFlags};

/// The orchestrator of one reactive graph.
///
/// Cheap to clone; clones share the same graph. Construct signals,
/// computeds, and effects through it, and use [`batch`](Self::batch) to
/// coalesce several writes into a single round of effect runs.
#[derive(Clone)]
pub struct ReactiveSystem {
    pub(crate) runtime: Rc<Runtime>,
}

/// Shared mutable state behind a [`ReactiveSystem`] and its handles.
pub(crate) struct Runtime {
    pub(crate) graph: RefCell<Graph>,
    pub(crate) batch_depth: Cell<usize>,
    pub(crate) active_sub: Cell<Option<NodeId>>,
    pub(crate) active_scope: Cell<Option<NodeId>>,
    pause_stack: RefCell<Vec<Option<NodeId>>>,
    on_error: ErrorHook,
}

impl ReactiveSystem {
    /// Create a system whose error hook logs failures through `tracing`.
    pub fn new() -> Self {
        Self::with_error_handler(|node, error| {
            tracing::error!(node = node.raw(), %error, "effect body failed");
        })
    }

    /// Create a system with an explicit error hook.
    ///
    /// The hook receives the originating node and the error whenever an
    /// effect or effect-scope body fails. Failures never propagate out of
    /// `set` or `get`.
    pub fn with_error_handler<F>(handler: F) -> Self
    where
        F: Fn(NodeId, &Error) + 'static,
    {
        Self {
            runtime: Rc::new(Runtime {
                graph: RefCell::new(Graph::new()),
                batch_depth: Cell::new(0),
                active_sub: Cell::new(None),
                active_scope: Cell::new(None),
                pause_stack: RefCell::new(Vec::new()),
                on_error: Box::new(handler),
            }),
        }
    }

    /// Open a batch window; effects stay queued until it closes.
    pub fn start_batch(&self) {
        self.runtime.start_batch();
    }

    /// Close a batch window; the outermost close drains queued effects.
    pub fn end_batch(&self) {
        self.runtime.end_batch();
    }

    /// Run `f` inside a batch window.
    ///
    /// All writes performed by `f` are applied before any dependent effect
    /// runs, so effects observe a single consistent end state. The window
    /// closes even if `f` unwinds.
    pub fn batch<R>(&self, f: impl FnOnce() -> R) -> R {
        self.runtime.start_batch();
        let _guard = BatchGuard {
            runtime: &self.runtime,
        };
        f()
    }

    /// Suspend dependency tracking; reads establish no links until resumed.
    pub fn pause_tracking(&self) {
        let suspended = self.runtime.active_sub.replace(None);
        self.runtime.pause_stack.borrow_mut().push(suspended);
    }

    /// Restore the tracking context saved by the matching
    /// [`pause_tracking`](Self::pause_tracking).
    ///
    /// Calls must nest strictly; an unbalanced resume is a programming
    /// error and panics.
    pub fn resume_tracking(&self) {
        let restored = self
            .runtime
            .pause_stack
            .borrow_mut()
            .pop()
            .expect("resume_tracking called without a matching pause_tracking");
        self.runtime.active_sub.set(restored);
    }
}

impl Default for ReactiveSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ReactiveSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReactiveSystem")
            .field("nodes", &self.runtime.graph.borrow().node_count())
            .field("batch_depth", &self.runtime.batch_depth.get())
            .finish()
    }
}

impl Runtime {
    pub(crate) fn start_batch(&self) {
        self.batch_depth.set(self.batch_depth.get() + 1);
    }

    pub(crate) fn end_batch(&self) {
        let depth = self.batch_depth.get();
        assert!(depth > 0, "end_batch called without a matching start_batch");
        self.batch_depth.set(depth - 1);
        if depth == 1 {
            self.process_effect_notifications();
        }
    }

    /// Link `dep` under the current tracking context, if any.
    ///
    /// The active subscriber wins; otherwise the nearest enclosing effect
    /// scope collects the dependency.
    pub(crate) fn link_to_active(&self, dep: NodeId) {
        if let Some(sub) = self.active_sub.get() {
            self.graph.borrow_mut().ensure_link(dep, sub);
        } else if let Some(scope) = self.active_scope.get() {
            self.graph.borrow_mut().ensure_link(dep, scope);
        }
    }

    pub(crate) fn report_error(&self, node: NodeId, error: &Error) {
        (self.on_error)(node, error);
    }

    /// Open a tracking window for `node` and make it the active subscriber.
    ///
    /// The returned guard restores the previous context and closes the
    /// window when dropped, including during unwinding, so a panicking user
    /// body cannot leave the graph in a half-tracked state.
    pub(crate) fn begin_tracking(&self, node: NodeId, redirty_on_unwind: bool) -> TrackingGuard<'_> {
        let prev = self.active_sub.replace(Some(node));
        self.graph.borrow_mut().start_tracking(node);
        TrackingGuard {
            runtime: self,
            node,
            prev,
            redirty_on_unwind,
        }
    }

    /// Resolve whether a subscriber flagged `PENDING_COMPUTED` is actually
    /// stale, updating its flags either way.
    pub(crate) fn update_dirty_flag(&self, sub: NodeId) -> bool {
        let deps = self.graph.borrow().node(sub).deps;
        let dirty = match deps {
            Some(head) => self.check_dirty(head),
            None => false,
        };

        let mut graph = self.graph.borrow_mut();
        let node = graph.node_mut(sub);
        if dirty {
            node.flags.insert(SubscriberFlags::DIRTY);
            true
        } else {
            node.flags.remove(SubscriberFlags::PENDING_COMPUTED);
            false
        }
    }

    /// Decide, without assuming, whether any dependency reachable from
    /// `head` has actually changed.
    ///
    /// A dependency that is already confirmed `DIRTY` is recomputed on the
    /// spot; one confirmed change short-circuits the whole check. A
    /// dependency that is merely `PENDING_COMPUTED` is descended into, one
    /// level at a time, with the positions kept on an explicit stack so the
    /// walk never recurses. On the way back up, intermediate computeds are
    /// recomputed when their inputs changed and cleared when they did not.
    pub(crate) fn check_dirty(&self, head: LinkId) -> bool {
        let mut stack: SmallVec<[LinkId; 8]> = SmallVec::new();
        let mut current = head;
        let mut dirty;

        'top: loop {
            dirty = false;
            let (dep, next_dep) = {
                let graph = self.graph.borrow();
                let link = graph.link(current);
                (link.dep, link.next_dep)
            };
            let dep_flags = self.graph.borrow().node(dep).flags;

            if dep_flags.contains(SubscriberFlags::COMPUTED | SubscriberFlags::DIRTY) {
                if self.update_computed(dep) {
                    self.shallow_propagate_shared(dep);
                    dirty = true;
                }
            } else if dep_flags.contains(SubscriberFlags::COMPUTED | SubscriberFlags::PENDING_COMPUTED)
            {
                if let Some(dep_deps) = self.graph.borrow().node(dep).deps {
                    stack.push(current);
                    current = dep_deps;
                    continue 'top;
                }
            }

            if !dirty {
                if let Some(next) = next_dep {
                    current = next;
                    continue 'top;
                }
            }

            // Unwind: either a change was confirmed or this dependency list
            // is exhausted.
            loop {
                let Some(position) = stack.pop() else {
                    return dirty;
                };
                let pending = self.graph.borrow().link(position).dep;

                if dirty {
                    if self.update_computed(pending) {
                        self.shallow_propagate_shared(pending);
                        // Its value changed, so the level above is stale too.
                        continue;
                    }
                    dirty = false;
                } else {
                    let mut graph = self.graph.borrow_mut();
                    graph
                        .node_mut(pending)
                        .flags
                        .remove(SubscriberFlags::PENDING_COMPUTED);
                }

                // Unchanged: resume scanning the rest of the parent's list.
                if let Some(next) = self.graph.borrow().link(position).next_dep {
                    current = next;
                    continue 'top;
                }
            }
        }
    }

    /// After recomputing `dep` inside `check_dirty`, upgrade its other
    /// subscribers.
    ///
    /// With a single subscriber there is nothing to do: that subscriber is
    /// the one currently asking.
    fn shallow_propagate_shared(&self, dep: NodeId) {
        let subs = self.graph.borrow().node(dep).subs;
        if let Some(head) = subs {
            let shared = self.graph.borrow().link(head).next_sub.is_some();
            if shared {
                self.graph.borrow_mut().shallow_propagate(head);
            }
        }
    }
}

/// Restores the tracking context on drop, panicking or not.
pub(crate) struct TrackingGuard<'a> {
    runtime: &'a Runtime,
    node: NodeId,
    prev: Option<NodeId>,
    redirty_on_unwind: bool,
}

impl Drop for TrackingGuard<'_> {
    fn drop(&mut self) {
        self.runtime.active_sub.set(self.prev);
        let mut graph = self.runtime.graph.borrow_mut();
        if self.redirty_on_unwind && std::thread::panicking() {
            // The run never cached a result; force a retry on the next read.
            graph.node_mut(self.node).flags.insert(SubscriberFlags::DIRTY);
        }
        graph.end_tracking(self.node);
    }
}

struct BatchGuard<'a> {
    runtime: &'a Runtime,
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        self.runtime.end_batch();
    }
}
