//! Graph Store
//!
//! The arena owning every node and link of one reactive system, together
//! with the link-management primitives: idempotent edge creation, tracking
//! windows, and iterative unlinking.
//!
//! # Tracking Protocol
//!
//! A subscriber re-declares its dependency set from scratch on every run,
//! reusing unchanged prefix links instead of reallocating them:
//!
//! 1. `start_tracking` resets the subscriber's `deps_tail` cursor.
//!
//! 2. Each read calls `ensure_link`. When dependencies are read in the same
//!    order as the previous run (the common case for stable dependency
//!    sets), the cursor simply advances over the existing links and no
//!    allocation happens.
//!
//! 3. `end_tracking` detaches whatever is left past the cursor: the
//!    dependencies read last time but not this time.
//!
//! # Unlinking
//!
//! `clear_tracking` walks a chain of links iteratively, never recursively,
//! so arbitrarily deep dependency chains cannot exhaust the native stack.
//! A computed that loses its last subscriber is marked `DIRTY` (it must not
//! trust its cache once unobserved) and its own dependencies are spliced
//! onto the same removal walk.

use std::collections::VecDeque;

use super::node::{Link, LinkId, Node, NodeId, SubscriberFlags};

/// Arena of nodes and links for one reactive system.
///
/// Node slots live for the lifetime of the system; link slots are recycled
/// through a free list as edges come and go.
pub(crate) struct Graph {
    nodes: Vec<Node>,
    links: Vec<Option<Link>>,
    free_links: Vec<LinkId>,
    queued_effects: VecDeque<NodeId>,
}

impl Graph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            links: Vec::new(),
            free_links: Vec::new(),
            queued_effects: VecDeque::new(),
        }
    }

    /// Add a node to the arena.
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(node);
        id
    }

    /// Get a reference to a node.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    /// Get a mutable reference to a node.
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    /// Get a reference to a live link.
    pub fn link(&self, id: LinkId) -> &Link {
        self.links[id.index()].as_ref().expect("stale link id")
    }

    /// Get a mutable reference to a live link.
    pub fn link_mut(&mut self, id: LinkId) -> &mut Link {
        self.links[id.index()].as_mut().expect("stale link id")
    }

    /// Total number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn alloc_link(&mut self, link: Link) -> LinkId {
        match self.free_links.pop() {
            Some(id) => {
                self.links[id.index()] = Some(link);
                id
            }
            None => {
                let id = LinkId::new(self.links.len());
                self.links.push(Some(link));
                id
            }
        }
    }

    fn free_link(&mut self, id: LinkId) {
        self.links[id.index()] = None;
        self.free_links.push(id);
    }

    /// Push an effect onto the pending-notification queue.
    pub fn queue_effect(&mut self, id: NodeId) {
        self.queued_effects.push_back(id);
    }

    /// Pop the next pending effect notification, oldest first.
    pub fn dequeue_effect(&mut self) -> Option<NodeId> {
        self.queued_effects.pop_front()
    }

    /// Link a dependency and a subscriber if they are not already linked.
    ///
    /// Fast paths: the subscriber's cursor already sits on this dependency,
    /// or the link right after the cursor is this dependency (same read
    /// order as the previous run). A slower scan (`is_valid_link`) covers a
    /// repeated read of the same dependency out of cursor order. Only when
    /// none of these match is a new link allocated and spliced into both
    /// lists.
    pub fn ensure_link(&mut self, dep: NodeId, sub: NodeId) {
        let current_dep = self.node(sub).deps_tail;
        if let Some(tail) = current_dep {
            if self.link(tail).dep == dep {
                return;
            }
        }

        let next_dep = match current_dep {
            Some(tail) => self.link(tail).next_dep,
            None => self.node(sub).deps,
        };
        if let Some(next) = next_dep {
            if self.link(next).dep == dep {
                self.node_mut(sub).deps_tail = Some(next);
                return;
            }
        }

        if let Some(dep_last_sub) = self.node(dep).subs_tail {
            if self.link(dep_last_sub).sub == sub && self.is_valid_link(dep_last_sub, sub) {
                return;
            }
        }

        self.attach_new_link(dep, sub, next_dep, current_dep);
    }

    /// Create a new link and append it to the tail of both lists.
    fn attach_new_link(
        &mut self,
        dep: NodeId,
        sub: NodeId,
        next_dep: Option<LinkId>,
        deps_tail: Option<LinkId>,
    ) {
        let id = self.alloc_link(Link {
            dep,
            sub,
            prev_sub: None,
            next_sub: None,
            next_dep,
        });

        match deps_tail {
            Some(tail) => self.link_mut(tail).next_dep = Some(id),
            None => self.node_mut(sub).deps = Some(id),
        }

        if self.node(dep).subs.is_none() {
            self.node_mut(dep).subs = Some(id);
        } else {
            let old_tail = self
                .node(dep)
                .subs_tail
                .expect("non-empty subscriber list has a tail");
            self.link_mut(id).prev_sub = Some(old_tail);
            self.link_mut(old_tail).next_sub = Some(id);
        }

        self.node_mut(sub).deps_tail = Some(id);
        self.node_mut(dep).subs_tail = Some(id);
    }

    /// Whether `check` is part of the subscriber's current dependency list,
    /// scanning from the head to the cursor.
    pub fn is_valid_link(&self, check: LinkId, sub: NodeId) -> bool {
        let Some(tail) = self.node(sub).deps_tail else {
            return false;
        };
        let mut cursor = self.node(sub).deps;
        while let Some(id) = cursor {
            if id == check {
                return true;
            }
            if id == tail {
                break;
            }
            cursor = self.link(id).next_dep;
        }
        false
    }

    /// Open a tracking window: reset the cursor and clear transient flags.
    pub fn start_tracking(&mut self, sub: NodeId) {
        let node = self.node_mut(sub);
        node.deps_tail = None;
        node.flags = (node.flags
            - (SubscriberFlags::NOTIFIED | SubscriberFlags::RECURSED | SubscriberFlags::PROPAGATED))
            | SubscriberFlags::TRACKING;
    }

    /// Close a tracking window: detach dependencies not re-read this run.
    ///
    /// If nothing was tracked at all, the entire previous dependency list is
    /// detached.
    pub fn end_tracking(&mut self, sub: NodeId) {
        match self.node(sub).deps_tail {
            Some(tail) => {
                if let Some(dangling) = self.link(tail).next_dep {
                    self.clear_tracking(dangling);
                    self.link_mut(tail).next_dep = None;
                }
            }
            None => {
                if let Some(head) = self.node(sub).deps {
                    self.clear_tracking(head);
                }
                self.node_mut(sub).deps = None;
            }
        }
        self.node_mut(sub).flags -= SubscriberFlags::TRACKING;
    }

    /// Detach a chain of links from both of their lists.
    ///
    /// Iterative by design: a computed that loses its last subscriber is
    /// marked `DIRTY` and its own dependency chain is spliced onto this same
    /// walk, so transitive cleanup never consumes native stack.
    pub fn clear_tracking(&mut self, head: LinkId) {
        let mut cursor = Some(head);
        while let Some(id) = cursor {
            let Link {
                dep,
                next_dep,
                next_sub,
                prev_sub,
                ..
            } = *self.link(id);

            match next_sub {
                Some(next) => self.link_mut(next).prev_sub = prev_sub,
                None => self.node_mut(dep).subs_tail = prev_sub,
            }
            match prev_sub {
                Some(prev) => self.link_mut(prev).next_sub = next_sub,
                None => self.node_mut(dep).subs = next_sub,
            }
            self.free_link(id);

            if self.node(dep).subs.is_none() && self.node(dep).is_subscriber() {
                // Unobserved now; its cache cannot be trusted.
                self.node_mut(dep).flags.insert(SubscriberFlags::DIRTY);

                if let Some(dep_deps) = self.node(dep).deps {
                    let tail = self
                        .node(dep)
                        .deps_tail
                        .expect("non-empty dependency list has a tail");
                    self.link_mut(tail).next_dep = next_dep;
                    let node = self.node_mut(dep);
                    node.deps = None;
                    node.deps_tail = None;
                    cursor = Some(dep_deps);
                    continue;
                }
            }

            cursor = next_dep;
        }
    }
}
