//! Propagation
//!
//! The graph walk that marks downstream subscribers stale after a source
//! mutation, and the one-level upgrade applied after a confirmed change.
//!
//! # How Marking Works
//!
//! `propagate` walks the subscriber graph reachable from the mutated
//! signal's first link. Only the signal's direct subscribers are provably
//! outdated, so only they receive `DIRTY`; everything deeper merely *might*
//! be stale and receives `PENDING_COMPUTED` (or `PENDING_EFFECT` when
//! reached through an effect, which is how nested effects ride on their
//! parent's notification). Nodes reached again along a second path have
//! their flags merged instead of being re-walked, so a pass visits each
//! edge at most once.
//!
//! Effects with no subscribers of their own are appended to the pending
//! queue in discovery order; everything else resolves lazily on its next
//! read or notification.
//!
//! # Bounded Stack
//!
//! Both walks here are iterative. `propagate` keeps its pending branches on
//! an explicit stack rather than the call stack, so native stack usage is
//! constant no matter how deep the user's graph is. This is a correctness
//! property, not an optimization.

use smallvec::SmallVec;

use super::node::{LinkId, SubscriberFlags};
use super::store::Graph;

impl Graph {
    /// Mark every subscriber reachable from `start` with the appropriate
    /// staleness level and queue leaf effects for notification.
    ///
    /// Called after a signal's value changes, with the head of the signal's
    /// subscriber list.
    pub fn propagate(&mut self, start: LinkId) {
        let mut current = start;
        let mut next = self.link(current).next_sub;
        let mut branches: SmallVec<[Option<LinkId>; 8]> = SmallVec::new();
        let mut target = SubscriberFlags::DIRTY;

        'top: loop {
            let sub = self.link(current).sub;
            let flags = self.node(sub).flags;
            let mut should_notify = false;

            if !flags.intersects(
                SubscriberFlags::TRACKING | SubscriberFlags::RECURSED | SubscriberFlags::PROPAGATED,
            ) {
                self.node_mut(sub).flags = flags | target | SubscriberFlags::NOTIFIED;
                should_notify = true;
            } else if flags.contains(SubscriberFlags::RECURSED)
                && !flags.contains(SubscriberFlags::TRACKING)
            {
                self.node_mut(sub).flags =
                    (flags - SubscriberFlags::RECURSED) | target | SubscriberFlags::NOTIFIED;
                should_notify = true;
            } else if !flags.intersects(SubscriberFlags::PROPAGATED)
                && self.is_valid_link(current, sub)
            {
                self.node_mut(sub).flags =
                    flags | SubscriberFlags::RECURSED | target | SubscriberFlags::NOTIFIED;
                should_notify = self.node(sub).subs.is_some();
            }

            if should_notify {
                if let Some(sub_subs) = self.node(sub).subs {
                    current = sub_subs;
                    if self.link(sub_subs).next_sub.is_some() {
                        // Multiple subscribers: remember where to resume at
                        // this level, then fan out.
                        branches.push(next);
                        next = self.link(current).next_sub;
                        target = SubscriberFlags::PENDING_COMPUTED;
                    } else if flags.contains(SubscriberFlags::EFFECT) {
                        target = SubscriberFlags::PENDING_EFFECT;
                    } else {
                        target = SubscriberFlags::PENDING_COMPUTED;
                    }
                    continue 'top;
                }
                if flags.contains(SubscriberFlags::EFFECT) {
                    self.queue_effect(sub);
                }
            } else if !flags.intersects(SubscriberFlags::TRACKING | target) {
                self.node_mut(sub).flags = flags | target | SubscriberFlags::NOTIFIED;
                if flags.contains(SubscriberFlags::EFFECT)
                    && !flags.contains(SubscriberFlags::NOTIFIED)
                {
                    self.queue_effect(sub);
                }
            } else if !flags.intersects(target)
                && flags.intersects(SubscriberFlags::PROPAGATED)
                && self.is_valid_link(current, sub)
            {
                self.node_mut(sub).flags = flags | target;
            }

            if let Some(link_id) = next {
                current = link_id;
                next = self.link(link_id).next_sub;
                target = if branches.is_empty() {
                    SubscriberFlags::DIRTY
                } else {
                    SubscriberFlags::PENDING_COMPUTED
                };
                continue 'top;
            }

            while let Some(saved) = branches.pop() {
                if let Some(link_id) = saved {
                    current = link_id;
                    next = self.link(link_id).next_sub;
                    target = if branches.is_empty() {
                        SubscriberFlags::DIRTY
                    } else {
                        SubscriberFlags::PENDING_COMPUTED
                    };
                    continue 'top;
                }
            }
            break;
        }
    }

    /// Upgrade `PENDING_COMPUTED` subscribers of a just-recomputed node to
    /// `DIRTY`, queueing any that are effects.
    ///
    /// Runs one level deep only: the ancestor's change is now confirmed for
    /// its direct subscribers, while deeper nodes stay pending and resolve
    /// lazily on their own next read or notification.
    pub fn shallow_propagate(&mut self, head: LinkId) {
        let mut cursor = Some(head);
        while let Some(link_id) = cursor {
            let sub = self.link(link_id).sub;
            let flags = self.node(sub).flags;
            if flags & (SubscriberFlags::PENDING_COMPUTED | SubscriberFlags::DIRTY)
                == SubscriberFlags::PENDING_COMPUTED
            {
                self.node_mut(sub).flags = flags | SubscriberFlags::DIRTY | SubscriberFlags::NOTIFIED;
                if flags.contains(SubscriberFlags::EFFECT)
                    && !flags.contains(SubscriberFlags::NOTIFIED)
                {
                    self.queue_effect(sub);
                }
            }
            cursor = self.link(link_id).next_sub;
        }
    }
}
