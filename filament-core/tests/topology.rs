//! Topology Tests
//!
//! These tests verify propagation across awkward graph shapes: diamonds,
//! re-converging paths, jagged depths, and computeds that bail out by
//! returning unchanged values.

use std::cell::{Cell, RefCell};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

use filament_core::ReactiveSystem;

/// Drop A->B->A->B "flag" updates.
///
/// ```text
///     A
///   / |
///  B  |
///   \ |
///     C
///     |
///     D
/// ```
#[test]
fn drops_aba_duplicate_updates() {
    let rs = ReactiveSystem::new();
    let calls = Rc::new(Cell::new(0));

    let a = rs.signal(2);
    let ar = a.clone();
    let b = rs.computed(move |_| ar.get() - 1);

    let ar2 = a.clone();
    let br = b.clone();
    let c = rs.computed(move |_| ar2.get() + br.get());

    let cr = c.clone();
    let counter = Rc::clone(&calls);
    let d = rs.computed(move |_| {
        counter.set(counter.get() + 1);
        format!("d: {}", cr.get())
    });

    assert_eq!(d.get(), "d: 3");
    assert_eq!(calls.get(), 1);

    a.set(4);
    d.get();
    assert_eq!(calls.get(), 2);
}

/// The classic diamond: D must update once per change of A.
///
/// ```text
///     A
///   /   \
///  B     C
///   \   /
///     D
/// ```
#[test]
fn diamond_updates_each_node_once() {
    let rs = ReactiveSystem::new();
    let calls = Rc::new(Cell::new(0));

    let a = rs.signal("a".to_string());
    let ar = a.clone();
    let b = rs.computed(move |_| ar.get());
    let ar2 = a.clone();
    let c = rs.computed(move |_| ar2.get());

    let br = b.clone();
    let cr = c.clone();
    let counter = Rc::clone(&calls);
    let d = rs.computed(move |_| {
        counter.set(counter.get() + 1);
        format!("{} {}", br.get(), cr.get())
    });

    assert_eq!(d.get(), "a a");
    assert_eq!(calls.get(), 1);
    calls.set(0);

    a.set("aa".to_string());
    assert_eq!(d.get(), "aa aa");
    assert_eq!(calls.get(), 1);
}

/// A diamond with a tail: E recomputes once per change, not twice.
///
/// ```text
///     A
///   /   \
///  B     C
///   \   /
///     D
///     |
///     E
/// ```
#[test]
fn diamond_tail_updates_once() {
    let rs = ReactiveSystem::new();
    let e_calls = Rc::new(Cell::new(0));

    let a = rs.signal("a".to_string());
    let ar = a.clone();
    let b = rs.computed(move |_| ar.get());
    let ar2 = a.clone();
    let c = rs.computed(move |_| ar2.get());

    let br = b.clone();
    let cr = c.clone();
    let d = rs.computed(move |_| format!("{} {}", br.get(), cr.get()));

    let dr = d.clone();
    let counter = Rc::clone(&e_calls);
    let e = rs.computed(move |_| {
        counter.set(counter.get() + 1);
        dr.get()
    });

    assert_eq!(e.get(), "a a");
    assert_eq!(e_calls.get(), 1);

    a.set("aa".to_string());
    assert_eq!(e.get(), "aa aa");
    assert_eq!(e_calls.get(), 2);
}

/// A computed returning the same value stops propagation behind it.
///
/// A -> B -> C, where B always returns "foo".
#[test]
fn bails_out_when_intermediate_value_is_unchanged() {
    let rs = ReactiveSystem::new();
    let calls = Rc::new(Cell::new(0));

    let a = rs.signal("a".to_string());
    let ar = a.clone();
    let b = rs.computed(move |_| {
        ar.get();
        "foo".to_string()
    });

    let br = b.clone();
    let counter = Rc::clone(&calls);
    let c = rs.computed(move |_| {
        counter.set(counter.get() + 1);
        br.get()
    });

    assert_eq!(c.get(), "foo");
    assert_eq!(calls.get(), 1);

    a.set("aa".to_string());
    assert_eq!(c.get(), "foo");
    assert_eq!(calls.get(), 1);
}

/// Jagged diamond with two tails: F and G each update exactly once, and
/// recomputation order is topological depth first, then declaration order
/// among siblings.
///
/// ```text
///     A
///   /   \
///  B     C
///  |     |
///  |     D
///   \   /
///     E
///   /   \
///  F     G
/// ```
#[test]
fn jagged_diamond_tails_update_once_in_order() {
    let rs = ReactiveSystem::new();
    let order: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));

    let a = rs.signal("a".to_string());
    let ar = a.clone();
    let b = rs.computed(move |_| ar.get());
    let ar2 = a.clone();
    let c = rs.computed(move |_| ar2.get());
    let cr = c.clone();
    let d = rs.computed(move |_| cr.get());

    let br = b.clone();
    let dr = d.clone();
    let log = Rc::clone(&order);
    let e = rs.computed(move |_| {
        let value = format!("{} {}", br.get(), dr.get());
        log.borrow_mut().push("e");
        value
    });

    let er = e.clone();
    let log = Rc::clone(&order);
    let f = rs.computed(move |_| {
        let value = er.get();
        log.borrow_mut().push("f");
        value
    });

    let er2 = e.clone();
    let log = Rc::clone(&order);
    let g = rs.computed(move |_| {
        let value = er2.get();
        log.borrow_mut().push("g");
        value
    });

    assert_eq!(f.get(), "a a");
    assert_eq!(g.get(), "a a");
    order.borrow_mut().clear();

    a.set("b".to_string());
    assert_eq!(e.get(), "b b");
    assert_eq!(f.get(), "b b");
    assert_eq!(g.get(), "b b");
    assert_eq!(*order.borrow(), vec!["e", "f", "g"]);
    order.borrow_mut().clear();

    a.set("c".to_string());
    assert_eq!(e.get(), "c c");
    assert_eq!(f.get(), "c c");
    assert_eq!(g.get(), "c c");
    assert_eq!(*order.borrow(), vec!["e", "f", "g"]);
}

/// A computed nobody listens to never runs.
#[test]
fn subscribes_only_to_signals_listened_to() {
    let rs = ReactiveSystem::new();
    let calls = Rc::new(Cell::new(0));

    let a = rs.signal("a".to_string());
    let ar = a.clone();
    let b = rs.computed(move |_| ar.get());

    let ar2 = a.clone();
    let counter = Rc::clone(&calls);
    let _ignored = rs.computed(move |_| {
        counter.set(counter.get() + 1);
        ar2.get()
    });

    assert_eq!(b.get(), "a");
    assert_eq!(calls.get(), 0);

    a.set("aa".to_string());
    assert_eq!(b.get(), "aa");
    assert_eq!(calls.get(), 0);
}

/// A chain that loses its listener receives no further updates.
#[test]
fn unsubscribed_chain_receives_no_updates() {
    let rs = ReactiveSystem::new();
    let b_calls = Rc::new(Cell::new(0));
    let c_calls = Rc::new(Cell::new(0));

    let a = rs.signal("a".to_string());
    let ar = a.clone();
    let b_counter = Rc::clone(&b_calls);
    let b = rs.computed(move |_| {
        b_counter.set(b_counter.get() + 1);
        ar.get()
    });

    let br = b.clone();
    let c_counter = Rc::clone(&c_calls);
    let c = rs.computed(move |_| {
        c_counter.set(c_counter.get() + 1);
        br.get()
    });

    let ar2 = a.clone();
    let d = rs.computed(move |_| ar2.get());

    let result = Rc::new(RefCell::new(String::new()));
    let cr = c.clone();
    let out = Rc::clone(&result);
    let stop = rs.effect(move || {
        *out.borrow_mut() = cr.get();
        Ok(())
    });

    assert_eq!(*result.borrow(), "a");
    assert_eq!(d.get(), "a");

    b_calls.set(0);
    c_calls.set(0);
    stop.stop();

    a.set("aa".to_string());
    assert_eq!(b_calls.get(), 0);
    assert_eq!(c_calls.get(), 0);
    assert_eq!(d.get(), "aa");
}

/// One path confirms a change even though the other path unmarks.
///
/// ```text
///     A
///   /   \
///  B     *C   <- returns the same value every time
///   \   /
///     D
/// ```
#[test]
fn updates_subscriber_even_if_one_path_unmarks_it() {
    let rs = ReactiveSystem::new();
    let d_calls = Rc::new(Cell::new(0));

    let a = rs.signal("a".to_string());
    let ar = a.clone();
    let b = rs.computed(move |_| ar.get());
    let ar2 = a.clone();
    let c = rs.computed(move |_| {
        ar2.get();
        "c".to_string()
    });

    let br = b.clone();
    let cr = c.clone();
    let counter = Rc::clone(&d_calls);
    let d = rs.computed(move |_| {
        counter.set(counter.get() + 1);
        format!("{} {}", br.get(), cr.get())
    });

    assert_eq!(d.get(), "a c");
    assert_eq!(d_calls.get(), 1);

    a.set("aa".to_string());
    assert_eq!(d.get(), "aa c");
}

/// Two of three paths unmark, the third confirms: still exactly one
/// recompute of the shared descendant.
///
/// ```text
///     A
///   / | \
///  B *C *D
///   \ | /
///     E
/// ```
#[test]
fn updates_subscriber_even_if_two_paths_unmark_it() {
    let rs = ReactiveSystem::new();
    let e_calls = Rc::new(Cell::new(0));

    let a = rs.signal("a".to_string());
    let ar = a.clone();
    let b = rs.computed(move |_| ar.get());
    let ar2 = a.clone();
    let c = rs.computed(move |_| {
        ar2.get();
        "c".to_string()
    });
    let ar3 = a.clone();
    let d = rs.computed(move |_| {
        ar3.get();
        "d".to_string()
    });

    let br = b.clone();
    let cr = c.clone();
    let dr = d.clone();
    let counter = Rc::clone(&e_calls);
    let e = rs.computed(move |_| {
        counter.set(counter.get() + 1);
        format!("{} {} {}", br.get(), cr.get(), dr.get())
    });

    assert_eq!(e.get(), "a c d");
    assert_eq!(e_calls.get(), 1);

    a.set("aa".to_string());
    assert_eq!(e.get(), "aa c d");
    assert_eq!(e_calls.get(), 2);
}

/// Every path unmarks: the shared descendant must not recompute at all.
///
/// ```text
///     A
///   /   \
/// *B     *C
///   \   /
///     D
/// ```
#[test]
fn skips_subscriber_when_all_paths_unmark_it() {
    let rs = ReactiveSystem::new();
    let d_calls = Rc::new(Cell::new(0));

    let a = rs.signal("a".to_string());
    let ar = a.clone();
    let b = rs.computed(move |_| {
        ar.get();
        "b".to_string()
    });
    let ar2 = a.clone();
    let c = rs.computed(move |_| {
        ar2.get();
        "c".to_string()
    });

    let br = b.clone();
    let cr = c.clone();
    let counter = Rc::clone(&d_calls);
    let d = rs.computed(move |_| {
        counter.set(counter.get() + 1);
        format!("{} {}", br.get(), cr.get())
    });

    assert_eq!(d.get(), "b c");
    assert_eq!(d_calls.get(), 1);
    d_calls.set(0);

    a.set("aa".to_string());
    assert_eq!(d_calls.get(), 0);
}

/// A panicking getter leaves the graph usable.
#[test]
fn keeps_graph_consistent_on_getter_panic() {
    let rs = ReactiveSystem::new();

    let a = rs.signal(0);
    let b = rs.computed(move |_: Option<&i32>| -> i32 { panic!("getter failed") });

    let result = catch_unwind(AssertUnwindSafe(|| b.get()));
    assert!(result.is_err());

    a.set(1);
    assert_eq!(a.get(), 1);
}

/// A panicking getter does not disturb a sibling computed on the same
/// signal.
#[test]
fn sibling_computed_survives_getter_panic() {
    let rs = ReactiveSystem::new();

    let a = rs.signal(0);
    let b = rs.computed(move |_: Option<&i32>| -> i32 { panic!("getter failed") });
    let ar = a.clone();
    let c = rs.computed(move |_| ar.get());

    let result = catch_unwind(AssertUnwindSafe(|| b.get()));
    assert!(result.is_err());

    a.set(1);
    assert_eq!(c.get(), 1);
}
