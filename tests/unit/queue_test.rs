//! Tests for the time-ordered event queue

use grid_client::core::{Event, EventKind, Status};
use grid_client::infra::EventQueue;
use rand::Rng;

#[test]
fn test_nothing_ready_before_time() {
    let mut q = EventQueue::new();
    q.put(50, Event::advance(0, Status::Created));
    assert!(!q.has_ready(49));
    assert_eq!(q.take_ready(49), None);
    assert_eq!(q.next_time(), Some(50));
    assert_eq!(q.len(), 1);
    assert!(q.has_ready(50));
}

#[test]
fn test_equal_times_keep_insertion_order() {
    let mut q = EventQueue::new();
    q.put(10, Event::advance(1, Status::Created));
    q.put(10, Event::advance(0, Status::Created));
    q.put(0, Event::recover());

    let (_, first) = q.take_ready(10).unwrap();
    assert_eq!(first.kind, EventKind::Recover);
    assert_eq!(q.take_ready(10).unwrap().1.slot, 1);
    assert_eq!(q.take_ready(10).unwrap().1.slot, 0);
}

#[test]
fn test_random_insertions_pop_sorted_and_stable() {
    let mut rng = rand::rng();
    let mut q = EventQueue::new();
    for seq in 0..500u32 {
        q.put(rng.random_range(0..50u64), seq);
    }

    let drained = q.drain();
    assert_eq!(drained.len(), 500);
    assert!(q.is_empty());
    for pair in drained.windows(2) {
        let ((t0, s0), (t1, s1)) = (pair[0], pair[1]);
        assert!(t0 < t1 || (t0 == t1 && s0 < s1), "{pair:?} out of order");
    }
}

#[test]
fn test_drain_empties_queue() {
    let mut q = EventQueue::new();
    q.put(5, "later");
    q.put(1, "sooner");
    assert_eq!(q.drain(), vec![(1, "sooner"), (5, "later")]);
    assert_eq!(q.next_time(), None);
}
