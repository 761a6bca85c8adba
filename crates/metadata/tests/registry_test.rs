//! Tests for the node registry.
//!
//! # Test Strategy
//!
//! 1. **Partition invariant**: random add/remove/distance sequences
//! 2. **Snapshot isolation**: captured views survive later writes
//! 3. **Thread safety**: readers running against a busy writer

use metadata::{HostId, NodeDistance, NodeInfo, NodeRegistry, NodeState, Topology};
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn info(id: u128, dc: &str) -> NodeInfo {
    NodeInfo::with_topology(
        HostId(id),
        format!("10.0.{}.{}:9042", id / 250, id % 250).parse().unwrap(),
        Some(dc.to_string()),
        None,
    )
}

fn dc1_local(info: &NodeInfo) -> NodeDistance {
    if info.datacenter.as_deref() == Some("dc1") {
        NodeDistance::Local
    } else {
        NodeDistance::Remote
    }
}

/// Every known node sits in exactly one group, and groups hold nothing else.
fn assert_partitioned(view: &Topology) {
    let mut seen = HashSet::new();
    for distance in NodeDistance::ALL {
        for node in view.group(distance).iter() {
            assert!(
                seen.insert(node.host_id()),
                "node {} appears in more than one group",
                node.host_id()
            );
            assert_eq!(view.distance(node.host_id()), Some(distance));
        }
    }
    assert_eq!(seen.len(), view.len(), "a known node is missing from every group");
}

// ============================================================================
// Partition Invariant
// ============================================================================

#[derive(Debug, Clone)]
enum Op {
    Add(u8, bool),
    Remove(u8),
    SetDistance(u8, u8),
    SetState(u8, u8),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..8, any::<bool>()).prop_map(|(id, local)| Op::Add(id, local)),
        (0u8..8).prop_map(Op::Remove),
        (0u8..8, 0u8..3).prop_map(|(id, d)| Op::SetDistance(id, d)),
        (0u8..8, 0u8..4).prop_map(|(id, s)| Op::SetState(id, s)),
    ]
}

proptest! {
    #[test]
    fn prop_every_node_in_exactly_one_group(ops in prop::collection::vec(op(), 1..64)) {
        let registry = NodeRegistry::new();
        for op in ops {
            match op {
                Op::Add(id, local) => {
                    let dc = if local { "dc1" } else { "dc2" };
                    registry.upsert(info(id as u128, dc), dc1_local);
                }
                Op::Remove(id) => {
                    registry.remove(HostId(id as u128));
                }
                Op::SetDistance(id, d) => {
                    let distance = NodeDistance::ALL[d as usize];
                    let _ = registry.set_distance(HostId(id as u128), distance);
                }
                Op::SetState(id, s) => {
                    let state = [
                        NodeState::Unknown,
                        NodeState::Up,
                        NodeState::Down,
                        NodeState::ForcedDown,
                    ][s as usize];
                    let _ = registry.set_state(HostId(id as u128), state);
                }
            }
            assert_partitioned(&registry.view());
        }
    }
}

// ============================================================================
// Snapshot Isolation
// ============================================================================

#[test]
fn test_view_survives_distance_change() {
    let registry = NodeRegistry::new();
    registry.upsert(info(1, "dc1"), dc1_local);
    registry.upsert(info(2, "dc1"), dc1_local);

    let before = registry.view();
    registry.set_distance(HostId(1), NodeDistance::Remote).unwrap();

    // The old view is still a valid partition of the old state.
    assert_eq!(before.group(NodeDistance::Local).len(), 2);
    assert_partitioned(&before);

    let after = registry.view();
    assert_eq!(after.group(NodeDistance::Local).len(), 1);
    assert_eq!(after.group(NodeDistance::Remote).len(), 1);
    assert_partitioned(&after);
}

#[test]
fn test_readd_after_remove_creates_fresh_node() {
    let registry = NodeRegistry::new();
    registry.upsert(info(1, "dc1"), dc1_local);
    let old = registry.get(HostId(1)).unwrap();

    registry.remove(HostId(1));
    registry.upsert(info(1, "dc1"), dc1_local);
    let new = registry.get(HostId(1)).unwrap();

    assert!(old.is_removed());
    assert!(!new.is_removed());
    assert!(!Arc::ptr_eq(&old, &new));
}

// ============================================================================
// Thread Safety
// ============================================================================

#[test]
fn test_readers_never_observe_torn_views() {
    let registry = NodeRegistry::new();
    for id in 0..16 {
        registry.upsert(info(id, "dc1"), dc1_local);
    }

    let done = AtomicBool::new(false);
    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                while !done.load(Ordering::Relaxed) {
                    assert_partitioned(&registry.view());
                }
            });
        }

        for round in 0..500u128 {
            let id = round % 16;
            let distance = NodeDistance::ALL[(round % 3) as usize];
            registry.set_distance(HostId(id), distance).unwrap();
            if round % 7 == 0 {
                registry.remove(HostId(id));
                registry.upsert(info(id, "dc2"), dc1_local);
            }
        }
        done.store(true, Ordering::Relaxed);
    });

    assert_eq!(registry.len(), 16);
    assert_partitioned(&registry.view());
}
