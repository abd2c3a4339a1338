//! Property-based tests for queue ordering and membership.

use super::{Queue, QueueEntry};
use crate::events::EventBus;
use crate::{RequesterId, Tier};
use proptest::prelude::*;
use std::collections::HashSet;
use std::time::{Duration, SystemTime};

#[derive(Debug, Clone)]
enum Op {
    Enqueue(i64),
    Dequeue,
    Remove(i64),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0i64..20).prop_map(Op::Enqueue),
        1 => Just(Op::Dequeue),
        1 => (0i64..20).prop_map(Op::Remove),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 2000,
        .. ProptestConfig::default()
    })]

    // Dequeue order always equals arrival order, whatever the interleaving
    #[test]
    fn dequeue_follows_arrival(ops in prop::collection::vec(op_strategy(), 0..60)) {
        let queue = Queue::new(Tier::High, EventBus::new());
        let mut model: Vec<i64> = Vec::new();
        let mut seq = 0i64;

        for op in ops {
            match op {
                Op::Enqueue(id) => {
                    seq += 1;
                    let inserted = queue.enqueue(QueueEntry {
                        seq,
                        requester_id: RequesterId(id),
                        tier: Tier::High,
                        enqueued_at: SystemTime::UNIX_EPOCH + Duration::from_millis(seq as u64),
                    });
                    prop_assert_eq!(inserted, !model.contains(&id));
                    if inserted {
                        model.push(id);
                    }
                }
                Op::Dequeue => {
                    let head = queue.dequeue_front().map(|e| e.requester_id.0);
                    let expected = if model.is_empty() { None } else { Some(model.remove(0)) };
                    prop_assert_eq!(head, expected);
                }
                Op::Remove(id) => {
                    let found = queue.remove_by_id(RequesterId(id));
                    let before = model.len();
                    model.retain(|m| *m != id);
                    prop_assert_eq!(found, before != model.len());
                }
            }

            let snapshot: Vec<i64> = queue.snapshot().iter().map(|e| e.requester_id.0).collect();
            prop_assert_eq!(&snapshot, &model);
        }
    }

    // Membership is exactly-once no matter how often a requester is added
    #[test]
    fn membership_is_unique(ids in prop::collection::vec(0i64..10, 0..50)) {
        let queue = Queue::new(Tier::Low, EventBus::new());
        for (seq, id) in ids.iter().enumerate() {
            queue.enqueue(QueueEntry {
                seq: seq as i64,
                requester_id: RequesterId(*id),
                tier: Tier::Low,
                enqueued_at: SystemTime::now(),
            });
        }
        let distinct: HashSet<_> = ids.iter().collect();
        prop_assert_eq!(queue.size(), distinct.len());
    }
}
