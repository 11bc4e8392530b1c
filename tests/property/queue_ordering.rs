//! Property-based tests for queue ordering and exactly-once delivery

use proptest::prelude::*;
use serde_json::Map;
use skillbridge::queue::LaneSet;
use skillbridge::{ExecutionContext, Lane};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
enum Op {
    Push(Lane),
    Drain(Lane),
}

fn lane_strategy() -> impl Strategy<Value = Lane> {
    prop_oneof![Just(Lane::Editor), Just(Lane::Game)]
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => lane_strategy().prop_map(Op::Push),
        1 => lane_strategy().prop_map(Op::Drain),
    ]
}

proptest! {
    /// Any interleaving of pushes and drains returns every command exactly once, per-lane FIFO
    #[test]
    fn prop_drains_partition_pushes_in_order(ops in prop::collection::vec(op_strategy(), 0..200)) {
        let lanes = LaneSet::new();
        let mut pushed: Vec<Vec<u64>> = vec![Vec::new(); Lane::COUNT];
        let mut drained: Vec<Vec<u64>> = vec![Vec::new(); Lane::COUNT];

        for op in &ops {
            match *op {
                Op::Push(lane) => {
                    let ctx = Arc::new(ExecutionContext::new(lane, "", Map::new(), Duration::from_secs(1)));
                    pushed[lane as usize].push(ctx.id().as_u64());
                    lanes.push(ctx);
                }
                Op::Drain(lane) => {
                    for ctx in lanes.drain(lane) {
                        prop_assert_eq!(ctx.lane(), lane);
                        drained[lane as usize].push(ctx.id().as_u64());
                    }
                }
            }
        }
        for lane in Lane::ALL {
            drained[lane as usize].extend(lanes.drain(lane).iter().map(|c| c.id().as_u64()));
        }

        prop_assert_eq!(pushed, drained);
        prop_assert_eq!(lanes.sizes().total(), 0);
    }

    /// Queue sizes always equal pushes minus drained items
    #[test]
    fn prop_sizes_track_pending(ops in prop::collection::vec(op_strategy(), 0..100)) {
        let lanes = LaneSet::new();
        let mut pending = [0usize; Lane::COUNT];

        for op in &ops {
            match *op {
                Op::Push(lane) => {
                    lanes.push(Arc::new(ExecutionContext::new(lane, "", Map::new(), Duration::from_secs(1))));
                    pending[lane as usize] += 1;
                }
                Op::Drain(lane) => {
                    prop_assert_eq!(lanes.drain(lane).len(), pending[lane as usize]);
                    pending[lane as usize] = 0;
                }
            }
            for lane in Lane::ALL {
                prop_assert_eq!(lanes.sizes().get(lane), pending[lane as usize]);
            }
        }
    }
}
