//! Integration tests for the skillbridge command bridge

mod test_utils;

mod lane_queues;
mod live_bridge;
