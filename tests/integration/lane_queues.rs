//! Integration tests for lane queues and the tick scheduler
//!
//! Tests cover:
//! - Exactly-once delivery under concurrent producers and a draining consumer
//! - Per-lane FIFO regardless of cross-lane interleaving
//! - Fault isolation within a batch
//! - Wait/signal timing

use super::test_utils::command;
use serde_json::{json, Map, Value};
use skillbridge::dispatcher::{Dispatcher, Namespace, PayloadInterpreter, ScriptFault};
use skillbridge::queue::LaneSet;
use skillbridge::scheduler::Scheduler;
use skillbridge::script::{HostState, ScriptInterpreter};
use skillbridge::{ExecutionContext, Lane, WaitStatus};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[test]
fn test_concurrent_push_and_drain_delivers_exactly_once() {
    const PRODUCERS: usize = 8;
    const PER_PRODUCER: usize = 250;

    let lanes = Arc::new(LaneSet::new());
    let producers: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let lanes = Arc::clone(&lanes);
            std::thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    let lane = if (p + i) % 2 == 0 { Lane::Editor } else { Lane::Game };
                    lanes.push(command(lane, &format!("{}:{}", p, i)));
                }
            })
        })
        .collect();

    let mut seen: Vec<(Lane, String)> = Vec::new();
    let total = PRODUCERS * PER_PRODUCER;
    let deadline = Instant::now() + Duration::from_secs(30);
    while seen.len() < total && Instant::now() < deadline {
        for lane in Lane::ALL {
            for ctx in lanes.drain(lane) {
                seen.push((lane, ctx.script().to_string()));
            }
        }
    }
    for producer in producers {
        producer.join().unwrap();
    }
    for lane in Lane::ALL {
        for ctx in lanes.drain(lane) {
            seen.push((lane, ctx.script().to_string()));
        }
    }

    assert_eq!(seen.len(), total);
    let unique: HashSet<&String> = seen.iter().map(|(_, s)| s).collect();
    assert_eq!(unique.len(), total);

    // Each producer's commands come out of each lane in the order that producer pushed them
    for lane in Lane::ALL {
        let mut last: Vec<Option<usize>> = vec![None; PRODUCERS];
        for (_, script) in seen.iter().filter(|(l, _)| *l == lane) {
            let (p, i) = script.split_once(':').unwrap();
            let (p, i): (usize, usize) = (p.parse().unwrap(), i.parse().unwrap());
            if let Some(prev) = last[p] {
                assert!(i > prev, "lane {} reordered producer {}", lane, p);
            }
            last[p] = Some(i);
        }
    }
}

/// Appends each script to the environment and faults on scripts starting with "!"
struct Journal;

impl PayloadInterpreter for Journal {
    type Environment = Vec<String>;

    fn interpret(
        &self,
        script: &str,
        namespace: &mut Namespace<'_, Vec<String>>,
    ) -> Result<(), ScriptFault> {
        namespace.environment.push(script.to_string());
        if script.starts_with('!') {
            return Err(ScriptFault::new(format!("rejected {}", script)));
        }
        namespace.result = Value::String(script.to_uppercase());
        Ok(())
    }
}

#[test]
fn test_tick_runs_editor_then_game_in_push_order() {
    let lanes = Arc::new(LaneSet::new());
    for script in ["g1", "g2"] {
        lanes.push(command(Lane::Game, script));
    }
    for script in ["e1", "!e2", "e3"] {
        lanes.push(command(Lane::Editor, script));
    }

    let mut scheduler = Scheduler::new(Arc::clone(&lanes), Dispatcher::new(Journal, Vec::new()));
    let report = scheduler.on_tick(Duration::from_millis(16));

    assert_eq!(report.executed, 5);
    assert_eq!(report.failed, 1);
    assert_eq!(
        scheduler.dispatcher().environment(),
        &vec!["e1", "!e2", "e3", "g1", "g2"]
    );
    assert_eq!(lanes.sizes().total(), 0);
    assert!(scheduler.on_tick(Duration::from_millis(16)).is_idle());
}

#[test]
fn test_fault_does_not_block_later_commands() {
    let lanes = Arc::new(LaneSet::new());
    let bad = command(Lane::Editor, "result = params['missing']");
    let good = command(Lane::Editor, "result = 7");
    lanes.push(Arc::clone(&bad));
    lanes.push(Arc::clone(&good));

    let mut scheduler = Scheduler::new(
        Arc::clone(&lanes),
        Dispatcher::new(ScriptInterpreter, HostState::new()),
    );
    scheduler.on_tick(Duration::ZERO);

    let bad = bad.to_outcome();
    assert!(!bad.success);
    assert!(bad.error.unwrap().message.contains("KeyError"));
    assert_eq!(good.to_outcome().into_result().unwrap(), json!(7));
}

#[test]
fn test_waiter_released_when_host_thread_completes() {
    let lanes = Arc::new(LaneSet::new());
    let ctx = Arc::new(ExecutionContext::new(
        Lane::Game,
        "result['ok'] = true",
        Map::new(),
        Duration::from_secs(5),
    ));
    lanes.push(Arc::clone(&ctx));

    let host_lanes = Arc::clone(&lanes);
    let host = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(20));
        let mut scheduler = Scheduler::new(
            host_lanes,
            Dispatcher::new(ScriptInterpreter, HostState::new()),
        );
        scheduler.on_tick(Duration::from_millis(20))
    });

    let started = Instant::now();
    assert_eq!(ctx.wait(ctx.timeout()), WaitStatus::Signaled);
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(host.join().unwrap().executed, 1);
    assert_eq!(ctx.to_outcome().into_result().unwrap(), json!({"ok": true}));
}

#[test]
fn test_wait_times_out_within_bound_when_not_drained() {
    let ctx = command(Lane::Editor, "loop");
    let started = Instant::now();
    assert_eq!(ctx.wait(Duration::from_millis(10)), WaitStatus::TimedOut);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(10));
    assert!(elapsed < Duration::from_millis(500));
}

#[test]
fn test_long_operator_chain_runs_on_host_thread() {
    // ~600 KB of `1 + 1 + ...`
    let terms = 300_000;
    let script = format!("result = 1{}", " + 1".repeat(terms));
    let lanes = Arc::new(LaneSet::new());
    let chain = command(Lane::Editor, &script);
    let after = command(Lane::Editor, "result = 7");
    lanes.push(Arc::clone(&chain));
    lanes.push(Arc::clone(&after));

    let host_lanes = Arc::clone(&lanes);
    let host = std::thread::spawn(move || {
        let mut scheduler = Scheduler::new(
            host_lanes,
            Dispatcher::new(ScriptInterpreter, HostState::new()),
        );
        scheduler.on_tick(Duration::ZERO)
    });

    let report = host.join().expect("host thread survives the tick");
    assert_eq!(report.executed, 2);
    assert_eq!(
        chain.to_outcome().into_result().unwrap(),
        json!(terms as i64 + 1)
    );
    assert_eq!(after.to_outcome().into_result().unwrap(), json!(7));
}

#[test]
fn test_deep_nesting_is_a_syntax_fault_not_a_crash() {
    let lanes = Arc::new(LaneSet::new());
    let parens = command(
        Lane::Editor,
        &format!("result = {}1{}", "(".repeat(200_000), ")".repeat(200_000)),
    );
    let negations = command(Lane::Game, &format!("result = {}1", "- ".repeat(200_000)));
    let after = command(Lane::Game, "result = 'still alive'");
    lanes.push(Arc::clone(&parens));
    lanes.push(Arc::clone(&negations));
    lanes.push(Arc::clone(&after));

    let host_lanes = Arc::clone(&lanes);
    let host = std::thread::spawn(move || {
        let mut scheduler = Scheduler::new(
            host_lanes,
            Dispatcher::new(ScriptInterpreter, HostState::new()),
        );
        scheduler.on_tick(Duration::ZERO)
    });

    let report = host.join().expect("host thread survives the tick");
    assert_eq!(report.executed, 3);
    assert_eq!(report.failed, 2);
    for ctx in [&parens, &negations] {
        let outcome = ctx.to_outcome();
        assert!(!outcome.success);
        let message = outcome.error.unwrap().message;
        assert!(message.contains("SyntaxError"), "{}", message);
        assert!(message.contains("nested too deeply"), "{}", message);
    }
    assert_eq!(
        after.to_outcome().into_result().unwrap(),
        json!("still alive")
    );
}
