//! 调度：优先级顺序、创建时抢占、时间片、定时睡眠与空闲快进

mod common;

use common::{settle, ticks, Trace};
use taskcore::boot::run;
use taskcore::config::{PRI_DEFAULT, PRI_MAX, PRI_MIN, TIME_SLICE};
use taskcore::error::ProcessError;
use taskcore::hal::get_time;
use taskcore::task::{
    get_priority, ready_count, set_priority, sleeping_count, spawn, stats, wait, yield_current,
};
use taskcore::timer::{sleep, sleep_until};

// ── 就绪队列顺序 ──────────────────────────────────────────────────────────────

#[test]
fn ready_threads_run_by_priority_then_fifo() {
    let trace = Trace::new();
    let t = trace.clone();
    let status = run("order", PRI_MAX, move || {
        // 创建本作业的任务也在就绪队列中
        let queued = ready_count();
        let mut children = Vec::new();
        for (name, priority) in [("a", 10), ("b1", 20), ("d", 5), ("b2", 20), ("c", 10)] {
            let t = t.clone();
            children.push(
                spawn(name, priority, move || {
                    t.push(name);
                    0
                })
                .unwrap(),
            );
        }
        t.push(format!("spawned {}", ready_count() - queued));
        set_priority(PRI_MIN).unwrap();
        for tid in children {
            wait(tid).unwrap();
        }
        0
    });
    assert_eq!(status, 0);
    assert_eq!(trace.events(), ["spawned 5", "b1", "b2", "a", "c", "d"]);
}

#[test]
fn higher_priority_child_runs_before_spawn_returns() {
    let trace = Trace::new();
    let t = trace.clone();
    run("a5", 5, move || {
        t.push("a: before");
        let b = {
            let t = t.clone();
            spawn("b7", 7, move || {
                t.push("b: running");
                0
            })
            .unwrap()
        };
        t.push("a: after");
        wait(b).unwrap()
    });
    assert_eq!(trace.events(), ["a: before", "b: running", "a: after"]);
}

#[test]
fn lower_priority_child_waits_for_parent_to_block() {
    let trace = Trace::new();
    let t = trace.clone();
    run("high", 40, move || {
        let low = {
            let t = t.clone();
            spawn("low", 20, move || {
                t.push("low");
                0
            })
            .unwrap()
        };
        t.push("high");
        wait(low).unwrap()
    });
    assert_eq!(trace.events(), ["high", "low"]);
}

#[test]
fn yield_rotates_equal_priority_threads() {
    let trace = Trace::new();
    let t = trace.clone();
    run("rr", PRI_DEFAULT, move || {
        let mut tids = Vec::new();
        for name in ["x", "y"] {
            let t = t.clone();
            tids.push(
                spawn(name, PRI_DEFAULT, move || {
                    for i in 0..2 {
                        t.push(format!("{}{}", name, i));
                        yield_current();
                    }
                    0
                })
                .unwrap(),
            );
        }
        for tid in tids {
            wait(tid).unwrap();
        }
        0
    });
    assert_eq!(trace.events(), ["x0", "y0", "x1", "y1"]);
}

#[test]
fn yield_with_nothing_else_ready_keeps_running() {
    let result = run("solo", PRI_DEFAULT, || {
        for _ in 0..3 {
            yield_current();
        }
        ticks(2 * TIME_SLICE as u64);
        0
    });
    assert_eq!(result, 0);
}

#[test]
fn yield_does_not_hand_cpu_to_lower_priority() {
    let trace = Trace::new();
    let t = trace.clone();
    run("above", 40, move || {
        let low = {
            let t = t.clone();
            spawn("below", 20, move || {
                t.push("below");
                0
            })
            .unwrap()
        };
        yield_current();
        t.push("above yielded");
        ticks(TIME_SLICE as u64);
        t.push("above kept its slice");
        wait(low).unwrap()
    });
    assert_eq!(
        trace.events(),
        ["above yielded", "above kept its slice", "below"]
    );
}

#[test]
fn time_slice_expiry_preempts_at_equal_priority() {
    let trace = Trace::new();
    let t = trace.clone();
    run("slice", PRI_DEFAULT, move || {
        let other = {
            let t = t.clone();
            spawn("other", PRI_DEFAULT, move || {
                t.push("other");
                0
            })
            .unwrap()
        };
        // 上一次调度后已用掉的滴答数未知，最多一个完整时间片后必然被抢占
        for _ in 0..TIME_SLICE {
            if !t.events().is_empty() {
                break;
            }
            ticks(1);
        }
        t.push("slicer");
        wait(other).unwrap()
    });
    assert_eq!(trace.events(), ["other", "slicer"]);
}

// ── 优先级设置 ────────────────────────────────────────────────────────────────

#[test]
fn lowering_priority_yields_to_higher_ready_thread() {
    let trace = Trace::new();
    let t = trace.clone();
    run("lower", 40, move || {
        let mid = {
            let t = t.clone();
            spawn("mid", 30, move || {
                t.push("mid");
                0
            })
            .unwrap()
        };
        t.push(format!("before {}", get_priority()));
        set_priority(20).unwrap();
        t.push(format!("after {}", get_priority()));
        let invalid = set_priority(PRI_MAX + 1);
        t.push(format!("{:?}", invalid));
        wait(mid).unwrap()
    });
    assert_eq!(
        trace.events(),
        [
            "before 40".to_string(),
            "mid".to_string(),
            "after 20".to_string(),
            format!("{:?}", Err::<(), _>(ProcessError::InvalidPriority(PRI_MAX + 1))),
        ]
    );
}

// ── 定时睡眠 ──────────────────────────────────────────────────────────────────

#[test]
fn sleeper_wakes_exactly_at_deadline() {
    let trace = Trace::new();
    let t = trace.clone();
    run("clock", PRI_DEFAULT, move || {
        let start = get_time();
        let sleeper = {
            let t = t.clone();
            spawn("sleeper", 40, move || {
                sleep_until(start + 90);
                t.push(format!("woke at +{}", get_time() - start));
                0
            })
            .unwrap()
        };
        while get_time() < start + 89 {
            ticks(1);
        }
        t.push(format!("+{}: {} woken", get_time() - start, t.events().len()));
        ticks(1);
        t.push(format!("+{}", get_time() - start));
        wait(sleeper).unwrap()
    });
    assert_eq!(trace.events(), ["+89: 0 woken", "woke at +90", "+90"]);
}

#[test]
fn sleepers_wake_in_deadline_order() {
    let trace = Trace::new();
    let t = trace.clone();
    run("sleepers", PRI_DEFAULT, move || {
        let start = get_time();
        let mut tids = Vec::new();
        for (name, delay) in [("late", 30), ("early", 10), ("mid", 20), ("mid2", 20)] {
            let t = t.clone();
            tids.push(
                spawn(name, 40, move || {
                    sleep_until(start + delay);
                    t.push(format!("{}@{}", name, get_time() - start));
                    0
                })
                .unwrap(),
            );
        }
        t.push(format!("asleep {}", sleeping_count()));
        for tid in tids {
            wait(tid).unwrap();
        }
        0
    });
    assert_eq!(
        trace.events(),
        ["asleep 4", "early@10", "mid@20", "mid2@20", "late@30"]
    );
}

#[test]
fn past_deadline_returns_immediately() {
    let elapsed = run("past", PRI_DEFAULT, || {
        let start = get_time();
        sleep_until(start);
        sleep_until(start.saturating_sub(5));
        sleep(0);
        (get_time() - start) as i32
    });
    assert_eq!(elapsed, 0);
}

#[test]
fn idle_fast_forwards_to_next_deadline() {
    let result = run("nap", PRI_DEFAULT, || {
        let idle_before = stats().idle_ticks;
        let start = get_time();
        sleep(50);
        let slept = get_time() - start;
        let idle = stats().idle_ticks - idle_before;
        if slept == 50 && idle >= 49 {
            0
        } else {
            1
        }
    });
    assert_eq!(result, 0);
}

// ── 资源上限 ──────────────────────────────────────────────────────────────────

#[test]
fn spawn_fails_cleanly_at_task_limit() {
    let trace = Trace::new();
    let t = trace.clone();
    run("limit", PRI_DEFAULT, move || {
        let gate = std::sync::Arc::new(taskcore::sync::Semaphore::new(0));
        let mut tids = Vec::new();
        let err = loop {
            let gate = gate.clone();
            match spawn("parked", 40, move || {
                gate.down();
                0
            }) {
                Ok(tid) => tids.push(tid),
                Err(e) => break e,
            }
        };
        t.push(format!("{:?}", err));
        for _ in &tids {
            gate.up();
        }
        for tid in tids {
            wait(tid).unwrap();
        }
        settle();
        0
    });
    assert_eq!(trace.events(), [format!("{:?}", ProcessError::TooManyTasks)]);
}
