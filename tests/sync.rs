//! 同步原语：信号量守恒、锁的优先级捐赠、条件变量唤醒顺序

mod common;

use common::{settle, Trace};
use std::sync::Arc;
use taskcore::boot::run;
use taskcore::config::PRI_DEFAULT;
use taskcore::sync::{Condvar, Lock, Semaphore};
use taskcore::task::{get_priority, set_priority, spawn, wait, yield_current};

// ── 信号量 ────────────────────────────────────────────────────────────────────

#[test]
fn semaphore_ups_are_conserved() {
    let trace = Trace::new();
    let t = trace.clone();
    run("sema", PRI_DEFAULT, move || {
        let sema = Arc::new(Semaphore::new(0));
        let mut tids = Vec::new();
        for name in ["w1", "w2", "w3"] {
            let (t, sema) = (t.clone(), sema.clone());
            tids.push(
                spawn(name, 40, move || {
                    sema.down();
                    t.push(name);
                    0
                })
                .unwrap(),
            );
        }
        t.push(format!("waiting {}", sema.waiters()));
        for _ in 0..5 {
            sema.up();
        }
        t.push(format!("count {} waiting {}", sema.count(), sema.waiters()));
        for tid in tids {
            wait(tid).unwrap();
        }
        let taken = sema.try_down() as usize + sema.try_down() as usize + sema.try_down() as usize;
        t.push(format!("taken {}", taken));
        0
    });
    assert_eq!(
        trace.events(),
        ["waiting 3", "count 2 waiting 0", "w1", "w2", "w3", "taken 2"]
    );
}

#[test]
fn semaphore_ping_pong() {
    let trace = Trace::new();
    let t = trace.clone();
    run("ping", PRI_DEFAULT, move || {
        let ping = Arc::new(Semaphore::new(0));
        let pong = Arc::new(Semaphore::new(0));
        let child = {
            let (t, ping, pong) = (t.clone(), ping.clone(), pong.clone());
            spawn("pong", PRI_DEFAULT, move || {
                for i in 0..3 {
                    ping.down();
                    t.push(format!("pong {}", i));
                    pong.up();
                }
                0
            })
            .unwrap()
        };
        for i in 0..3 {
            t.push(format!("ping {}", i));
            ping.up();
            pong.down();
        }
        wait(child).unwrap()
    });
    assert_eq!(
        trace.events(),
        ["ping 0", "pong 0", "ping 1", "pong 1", "ping 2", "pong 2"]
    );
}

// ── 锁与优先级捐赠 ────────────────────────────────────────────────────────────

#[test]
fn lock_donation_single() {
    let trace = Trace::new();
    let t = trace.clone();
    run("donee", PRI_DEFAULT, move || {
        let lock = Arc::new(Lock::new());
        lock.acquire();
        let high = {
            let (t, lock) = (t.clone(), lock.clone());
            spawn("high", 40, move || {
                lock.acquire();
                t.push("high acquired");
                lock.release();
                0
            })
            .unwrap()
        };
        t.push(format!("boosted to {}", get_priority()));
        lock.release();
        t.push(format!("back to {}", get_priority()));
        wait(high).unwrap()
    });
    assert_eq!(
        trace.events(),
        ["boosted to 40", "high acquired", "back to 31"]
    );
}

#[test]
fn released_lock_passes_straight_to_waiter() {
    let trace = Trace::new();
    let t = trace.clone();
    run("handoff", PRI_DEFAULT, move || {
        let lock = Arc::new(Lock::new());
        lock.acquire();
        let waiter = {
            let (t, lock) = (t.clone(), lock.clone());
            spawn("waiter", 10, move || {
                lock.acquire();
                t.push(format!("waiter got lock at {}", get_priority()));
                lock.release();
                0
            })
            .unwrap()
        };
        set_priority(10).unwrap();
        yield_current();
        // 等待者已阻塞在锁上；释放后它就绪但尚未运行
        lock.release();
        set_priority(50).unwrap();
        let medium = {
            let t = t.clone();
            spawn("medium", 20, move || {
                t.push("medium ran");
                0
            })
            .unwrap()
        };
        let high = {
            let (t, lock) = (t.clone(), lock.clone());
            spawn("high", 60, move || {
                lock.acquire();
                t.push("high got lock");
                lock.release();
                0
            })
            .unwrap()
        };
        for tid in [high, medium, waiter] {
            wait(tid).unwrap();
        }
        0
    });
    assert_eq!(
        trace.events(),
        ["waiter got lock at 60", "high got lock", "medium ran"]
    );
}

#[test]
fn lock_donation_nested() {
    let trace = Trace::new();
    let t = trace.clone();
    run("nest", PRI_DEFAULT, move || {
        let a = Arc::new(Lock::new());
        let b = Arc::new(Lock::new());
        a.acquire();
        let medium = {
            let (t, a, b) = (t.clone(), a.clone(), b.clone());
            spawn("medium", 40, move || {
                b.acquire();
                a.acquire();
                t.push(format!("medium got a at {}", get_priority()));
                a.release();
                b.release();
                t.push(format!("medium done at {}", get_priority()));
                0
            })
            .unwrap()
        };
        t.push(format!("after medium {}", get_priority()));
        let high = {
            let (t, b) = (t.clone(), b.clone());
            spawn("high", 50, move || {
                b.acquire();
                t.push("high got b");
                b.release();
                0
            })
            .unwrap()
        };
        t.push(format!("after high {}", get_priority()));
        a.release();
        t.push(format!("released at {}", get_priority()));
        wait(medium).unwrap();
        wait(high).unwrap()
    });
    assert_eq!(
        trace.events(),
        [
            "after medium 40",
            "after high 50",
            "medium got a at 50",
            "high got b",
            "medium done at 40",
            "released at 31",
        ]
    );
}

#[test]
fn lock_donation_multiple_donors() {
    let trace = Trace::new();
    let t = trace.clone();
    run("multi", PRI_DEFAULT, move || {
        let a = Arc::new(Lock::new());
        let b = Arc::new(Lock::new());
        a.acquire();
        b.acquire();
        let mut tids = Vec::new();
        for (name, priority, lock) in [("on-a", 40, a.clone()), ("on-b", 50, b.clone())] {
            let t = t.clone();
            tids.push(
                spawn(name, priority, move || {
                    lock.acquire();
                    t.push(name);
                    lock.release();
                    0
                })
                .unwrap(),
            );
        }
        t.push(format!("holding both at {}", get_priority()));
        b.release();
        t.push(format!("holding a at {}", get_priority()));
        a.release();
        t.push(format!("holding none at {}", get_priority()));
        for tid in tids {
            wait(tid).unwrap();
        }
        0
    });
    assert_eq!(
        trace.events(),
        [
            "holding both at 50",
            "on-b",
            "holding a at 40",
            "on-a",
            "holding none at 31",
        ]
    );
}

#[test]
fn set_priority_during_donation_applies_after_release() {
    let trace = Trace::new();
    let t = trace.clone();
    run("lower-donee", PRI_DEFAULT, move || {
        let lock = Arc::new(Lock::new());
        lock.acquire();
        let high = {
            let (t, lock) = (t.clone(), lock.clone());
            spawn("high", 40, move || {
                lock.acquire();
                t.push("high acquired");
                lock.release();
                0
            })
            .unwrap()
        };
        set_priority(20).unwrap();
        t.push(format!("lowered to {}", get_priority()));
        lock.release();
        t.push(format!("released at {}", get_priority()));
        set_priority(PRI_DEFAULT).unwrap();
        wait(high).unwrap()
    });
    assert_eq!(
        trace.events(),
        ["lowered to 40", "high acquired", "released at 20"]
    );
}

#[test]
fn try_acquire_does_not_block_or_donate() {
    let trace = Trace::new();
    let t = trace.clone();
    run("try", PRI_DEFAULT, move || {
        let lock = Arc::new(Lock::new());
        lock.acquire();
        let tryer = {
            let (t, lock) = (t.clone(), lock.clone());
            spawn("tryer", 40, move || {
                t.push(format!("busy: {}", lock.try_acquire()));
                0
            })
            .unwrap()
        };
        t.push(format!("priority {}", get_priority()));
        lock.release();
        let free = lock.try_acquire();
        t.push(format!("free: {} held: {}", free, lock.held_by_current()));
        lock.release();
        wait(tryer).unwrap()
    });
    assert_eq!(
        trace.events(),
        ["busy: false", "priority 31", "free: true held: true"]
    );
}

// ── 条件变量 ──────────────────────────────────────────────────────────────────

#[test]
fn condvar_signal_wakes_highest_priority_first() {
    let trace = Trace::new();
    let t = trace.clone();
    run("cond", PRI_DEFAULT, move || {
        let lock = Arc::new(Lock::new());
        let cond = Arc::new(Condvar::new());
        let mut tids = Vec::new();
        for (name, priority) in [("p35", 35), ("p45", 45), ("p40", 40)] {
            let (t, lock, cond) = (t.clone(), lock.clone(), cond.clone());
            tids.push(
                spawn(name, priority, move || {
                    lock.acquire();
                    cond.wait(&lock);
                    t.push(name);
                    lock.release();
                    0
                })
                .unwrap(),
            );
        }
        for _ in 0..3 {
            lock.acquire();
            cond.signal(&lock);
            lock.release();
        }
        for tid in tids {
            wait(tid).unwrap();
        }
        0
    });
    assert_eq!(trace.events(), ["p45", "p40", "p35"]);
}

#[test]
fn condvar_broadcast_wakes_everyone() {
    let trace = Trace::new();
    let t = trace.clone();
    run("bcast", PRI_DEFAULT, move || {
        let lock = Arc::new(Lock::new());
        let cond = Arc::new(Condvar::new());
        let mut tids = Vec::new();
        for name in ["first", "second"] {
            let (t, lock, cond) = (t.clone(), lock.clone(), cond.clone());
            tids.push(
                spawn(name, 40, move || {
                    lock.acquire();
                    cond.wait(&lock);
                    t.push(name);
                    lock.release();
                    0
                })
                .unwrap(),
            );
        }
        lock.acquire();
        cond.broadcast(&lock);
        t.push("broadcast");
        lock.release();
        for tid in tids {
            wait(tid).unwrap();
        }
        settle();
        0
    });
    assert_eq!(trace.events(), ["broadcast", "first", "second"]);
}
