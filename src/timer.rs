//! 定时睡眠与时钟中断
//!
//! # Overview
//! - `SleepQueue`：按唤醒时刻排序的睡眠任务（同一时刻按入队顺序）
//! - `sleep_until` / `sleep`：阻塞当前任务直到指定时刻
//! - `timer_interrupt`：时钟中断处理，统计运行时间、唤醒到期任务、判断抢占
//!
//! # Invariants
//! - 每个睡眠任务恰好被唤醒一次，且不早于其唤醒时刻
//! - 中断上下文中的唤醒不分配内存：任务入睡时已为其在就绪队列中预留容量
//! - 时钟设备的触发点总是最早的唤醒时刻，队列为空时清除

use crate::hal::{get_time, intr_disable, intr_set_level, intr_yield_on_return};
use crate::task::{block_current, current_task, TaskControlBlock, PROCESSOR};
use alloc::collections::BinaryHeap;
use alloc::sync::Arc;
use core::cmp::Ordering;

pub struct TimerCondVar {
    pub expire: u64,
    seq: u64,
    pub task: Arc<TaskControlBlock>,
}

impl PartialEq for TimerCondVar {
    fn eq(&self, other: &Self) -> bool {
        self.expire == other.expire && self.seq == other.seq
    }
}
impl Eq for TimerCondVar {}
impl PartialOrd for TimerCondVar {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerCondVar {
    // BinaryHeap 是大顶堆，反转后最早到期、最先入队的在堆顶
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .expire
            .cmp(&self.expire)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// 睡眠队列
pub struct SleepQueue {
    timers: BinaryHeap<TimerCondVar>,
    next_seq: u64,
}

impl SleepQueue {
    pub fn new() -> Self {
        Self {
            timers: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    pub fn push(&mut self, expire: u64, task: Arc<TaskControlBlock>) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.timers.push(TimerCondVar { expire, seq, task });
    }

    /// 弹出一个唤醒时刻不晚于 `now` 的任务
    pub fn pop_due(&mut self, now: u64) -> Option<Arc<TaskControlBlock>> {
        if self.timers.peek()?.expire <= now {
            self.timers.pop().map(|t| t.task)
        } else {
            None
        }
    }

    /// 最早的唤醒时刻，队列为空时为 `None`
    pub fn next_deadline(&self) -> Option<u64> {
        self.timers.peek().map(|t| t.expire)
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}

impl Default for SleepQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// 阻塞当前任务直到时钟到达 `deadline`。`deadline` 已过时立即返回。
pub fn sleep_until(deadline: u64) {
    let old = intr_disable();
    if deadline > get_time() {
        let task = current_task();
        task.inner_exclusive_access().wake_tick = deadline;
        PROCESSOR.exclusive_session(|p| p.add_sleeper(deadline, Arc::clone(&task)));
        block_current();
    }
    intr_set_level(old);
}

/// 睡眠 `ticks` 个时钟滴答
pub fn sleep(ticks: u64) {
    if ticks > 0 {
        sleep_until(get_time() + ticks);
    }
}

/// 时钟中断处理
pub fn timer_interrupt() {
    let now = get_time();
    let preempt = PROCESSOR.exclusive_session(|p| {
        let slice_expired = p.account_tick();
        p.wake_sleepers(now);
        slice_expired || p.should_preempt()
    });
    if preempt {
        intr_yield_on_return();
    }
}

/// 空闲时快进跳过的滴答全部计为空闲时间
pub(crate) fn skip_idle_ticks(ticks: u64) {
    PROCESSOR.exclusive_session(|p| p.account_idle(ticks));
}
