//! 带优先级捐赠的睡眠锁
//!
//! # Overview
//! 锁 = 初值为 1 的信号量 + 持有者 + 正在等待它的捐赠者集合。
//!
//! # Priority Donation
//! - 争用时，等待者加入锁的捐赠者集合，并把自己的有效优先级沿
//!   “持有者 -> 持有者正在等待的锁 -> 该锁的持有者” 链向上传递，最多 `MAX_DONATION_DEPTH` 层
//! - 任务的有效优先级 = max(原始优先级, 其持有的各锁上所有捐赠者的有效优先级)
//! - 释放锁或获得锁时按上式重新计算；就绪队列中的任务优先级改变后重新排队
//!
//! # Invariants
//! - 同一任务不能重复获取同一把锁，只有持有者可以释放
//! - 捐赠者集合中的任务都阻塞在该锁的信号量上
//! - 有任务等待的锁一定有持有者

use crate::config::MAX_DONATION_DEPTH;
use crate::hal::{intr_disable, intr_set_level};
use crate::sync::{Semaphore, UPIntrFreeCell};
use crate::task::{check_preemption, current_task, TaskControlBlock, TaskLink, PROCESSOR};
use alloc::sync::Arc;
use alloc::vec::Vec;

/// 锁的共享部分，任务控制块通过它记录“持有的锁”和“等待的锁”
pub struct LockCore {
    sema: Semaphore,
    state: UPIntrFreeCell<LockState>,
}

struct LockState {
    holder: Option<Arc<TaskControlBlock>>,
    donors: Vec<Arc<TaskControlBlock>>,
}

impl LockCore {
    fn holder(&self) -> Option<Arc<TaskControlBlock>> {
        self.state.exclusive_access().holder.clone()
    }

    /// 捐赠者中最高的有效优先级
    fn max_donation(&self) -> Option<usize> {
        self.state
            .exclusive_access()
            .donors
            .iter()
            .map(|d| d.priority())
            .max()
    }
}

pub struct Lock {
    core: Arc<LockCore>,
}

impl Lock {
    pub fn new() -> Self {
        Self {
            core: Arc::new(LockCore {
                sema: Semaphore::new(1),
                state: unsafe {
                    UPIntrFreeCell::new(LockState {
                        holder: None,
                        donors: Vec::new(),
                    })
                },
            }),
        }
    }

    /// 获取锁，必要时阻塞并向持有者捐赠优先级
    pub fn acquire(&self) {
        let old = intr_disable();
        let task = current_task();
        assert!(
            !self.is_held_by(&task),
            "lock: task {} acquired a lock it already holds",
            task.tid()
        );
        if self.core.sema.try_down() {
            self.take_ownership(&task);
        } else {
            self.core
                .state
                .exclusive_session(|s| s.donors.push(Arc::clone(&task)));
            task.inner_exclusive_access().waiting_on = Some(Arc::clone(&self.core));
            donate_priority(&task);
            self.core.sema.down();
            // release 已把锁连同其余捐赠一并交给本任务
            debug_assert!(self.is_held_by(&task));
        }
        intr_set_level(old);
    }

    /// 锁空闲时获取并返回 `true`，否则立即返回 `false`
    pub fn try_acquire(&self) -> bool {
        let old = intr_disable();
        let task = current_task();
        assert!(
            !self.is_held_by(&task),
            "lock: task {} acquired a lock it already holds",
            task.tid()
        );
        let acquired = self.core.sema.try_down();
        if acquired {
            self.take_ownership(&task);
        }
        intr_set_level(old);
        acquired
    }

    fn take_ownership(&self, task: &Arc<TaskControlBlock>) {
        self.core
            .state
            .exclusive_session(|s| s.holder = Some(Arc::clone(task)));
        task.inner_exclusive_access()
            .held_locks
            .push(Arc::clone(&self.core));
        refresh_priority(task);
    }

    /// 释放锁；有等待者时直接交给队首等待者，若因此有更高优先级的任务就绪，则让出 CPU
    ///
    /// 交接在关中断下完成，锁不存在“已释放但无持有者”的窗口，
    /// 之后到来的争用者总能找到持有者并向其捐赠。
    pub fn release(&self) {
        let old = intr_disable();
        let task = current_task();
        assert!(
            self.is_held_by(&task),
            "lock: task {} released a lock it does not hold",
            task.tid()
        );
        task.inner_exclusive_access()
            .held_locks
            .retain(|l| !Arc::ptr_eq(l, &self.core));
        refresh_priority(&task);
        drop(task);
        let next = self.core.sema.up_handoff();
        self.core.state.exclusive_session(|s| {
            if let Some(next) = &next {
                s.donors.retain(|d| !Arc::ptr_eq(d, next));
            }
            s.holder = next.clone();
        });
        if let Some(next) = next {
            {
                let mut inner = next.inner_exclusive_access();
                inner.waiting_on = None;
                inner.held_locks.push(Arc::clone(&self.core));
            }
            // 仍在等待本锁的捐赠者转而向新持有者捐赠
            refresh_priority(&next);
        }
        intr_set_level(old);
        check_preemption();
    }

    /// 当前任务是否持有本锁
    pub fn held_by_current(&self) -> bool {
        self.is_held_by(&current_task())
    }

    fn is_held_by(&self, task: &Arc<TaskControlBlock>) -> bool {
        self.core
            .holder()
            .is_some_and(|holder| Arc::ptr_eq(&holder, task))
    }
}

impl Default for Lock {
    fn default() -> Self {
        Self::new()
    }
}

/// 沿等待链把 `donor` 的有效优先级传给各级持有者
fn donate_priority(donor: &Arc<TaskControlBlock>) {
    let mut donor = Arc::clone(donor);
    for _ in 0..MAX_DONATION_DEPTH {
        let Some(lock) = donor.inner_exclusive_access().waiting_on.clone() else {
            break;
        };
        let Some(holder) = lock.holder() else {
            break;
        };
        let priority = donor.priority();
        if holder.priority() >= priority {
            break;
        }
        set_effective_priority(&holder, priority);
        donor = holder;
    }
}

/// 按原始优先级与所持锁上的捐赠重新计算有效优先级
pub fn refresh_priority(task: &Arc<TaskControlBlock>) {
    let (base, held) = {
        let inner = task.inner_exclusive_access();
        (inner.base_priority, inner.held_locks.clone())
    };
    let priority = held
        .iter()
        .filter_map(|lock| lock.max_donation())
        .fold(base, usize::max);
    set_effective_priority(task, priority);
}

fn set_effective_priority(task: &Arc<TaskControlBlock>, priority: usize) {
    let queued = {
        let mut inner = task.inner_exclusive_access();
        if inner.priority == priority {
            return;
        }
        inner.priority = priority;
        inner.link == TaskLink::Ready
    };
    if queued {
        PROCESSOR.exclusive_session(|p| p.reposition(task));
    }
}
