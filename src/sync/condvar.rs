//! 条件变量（Mesa 语义），与 `Lock` 配合使用
//!
//! 每个等待者在自己的信号量上睡眠；`signal` 唤醒优先级最高的等待者，
//! 同优先级按等待顺序。被唤醒的任务需要重新获取锁后才从 `wait` 返回。

use crate::sync::{Lock, Semaphore, UPIntrFreeCell};
use crate::task::{current_task, TaskControlBlock};
use alloc::collections::VecDeque;
use alloc::sync::Arc;

struct Waiter {
    task: Arc<TaskControlBlock>,
    sema: Arc<Semaphore>,
}

pub struct Condvar {
    waiters: UPIntrFreeCell<VecDeque<Waiter>>,
}

impl Condvar {
    pub fn new() -> Self {
        Self {
            waiters: unsafe { UPIntrFreeCell::new(VecDeque::new()) },
        }
    }

    /// 原子地释放 `lock` 并等待，被唤醒后重新获取 `lock`
    pub fn wait(&self, lock: &Lock) {
        assert!(lock.held_by_current(), "condvar: wait without holding the lock");
        let sema = Arc::new(Semaphore::new(0));
        let waiter = Waiter {
            task: current_task(),
            sema: Arc::clone(&sema),
        };
        self.waiters.exclusive_session(|w| w.push_back(waiter));
        lock.release();
        sema.down();
        lock.acquire();
    }

    /// 唤醒一个等待者
    pub fn signal(&self, lock: &Lock) {
        assert!(lock.held_by_current(), "condvar: signal without holding the lock");
        let waiter = self.waiters.exclusive_session(|w| {
            let mut best: Option<(usize, usize)> = None;
            for (idx, waiter) in w.iter().enumerate() {
                let priority = waiter.task.priority();
                if best.map_or(true, |(_, p)| priority > p) {
                    best = Some((idx, priority));
                }
            }
            best.and_then(|(idx, _)| w.remove(idx))
        });
        if let Some(waiter) = waiter {
            waiter.sema.up();
        }
    }

    /// 唤醒全部等待者
    pub fn broadcast(&self, lock: &Lock) {
        while self.waiters.exclusive_access().len() > 0 {
            self.signal(lock);
        }
    }
}

impl Default for Condvar {
    fn default() -> Self {
        Self::new()
    }
}
