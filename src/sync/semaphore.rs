//! 计数信号量
//!
//! 非负计数 + 先进先出的等待队列。`up` 有等待者时把这一次 up 直接交给
//! 队首等待者（计数不变），否则计数加一；`up` 从不让出 CPU，可在中断中调用。

use crate::hal::{intr_disable, intr_set_level};
use crate::sync::UPIntrFreeCell;
use crate::task::{block_current, current_task, unblock, TaskControlBlock, TaskLink};
use alloc::collections::VecDeque;
use alloc::sync::Arc;

pub struct Semaphore {
    pub inner: UPIntrFreeCell<SemaphoreInner>,
}

pub struct SemaphoreInner {
    pub count: usize,
    pub wait_queue: VecDeque<Arc<TaskControlBlock>>,
}

impl Semaphore {
    pub fn new(count: usize) -> Self {
        Self {
            inner: unsafe {
                UPIntrFreeCell::new(SemaphoreInner {
                    count,
                    wait_queue: VecDeque::new(),
                })
            },
        }
    }

    /// 唤醒一个等待者，没有等待者时计数加一
    pub fn up(&self) {
        self.up_handoff();
    }

    /// 同 `up`，返回被唤醒并接手这次 up 的等待者
    pub fn up_handoff(&self) -> Option<Arc<TaskControlBlock>> {
        let old = intr_disable();
        let waiter = self.inner.exclusive_session(|inner| {
            let waiter = inner.wait_queue.pop_front();
            if waiter.is_none() {
                inner.count += 1;
            }
            waiter
        });
        if let Some(task) = &waiter {
            task.inner_exclusive_access().dequeue(TaskLink::Wait);
            unblock(task);
        }
        intr_set_level(old);
        waiter
    }

    /// 计数为零时阻塞，直到被某次 `up` 唤醒
    pub fn down(&self) {
        let old = intr_disable();
        let acquired = self.inner.exclusive_session(|inner| {
            if inner.count > 0 {
                inner.count -= 1;
                true
            } else {
                false
            }
        });
        if !acquired {
            let task = current_task();
            task.inner_exclusive_access().enqueue(TaskLink::Wait);
            self.inner
                .exclusive_session(|inner| inner.wait_queue.push_back(Arc::clone(&task)));
            block_current();
        }
        intr_set_level(old);
    }

    /// 计数大于零时减一并返回 `true`，否则立即返回 `false`
    pub fn try_down(&self) -> bool {
        self.inner.exclusive_session(|inner| {
            if inner.count > 0 {
                inner.count -= 1;
                true
            } else {
                false
            }
        })
    }

    pub fn count(&self) -> usize {
        self.inner.exclusive_access().count
    }

    /// 正在等待的任务数
    pub fn waiters(&self) -> usize {
        self.inner.exclusive_access().wait_queue.len()
    }
}
