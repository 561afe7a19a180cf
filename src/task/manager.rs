//! 就绪队列
//!
//! 按有效优先级从高到低排列，同优先级内先进先出。空闲任务永不入队。

use super::{TaskControlBlock, TaskLink};
use alloc::collections::VecDeque;
use alloc::sync::Arc;

pub struct TaskManager {
    ready_queue: VecDeque<Arc<TaskControlBlock>>,
}

impl TaskManager {
    pub fn new() -> Self {
        Self {
            ready_queue: VecDeque::new(),
        }
    }

    /// 插入到同优先级任务之后
    pub fn add(&mut self, task: Arc<TaskControlBlock>) {
        task.inner_exclusive_access().enqueue(TaskLink::Ready);
        self.insert_ordered(task);
    }

    fn insert_ordered(&mut self, task: Arc<TaskControlBlock>) {
        let priority = task.priority();
        let pos = self
            .ready_queue
            .iter()
            .position(|t| t.priority() < priority)
            .unwrap_or(self.ready_queue.len());
        self.ready_queue.insert(pos, task);
    }

    /// 取出优先级最高的任务
    pub fn fetch(&mut self) -> Option<Arc<TaskControlBlock>> {
        let task = self.ready_queue.pop_front()?;
        task.inner_exclusive_access().dequeue(TaskLink::Ready);
        Some(task)
    }

    /// 队首任务的优先级
    pub fn peek_priority(&self) -> Option<usize> {
        self.ready_queue.front().map(|t| t.priority())
    }

    /// 任务优先级改变后重新排队（排到新优先级的末尾）
    pub fn reposition(&mut self, task: &Arc<TaskControlBlock>) {
        if let Some(idx) = self.ready_queue.iter().position(|t| Arc::ptr_eq(t, task)) {
            if let Some(task) = self.ready_queue.remove(idx) {
                self.insert_ordered(task);
            }
        }
    }

    /// 预留容量，保证之后 `additional` 次入队不再分配内存
    pub fn reserve(&mut self, additional: usize) {
        self.ready_queue.reserve(additional);
    }

    pub fn len(&self) -> usize {
        self.ready_queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ready_queue.is_empty()
    }
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}
