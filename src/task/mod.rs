//! 任务管理：任务控制块、就绪队列、调度器与进程生命周期

mod id;
mod manager;
mod process;
mod processor;
#[allow(clippy::module_inception)]
mod task;

pub use id::{live_tasks, Tid, TASK_MAGIC};
pub use manager::TaskManager;
pub use process::{
    close, current_tid, dup2, exit, find_child, fork, get_file, new_address_space, open, spawn,
    wait, with_memory_set,
};
pub use processor::{
    block_current, check_preemption, current_task, exit_current, init,
    print_stats, ready_count, sleeping_count, start, stats, unblock, yield_current, SchedStats,
};
pub(crate) use processor::PROCESSOR;
pub use task::{TaskControlBlock, TaskControlBlockInner, TaskLink, TaskStatus};

use crate::config::{PRI_MAX, PRI_MIN};
use crate::error::ProcessError;
use crate::sync::refresh_priority;

/// 修改当前任务的原始优先级。
///
/// 有效优先级重新计算（不低于仍在等待其所持锁的捐赠者），
/// 若当前任务不再是优先级最高的就绪任务则让出 CPU。
pub fn set_priority(priority: usize) -> Result<(), ProcessError> {
    if !(PRI_MIN..=PRI_MAX).contains(&priority) {
        return Err(ProcessError::InvalidPriority(priority));
    }
    let task = current_task();
    task.inner_exclusive_access().base_priority = priority;
    refresh_priority(&task);
    drop(task);
    check_preemption();
    Ok(())
}

/// 当前任务的有效优先级
pub fn get_priority() -> usize {
    current_task().priority()
}
