//! # 进程生命周期模块
//!
//! ## Overview
//! 父子任务之间的创建、复制、等待与退出协议，完全建立在任务控制块与信号量之上：
//! - `spawn`：创建子任务并放入就绪队列
//! - `fork`：创建子任务，由子任务自己复制父任务的地址空间与打开文件表，
//!   父任务在子任务的 fork 信号量上等待复制结果
//! - `wait`：等待子任务退出并取回退出码，之后放行子任务的回收
//! - `exit`：记录退出码、释放资源、通知父任务、放行未被等待的子任务，
//!   最后等待自己的拆除会合后进入 Dying
//!
//! ## Invariants
//! - 子任务的 `exit_sema` 只会被 up 一次：要么由 `wait`，要么由父任务的 `exit`
//! - 子任务一旦被 `wait` 回收就从父任务的子任务列表中移除
//! - fork 失败不会让内核崩溃：失败的子任务以 -1 退出，仍可被 `wait`
//!
//! ## Behavior
//! - 退出时按文件描述符从小到大关闭文件，关闭前先切回内核地址空间再销毁用户地址空间

use super::id::Tid;
use super::processor::{check_preemption, current_task, exit_current, unblock};
use super::TaskControlBlock;
use crate::config::FORK_FAILED_STATUS;
use crate::error::ProcessError;
use crate::fs::File;
use crate::hal::{activate, intr_enable, TaskContext};
use crate::mm::MemorySet;
use alloc::boxed::Box;
use alloc::sync::Arc;
use log::{debug, warn};

/// 创建子任务，返回其标识。
///
/// 子任务从 `entry` 开始执行，`entry` 的返回值作为退出码。
/// 若子任务优先级高于调用者，返回前调用者即被抢占。
pub fn spawn<F>(name: &str, priority: usize, entry: F) -> Result<Tid, ProcessError>
where
    F: FnOnce() -> i32 + Send + 'static,
{
    let parent = current_task();
    let task_cx = TaskContext::goto_entry(Box::new(move || {
        intr_enable();
        let status = entry();
        exit(status)
    }));
    let child = Arc::new(TaskControlBlock::new(name, priority, Some(&parent), task_cx)?);
    let tid = child.tid();
    parent.inner_exclusive_access().children.push(Arc::clone(&child));
    drop(parent);
    unblock(&child);
    drop(child);
    debug!("spawned task {} ({}) at priority {}", tid, name, priority);
    check_preemption();
    Ok(tid)
}

/// 复制当前任务。
///
/// 子任务以调用者的原始优先级运行，先复制调用者的地址空间与打开文件表，
/// 复制成功后执行 `child_main`，其返回值作为退出码。调用者在复制结束前保持阻塞。
///
/// ## Returns
/// - `Ok(tid)`：复制成功
/// - `Err(ProcessError::ForkFailed(tid))`：复制失败，子任务以 -1 退出，仍需 `wait`
pub fn fork<F>(name: &str, child_main: F) -> Result<Tid, ProcessError>
where
    F: FnOnce() -> i32 + Send + 'static,
{
    let parent = current_task();
    let source = Arc::clone(&parent);
    let task_cx = TaskContext::goto_entry(Box::new(move || {
        intr_enable();
        let copied = duplicate_resources(&source);
        drop(source);
        let task = current_task();
        if let Err(e) = &copied {
            warn!("fork: task {} failed to duplicate: {}", task.tid(), e);
            task.inner_exclusive_access().fork_failed = true;
        }
        task.fork_sema.up();
        drop(task);
        match copied {
            Ok(()) => exit(child_main()),
            Err(_) => {
                drop(child_main);
                exit(FORK_FAILED_STATUS)
            }
        }
    }));
    let priority = parent.base_priority();
    let child = Arc::new(TaskControlBlock::new(name, priority, Some(&parent), task_cx)?);
    let tid = child.tid();
    parent.inner_exclusive_access().children.push(Arc::clone(&child));
    drop(parent);
    unblock(&child);
    child.fork_sema.down();
    let failed = child.inner_exclusive_access().fork_failed;
    if failed {
        Err(ProcessError::ForkFailed(tid))
    } else {
        Ok(tid)
    }
}

/// 在子任务中复制父任务的地址空间与打开文件表。失败时已复制的部分随之释放。
fn duplicate_resources(parent: &Arc<TaskControlBlock>) -> Result<(), ProcessError> {
    let (memory_set, fd_table) = {
        let parent_inner = parent.inner_exclusive_access();
        let memory_set = match parent_inner.memory_set.as_ref() {
            Some(space) => Some(MemorySet::from_existed_user(space)?),
            None => None,
        };
        (memory_set, parent_inner.fd_table.duplicate())
    };
    let task = current_task();
    let mut inner = task.inner_exclusive_access();
    if let Some(space) = memory_set.as_ref() {
        activate(Some(space.token()));
    }
    inner.memory_set = memory_set;
    inner.fd_table = fd_table;
    Ok(())
}

/// 等待子任务 `tid` 退出，返回其退出码。
///
/// `tid` 不是调用者的子任务（包括已经被回收的子任务）时立即失败。
pub fn wait(tid: Tid) -> Result<i32, ProcessError> {
    let parent = current_task();
    let child = find_child_of(&parent, tid).ok_or(ProcessError::NotChild(tid))?;
    {
        let mut child_inner = child.inner_exclusive_access();
        assert!(!child_inner.waited, "wait: child {} already waited", tid);
        child_inner.waited = true;
    }
    child.wait_sema.down();
    let status = child.exit_code();
    parent
        .inner_exclusive_access()
        .children
        .retain(|c| !Arc::ptr_eq(c, &child));
    child.inner_exclusive_access().parent = None;
    child.exit_sema.up();
    Ok(status)
}

/// 结束当前任务，永不返回。
pub fn exit(status: i32) -> ! {
    let task = current_task();
    task.inner_exclusive_access().exit_code = status;
    println!("{}: exit({})", task.name(), status);

    // 按描述符从小到大关闭打开的文件
    let files = task.inner_exclusive_access().fd_table.take_all();
    drop(files);

    // 先切回内核地址空间，再销毁用户地址空间
    let space = task.inner_exclusive_access().memory_set.take();
    if let Some(space) = space {
        activate(None);
        drop(space);
    }

    task.wait_sema.up();

    // 未被等待的子任务不再有父任务，直接放行它们的回收
    let orphans = core::mem::take(&mut task.inner_exclusive_access().children);
    for child in orphans {
        child.inner_exclusive_access().parent = None;
        child.exit_sema.up();
    }

    task.exit_sema.down();
    drop(task);
    exit_current()
}

fn find_child_of(parent: &Arc<TaskControlBlock>, tid: Tid) -> Option<Arc<TaskControlBlock>> {
    parent
        .inner_exclusive_access()
        .children
        .iter()
        .find(|c| c.tid() == tid)
        .cloned()
}

/// 当前任务的子任务 `tid`
pub fn find_child(tid: Tid) -> Option<Arc<TaskControlBlock>> {
    find_child_of(&current_task(), tid)
}

/// 当前任务的标识
pub fn current_tid() -> Tid {
    current_task().tid()
}

/// 为当前任务创建一个空的地址空间并激活
pub fn new_address_space() {
    let space = MemorySet::new_bare();
    let token = space.token();
    let task = current_task();
    task.inner_exclusive_access().memory_set = Some(space);
    activate(Some(token));
}

/// 在当前任务的地址空间上执行 `f`。
///
/// `f` 执行期间持有当前任务的内部借用，不能调用其他任务操作。
pub fn with_memory_set<R>(f: impl FnOnce(&mut MemorySet) -> R) -> Result<R, ProcessError> {
    let task = current_task();
    let mut inner = task.inner_exclusive_access();
    let space = inner
        .memory_set
        .as_mut()
        .ok_or(ProcessError::NoAddressSpace)?;
    Ok(f(space))
}

/// 把 `file` 放入当前任务最小的空闲描述符
pub fn open(file: Arc<dyn File>) -> Result<usize, ProcessError> {
    current_task().inner_exclusive_access().fd_table.alloc(file)
}

/// 关闭描述符 `fd`
pub fn close(fd: usize) -> Result<(), ProcessError> {
    let file = current_task().inner_exclusive_access().fd_table.remove(fd)?;
    // 在释放 TCB 借用之后才真正关闭文件
    drop(file);
    Ok(())
}

/// 让 `new_fd` 指向与 `old_fd` 相同的打开文件，返回 `new_fd`
pub fn dup2(old_fd: usize, new_fd: usize) -> Result<usize, ProcessError> {
    let replaced = current_task()
        .inner_exclusive_access()
        .fd_table
        .dup2(old_fd, new_fd)?;
    drop(replaced);
    Ok(new_fd)
}

/// 描述符 `fd` 对应的打开文件
pub fn get_file(fd: usize) -> Option<Arc<dyn File>> {
    current_task().inner_exclusive_access().fd_table.get(fd)
}
