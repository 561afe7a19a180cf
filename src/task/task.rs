//! # 任务控制块（TaskControlBlock）模块
//!
//! ## Overview
//! 每个可调度的执行上下文对应一个任务控制块（TCB），保存：
//! - 身份：任务标识、名字、完整性标记
//! - 调度：状态、有效优先级与原始优先级、所在队列标记、唤醒时刻
//! - 硬件上下文（`TaskContext`）与可选的地址空间
//! - 生命周期：父任务弱引用、子任务列表、退出码、fork 结果、三个会合信号量
//! - 打开文件表与优先级捐赠记录
//!
//! ## Invariants
//! - 有效优先级 >= 原始优先级
//! - 一个 TCB 至多位于一个队列中（就绪队列、睡眠队列或某个信号量的等待队列），
//!   由 `link` 记录；重复入队是内核 bug
//! - 父任务持有子任务的强引用，子任务只持有父任务的弱引用
//!
//! ## Behavior
//! - 新建的 TCB 处于 `Blocked` 状态，由创建者 `unblock` 放入就绪队列
//! - 没有父任务的 TCB（main、idle）的拆除信号量预先置 1，退出时无需等待回收

use super::id::{tid_alloc, Tid, TidHandle, TASK_MAGIC};
use crate::config::PRI_MAX;
use crate::error::ProcessError;
use crate::fs::FdTable;
use crate::hal::TaskContext;
use crate::mm::MemorySet;
use crate::sync::{LockCore, Semaphore, UPIntrFreeCell, UPIntrRefMut};
use alloc::string::String;
use alloc::sync::{Arc, Weak};
use alloc::vec::Vec;

/// 任务控制块
pub struct TaskControlBlock {
    tid: TidHandle,
    name: String,
    magic: u32,
    /// fork：子任务复制完父任务资源后 up，父任务在其上等待
    pub fork_sema: Semaphore,
    /// wait：任务退出时 up，父任务在其上等待退出码
    pub wait_sema: Semaphore,
    /// 拆除会合：父任务读走退出码（或父任务自己退出）后 up，
    /// 退出中的任务在其上等待，之后才允许被回收
    pub exit_sema: Semaphore,
    /// 内部可变状态，由 UPIntrFreeCell 保护
    inner: UPIntrFreeCell<TaskControlBlockInner>,
}

impl TaskControlBlock {
    /// 创建一个新的任务控制块
    ///
    /// ## Parameters
    /// - `priority`：初始优先级（同时作为原始优先级）
    /// - `parent`：创建者；`None` 表示无父任务
    /// - `task_cx`：第一次被调度时恢复的上下文
    pub fn new(
        name: &str,
        priority: usize,
        parent: Option<&Arc<TaskControlBlock>>,
        task_cx: TaskContext,
    ) -> Result<Self, ProcessError> {
        if priority > PRI_MAX {
            return Err(ProcessError::InvalidPriority(priority));
        }
        let tid = tid_alloc().ok_or(ProcessError::TooManyTasks)?;
        Ok(Self {
            tid,
            name: String::from(name),
            magic: TASK_MAGIC,
            fork_sema: Semaphore::new(0),
            wait_sema: Semaphore::new(0),
            exit_sema: Semaphore::new(if parent.is_some() { 0 } else { 1 }),
            inner: unsafe {
                UPIntrFreeCell::new(TaskControlBlockInner {
                    status: TaskStatus::Blocked,
                    link: TaskLink::Detached,
                    priority,
                    base_priority: priority,
                    wake_tick: 0,
                    task_cx,
                    memory_set: None,
                    parent: parent.map(Arc::downgrade),
                    children: Vec::new(),
                    exit_code: 0,
                    waited: false,
                    fork_failed: false,
                    fd_table: FdTable::new(),
                    waiting_on: None,
                    held_locks: Vec::new(),
                    ticks: 0,
                })
            },
        })
    }

    /// 获取内部可变状态的独占访问
    pub fn inner_exclusive_access(&self) -> UPIntrRefMut<'_, TaskControlBlockInner> {
        self.inner.exclusive_access()
    }

    pub fn tid(&self) -> Tid {
        self.tid.0
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 检查完整性标记，失败说明 TCB 被破坏
    pub fn check_magic(&self) {
        assert_eq!(
            self.magic, TASK_MAGIC,
            "task {}: control block corrupted (kernel stack overflow?)",
            self.tid.0
        );
    }

    /// 有效优先级
    pub fn priority(&self) -> usize {
        self.inner.exclusive_access().priority
    }

    /// 原始优先级
    pub fn base_priority(&self) -> usize {
        self.inner.exclusive_access().base_priority
    }

    pub fn status(&self) -> TaskStatus {
        self.inner.exclusive_access().status
    }

    pub fn exit_code(&self) -> i32 {
        self.inner.exclusive_access().exit_code
    }
}

/// TCB 内部状态
pub struct TaskControlBlockInner {
    /// 任务状态
    pub status: TaskStatus,
    /// 当前所在的队列
    pub link: TaskLink,
    /// 有效优先级（可能因捐赠而提高）
    pub priority: usize,
    /// 原始优先级
    pub base_priority: usize,
    /// 睡眠时的唤醒时刻（绝对滴答数）
    pub wake_tick: u64,
    /// 任务上下文
    pub task_cx: TaskContext,
    /// 地址空间，纯内核任务为 `None`
    pub memory_set: Option<MemorySet>,
    /// 父任务
    pub parent: Option<Weak<TaskControlBlock>>,
    /// 尚未被回收的子任务
    pub children: Vec<Arc<TaskControlBlock>>,
    /// 退出码
    pub exit_code: i32,
    /// 是否已被父任务 wait
    pub waited: bool,
    /// fork 子任务复制失败
    pub fork_failed: bool,
    /// 打开文件表
    pub fd_table: FdTable,
    /// 正在等待的锁
    pub waiting_on: Option<Arc<LockCore>>,
    /// 当前持有的锁
    pub held_locks: Vec<Arc<LockCore>>,
    /// 占用的时钟滴答数
    pub ticks: u64,
}

impl TaskControlBlockInner {
    /// 记录进入某个队列
    pub fn enqueue(&mut self, link: TaskLink) {
        assert_eq!(
            self.link,
            TaskLink::Detached,
            "task already queued on {:?}, cannot join {:?}",
            self.link,
            link
        );
        self.link = link;
    }

    /// 记录离开某个队列
    pub fn dequeue(&mut self, link: TaskLink) {
        assert_eq!(self.link, link, "task is not queued on {:?}", link);
        self.link = TaskLink::Detached;
    }
}

/// 任务状态
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TaskStatus {
    Ready,
    Running,
    Blocked,
    Dying,
}

/// TCB 所在的队列
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TaskLink {
    Detached,
    Ready,
    Sleep,
    Wait,
}
