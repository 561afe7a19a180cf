//! 处理器与任务调度模块。
//!
//! 本模块定义了 `Processor` 结构体以及与之相关的全局调度逻辑，
//! 描述单个 CPU 核心的运行状态，并负责在任务之间进行上下文切换。
//!
//! # Overview
//! - 全局唯一的 `PROCESSOR` 记录当前任务、空闲任务、就绪队列、睡眠队列与待回收列表
//! - `schedule` 从就绪队列取出优先级最高的任务（没有则取空闲任务）并切换过去
//! - 阻塞、让出、退出都是“修改当前任务状态 + schedule”
//!
//! # Concurrency Model
//! - 单核；所有对 `Processor` 的访问都通过 `UPIntrFreeCell` 进行
//! - 进入 `schedule` 前中断必须关闭，切换时不持有任何单元借用
//!
//! # Safety
//! - `__switch` 使用的上下文指针在交出 CPU 前一直有效：
//!   非退出任务由 `schedule` 自己持有强引用，退出任务由待回收列表持有
//!
//! # Invariants
//! - 任意时刻恰有一个任务处于 Running 状态，且它不在就绪队列中
//! - 空闲任务永不进入就绪队列
//! - 退出任务的 TCB 只在另一个上下文的调度过程中被释放
//! - 就绪队列容量 >= 就绪任务数 + 睡眠任务数（中断中唤醒不分配内存）

use super::manager::TaskManager;
use super::{TaskControlBlock, TaskLink, TaskStatus};
use crate::config::{PRI_DEFAULT, PRI_MIN, TIME_SLICE};
use crate::hal::{
    __switch, activate, in_interrupt, intr_disable, intr_enable, intr_get_level, intr_set_level,
    intr_yield_on_return, set_next_trigger, wait_for_interrupt, IntrLevel, TaskContext,
};
use crate::sync::{Semaphore, UPIntrFreeCell};
use crate::timer::SleepQueue;
use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use lazy_static::lazy_static;
use log::info;

/// 调度统计
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SchedStats {
    /// 空闲任务占用的滴答数
    pub idle_ticks: u64,
    /// 纯内核任务占用的滴答数
    pub kernel_ticks: u64,
    /// 拥有地址空间的任务占用的滴答数
    pub user_ticks: u64,
}

/// Processor 表示 CPU 核心的调度状态。
///
/// # Invariants
/// - 任意时刻，至多只有一个执行流可以访问该 `Processor`
/// - 所有访问必须通过 `UPIntrFreeCell` 进行
pub struct Processor {
    /// 当前正在运行的任务。
    ///
    /// INVARIANT:
    /// - 仅在 `schedule` 内部暂时为 `None`
    current: Option<Arc<TaskControlBlock>>,
    /// 空闲任务，就绪队列为空时运行
    idle: Option<Arc<TaskControlBlock>>,
    /// 就绪队列
    ready: TaskManager,
    /// 睡眠队列
    sleeping: SleepQueue,
    /// 已切走的退出任务，在下一次调度开始时释放
    destruction_req: Vec<Arc<TaskControlBlock>>,
    /// 当前任务自上次被调度以来的滴答数
    slice_ticks: usize,
    stats: SchedStats,
    initialized: bool,
}

impl Processor {
    pub fn new() -> Self {
        Self {
            current: None,
            idle: None,
            ready: TaskManager::new(),
            sleeping: SleepQueue::new(),
            destruction_req: Vec::new(),
            slice_ticks: 0,
            stats: SchedStats::default(),
            initialized: false,
        }
    }

    /// 当前正在运行的任务
    pub fn current(&self) -> Option<Arc<TaskControlBlock>> {
        self.current.as_ref().map(Arc::clone)
    }

    fn is_idle(&self, task: &Arc<TaskControlBlock>) -> bool {
        self.idle.as_ref().is_some_and(|idle| Arc::ptr_eq(idle, task))
    }

    /// 放入就绪队列；不在中断上下文时补足为睡眠任务预留的容量
    fn add_ready(&mut self, task: Arc<TaskControlBlock>) {
        self.ready.add(task);
        if !in_interrupt() {
            self.ready.reserve(self.sleeping.len());
        }
    }

    /// Blocked -> Ready
    fn make_ready(&mut self, task: Arc<TaskControlBlock>) {
        {
            let mut inner = task.inner_exclusive_access();
            assert_eq!(
                inner.status,
                TaskStatus::Blocked,
                "unblock: task {} is not blocked",
                task.tid()
            );
            inner.status = TaskStatus::Ready;
        }
        self.add_ready(task);
    }

    /// 加入睡眠队列并更新时钟触发点
    pub(crate) fn add_sleeper(&mut self, deadline: u64, task: Arc<TaskControlBlock>) {
        task.inner_exclusive_access().enqueue(TaskLink::Sleep);
        self.sleeping.push(deadline, task);
        self.ready.reserve(self.sleeping.len());
        set_next_trigger(self.sleeping.next_deadline());
    }

    /// 唤醒所有到期的睡眠任务，返回唤醒数量
    pub(crate) fn wake_sleepers(&mut self, now: u64) -> usize {
        let mut woken = 0;
        while let Some(task) = self.sleeping.pop_due(now) {
            task.inner_exclusive_access().dequeue(TaskLink::Sleep);
            self.make_ready(task);
            woken += 1;
        }
        set_next_trigger(self.sleeping.next_deadline());
        woken
    }

    /// 记一个滴答，返回当前任务的时间片是否用尽
    pub(crate) fn account_tick(&mut self) -> bool {
        let Some(cur) = self.current.as_ref() else {
            return false;
        };
        let is_idle = self.is_idle(cur);
        let has_space = {
            let mut inner = cur.inner_exclusive_access();
            inner.ticks += 1;
            inner.memory_set.is_some()
        };
        if is_idle {
            self.stats.idle_ticks += 1;
        } else if has_space {
            self.stats.user_ticks += 1;
        } else {
            self.stats.kernel_ticks += 1;
        }
        self.slice_ticks += 1;
        self.slice_ticks >= TIME_SLICE
    }

    pub(crate) fn account_idle(&mut self, ticks: u64) {
        self.stats.idle_ticks += ticks;
    }

    /// 就绪队列中是否有比当前任务优先级更高的任务
    pub(crate) fn should_preempt(&self) -> bool {
        let Some(head) = self.ready.peek_priority() else {
            return false;
        };
        match self.current.as_ref() {
            Some(cur) => self.is_idle(cur) || head > cur.priority(),
            None => false,
        }
    }

    /// 就绪任务优先级改变后重新排队
    pub(crate) fn reposition(&mut self, task: &Arc<TaskControlBlock>) {
        self.ready.reposition(task);
    }
}

impl Default for Processor {
    fn default() -> Self {
        Self::new()
    }
}

lazy_static! {
    /// 全局 Processor 实例。
    ///
    /// INVARIANT:
    /// - 系统中只存在一个全局 `Processor`
    /// - 所有访问都必须通过 `UPIntrFreeCell` 串行化
    pub static ref PROCESSOR: UPIntrFreeCell<Processor> =
        unsafe { UPIntrFreeCell::new(Processor::new()) };
}

/// 把正在执行的上下文登记为初始任务 `main`。只能调用一次。
pub fn init() {
    let _ = intr_disable();
    let main = TaskControlBlock::new("main", PRI_DEFAULT, None, TaskContext::zero_init())
        .unwrap_or_else(|e| panic!("cannot create the main task: {}", e));
    let main = Arc::new(main);
    main.inner_exclusive_access().status = TaskStatus::Running;
    PROCESSOR.exclusive_session(|p| {
        assert!(!p.initialized, "task::init called twice");
        p.initialized = true;
        p.current = Some(main);
    });
    info!("[kernel] task subsystem initialized");
}

/// 创建空闲任务并打开中断，返回时空闲任务已经运行过。
pub fn start() {
    let started = Arc::new(Semaphore::new(0));
    let idle_started = Arc::clone(&started);
    let idle = TaskControlBlock::new(
        "idle",
        PRI_MIN,
        None,
        TaskContext::goto_entry(Box::new(move || idle_loop(idle_started))),
    )
    .unwrap_or_else(|e| panic!("cannot create the idle task: {}", e));
    PROCESSOR.exclusive_session(|p| {
        assert!(p.initialized, "task::start before task::init");
        assert!(p.idle.is_none(), "task::start called twice");
        p.idle = Some(Arc::new(idle));
    });
    intr_enable();
    started.down();
}

/// 空闲任务：没有就绪任务时运行，等待下一个中断。
fn idle_loop(started: Arc<Semaphore>) -> ! {
    started.up();
    drop(started);
    loop {
        intr_disable();
        block_current();
        intr_enable();
        wait_for_interrupt();
    }
}

/// 获得当前正在运行任务的 TCB
pub fn current_task() -> Arc<TaskControlBlock> {
    let task = PROCESSOR
        .exclusive_access()
        .current()
        .unwrap_or_else(|| panic!("current_task: task subsystem not initialized"));
    task.check_magic();
    task
}

/// 切换到下一个任务。当前任务的状态必须已由调用者改为非 Running。
///
/// 让出的任务若仍是优先级最高的就绪任务，会被直接选回，此时不发生切换。
fn schedule() {
    assert_eq!(intr_get_level(), IntrLevel::Off, "schedule: interrupts are on");
    let (reclaimed, switch) = PROCESSOR.exclusive_session(|p| {
        let reclaimed = core::mem::take(&mut p.destruction_req);
        let cur = p.current.take().expect("schedule: no current task");
        let (cur_cx, dying) = {
            let mut inner = cur.inner_exclusive_access();
            assert_ne!(inner.status, TaskStatus::Running, "schedule: current task still running");
            (&mut inner.task_cx as *mut TaskContext, inner.status == TaskStatus::Dying)
        };
        let next = match p.ready.fetch() {
            Some(task) => task,
            None => p
                .idle
                .clone()
                .expect("schedule: nothing to run and no idle task"),
        };
        p.slice_ticks = 0;
        if Arc::ptr_eq(&cur, &next) {
            next.inner_exclusive_access().status = TaskStatus::Running;
            p.current = Some(next);
            return (reclaimed, None);
        }
        let (next_cx, token) = {
            let mut inner = next.inner_exclusive_access();
            inner.status = TaskStatus::Running;
            (
                &inner.task_cx as *const TaskContext,
                inner.memory_set.as_ref().map(|ms| ms.token()),
            )
        };
        let keep = if dying {
            p.destruction_req.push(cur);
            None
        } else {
            Some(cur)
        };
        p.current = Some(next);
        (reclaimed, Some((keep, cur_cx, next_cx, token)))
    });
    drop(reclaimed);
    let Some((keep, cur_cx, next_cx, token)) = switch else {
        return;
    };
    activate(token);
    // SAFETY:
    // - cur_cx 指向的 TCB 由 keep 或待回收列表持有，next_cx 由 current 持有
    // - 中断关闭，且不持有任何单元借用
    unsafe {
        __switch(cur_cx, next_cx);
    }
    drop(keep);
}

/// 阻塞当前任务并切换。调用者负责事先把它登记到某个等待队列。
pub fn block_current() {
    assert!(!in_interrupt(), "block_current: cannot block in an interrupt handler");
    assert_eq!(intr_get_level(), IntrLevel::Off, "block_current: interrupts are on");
    PROCESSOR.exclusive_session(|p| {
        let cur = p.current.as_ref().expect("block_current: no current task");
        cur.inner_exclusive_access().status = TaskStatus::Blocked;
    });
    schedule();
}

/// 让出 CPU：当前任务回到就绪队列同优先级的末尾
pub fn yield_current() {
    assert!(!in_interrupt(), "yield_current: cannot yield in an interrupt handler");
    let old = intr_disable();
    PROCESSOR.exclusive_session(|p| {
        let cur = p.current().expect("yield_current: no current task");
        cur.inner_exclusive_access().status = TaskStatus::Ready;
        if !p.is_idle(&cur) {
            p.add_ready(cur);
        }
    });
    schedule();
    intr_set_level(old);
}

/// Blocked -> Ready，不切换
pub fn unblock(task: &Arc<TaskControlBlock>) {
    let old = intr_disable();
    PROCESSOR.exclusive_session(|p| p.make_ready(Arc::clone(task)));
    intr_set_level(old);
}

/// 当前任务进入 Dying 并切走，永不返回。
///
/// 调用者栈上不能再持有任何 TCB 强引用，否则该 TCB 永远不会被释放。
pub fn exit_current() -> ! {
    assert!(!in_interrupt(), "exit_current: cannot exit in an interrupt handler");
    intr_disable();
    PROCESSOR.exclusive_session(|p| {
        let cur = p.current.as_ref().expect("exit_current: no current task");
        assert!(!p.is_idle(cur), "exit_current: idle task cannot exit");
        cur.inner_exclusive_access().status = TaskStatus::Dying;
    });
    schedule();
    unreachable!("exit_current: dying task was rescheduled");
}

/// 就绪队列中有更高优先级的任务时让出 CPU；在中断中则推迟到中断返回
pub fn check_preemption() {
    let preempt = PROCESSOR.exclusive_session(|p| p.should_preempt());
    if preempt {
        if in_interrupt() {
            intr_yield_on_return();
        } else {
            yield_current();
        }
    }
}

/// 调度统计
pub fn stats() -> SchedStats {
    PROCESSOR.exclusive_access().stats
}

/// 打印调度统计
pub fn print_stats() {
    let s = stats();
    println!(
        "Thread: {} idle ticks, {} kernel ticks, {} user ticks",
        s.idle_ticks, s.kernel_ticks, s.user_ticks
    );
}

/// 就绪任务数
pub fn ready_count() -> usize {
    PROCESSOR.exclusive_access().ready.len()
}

/// 睡眠任务数
pub fn sleeping_count() -> usize {
    PROCESSOR.exclusive_access().sleeping.len()
}
