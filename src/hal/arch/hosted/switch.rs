//! 任务上下文与上下文切换（宿主机模拟）
//!
//! # Overview
//! 每个内核上下文由一个宿主线程承载，`TaskContext` 保存该线程的“接力棒”。
//! 任意时刻只有持有接力棒的宿主线程在执行内核代码，其余线程都阻塞在
//! 各自的接力棒上，从而在宿主机上得到一个单核 CPU。
//!
//! # Design
//! - `__switch(cur, next)` 把接力棒交给 `next`，然后等待 `cur` 的接力棒被交回
//! - 新上下文的宿主线程在第一次被切换到时才创建
//! - 上下文中的代码 panic 时，机器停机，其余上下文永不再运行
//! - `TaskContext` 被 drop 时接力棒作废；仍阻塞在上面的宿主线程（已退出的任务）
//!   展开自己的栈并结束
//!
//! # Safety
//! - `__switch` 在交出接力棒之前复制好两侧的句柄，交出之后不再访问
//!   `cur` / `next` 指向的内存（被切走的任务可能随即被回收）

use super::config::KERNEL_STACK_SIZE;
use super::machine::{halt, park_forever};
use alloc::boxed::Box;
use alloc::format;
use alloc::string::String;
use alloc::sync::Arc;
use std::any::Any;
use core::sync::atomic::{AtomicUsize, Ordering};
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::sync::{Condvar, Mutex, MutexGuard};

/// 已创建且尚未结束的上下文宿主线程数
static LIVE_CONTEXTS: AtomicUsize = AtomicUsize::new(0);

/// 作废的上下文在 `__switch` 中以此为载荷展开
struct Retired;

/// 上下文的入口函数，永不正常返回
pub type ContextEntry = Box<dyn FnOnce() + Send + 'static>;

struct BatonState {
    granted: bool,
    retired: bool,
    entry: Option<ContextEntry>,
}

struct Baton {
    state: Mutex<BatonState>,
    cond: Condvar,
}

impl Baton {
    fn new(entry: Option<ContextEntry>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(BatonState {
                granted: false,
                retired: false,
                entry,
            }),
            cond: Condvar::new(),
        })
    }

    fn state(&self) -> MutexGuard<'_, BatonState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 交出接力棒；若上下文尚未启动，则为其创建宿主线程
    fn grant(self: &Arc<Self>) {
        let entry = {
            let mut state = self.state();
            state.granted = true;
            self.cond.notify_one();
            state.entry.take()
        };
        if let Some(entry) = entry {
            let baton = Arc::clone(self);
            LIVE_CONTEXTS.fetch_add(1, Ordering::SeqCst);
            let spawned = std::thread::Builder::new()
                .name(String::from("kernel-context"))
                .stack_size(KERNEL_STACK_SIZE)
                .spawn(move || {
                    let granted = baton.acquire();
                    drop(baton);
                    if granted {
                        run_context(entry);
                    }
                    LIVE_CONTEXTS.fetch_sub(1, Ordering::SeqCst);
                });
            if let Err(e) = spawned {
                LIVE_CONTEXTS.fetch_sub(1, Ordering::SeqCst);
                halt(&format!("cannot start kernel context: {}", e));
            }
        }
    }

    /// 等待接力棒被交回并取走它；接力棒作废时返回 `false`
    fn acquire(&self) -> bool {
        let mut state = self.state();
        while !state.granted && !state.retired {
            state = self.cond.wait(state).unwrap_or_else(|e| e.into_inner());
        }
        if state.retired {
            return false;
        }
        state.granted = false;
        true
    }

    /// 作废接力棒；尚未启动的入口随之释放
    fn retire(&self) {
        let entry = {
            let mut state = self.state();
            state.retired = true;
            self.cond.notify_all();
            state.entry.take()
        };
        drop(entry);
    }
}

/// 运行上下文入口。上下文作废时正常返回，其余情况停机后永久挂起。
fn run_context(entry: ContextEntry) {
    match catch_unwind(AssertUnwindSafe(entry)) {
        Err(payload) if payload.is::<Retired>() => return,
        Err(payload) => halt(&panic_message(payload.as_ref())),
        Ok(()) => halt("kernel context returned from its entry"),
    }
    park_forever()
}

/// 在宿主线程上以内核上下文身份运行 `f`，`f` 中的 panic 会使机器停机
pub fn run_on_boot_context(f: impl FnOnce() + Send + 'static) -> ! {
    run_context(Box::new(f));
    park_forever()
}

/// 仍在运行（或阻塞在接力棒上）的上下文宿主线程数
pub fn live_contexts() -> usize {
    LIVE_CONTEXTS.load(Ordering::SeqCst)
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        String::from(*s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("kernel panic")
    }
}

/// 任务上下文
pub struct TaskContext {
    baton: Arc<Baton>,
}

impl TaskContext {
    /// 空上下文：属于当前正在执行的宿主线程，第一次从它切走时“保存”当前执行流
    pub fn zero_init() -> Self {
        Self {
            baton: Baton::new(None),
        }
    }

    /// 第一次被切换到时从 `entry` 开始执行的上下文
    pub fn goto_entry(entry: ContextEntry) -> Self {
        Self {
            baton: Baton::new(Some(entry)),
        }
    }
}

impl Drop for TaskContext {
    fn drop(&mut self) {
        self.baton.retire();
    }
}

/// 从 `current_task_cx_ptr` 切换到 `next_task_cx_ptr`。
///
/// 返回时表示有其他上下文切换回了 `current_task_cx_ptr`。
///
/// # Safety
/// - 两个指针在调用时都必须指向有效的 `TaskContext`
/// - 必须在关中断、且不持有任何 `UPIntrFreeCell` 借用时调用
pub unsafe fn __switch(
    current_task_cx_ptr: *mut TaskContext,
    next_task_cx_ptr: *const TaskContext,
) {
    // SAFETY: 调用方保证两个指针此刻有效；交出接力棒之后不再解引用
    let current = Arc::clone(&(*current_task_cx_ptr).baton);
    let next = Arc::clone(&(*next_task_cx_ptr).baton);
    next.grant();
    drop(next);
    if !current.acquire() {
        // 已退出任务的 TCB 被回收：展开本线程的栈，栈上不再持有共享状态
        drop(current);
        resume_unwind(Box::new(Retired));
    }
}
