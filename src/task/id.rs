//! 任务标识分配
//!
//! 标识单调递增、从 1 开始、永不复用；同时统计存活任务数，
//! 达到 `MAX_TASKS` 后拒绝创建新任务。

use crate::config::MAX_TASKS;
use crate::sync::UPIntrFreeCell;
use lazy_static::lazy_static;

/// 任务标识
pub type Tid = usize;

/// 任务控制块的完整性标记，用于发现内核栈溢出覆盖了 TCB
pub const TASK_MAGIC: u32 = 0xcd6a_bf4b;

lazy_static! {
    static ref TID_ALLOCATOR: UPIntrFreeCell<TidAllocator> =
        unsafe { UPIntrFreeCell::new(TidAllocator::new(MAX_TASKS)) };
}

/// 任务标识句柄，释放时归还一个存活名额（标识本身不回收）
pub struct TidHandle(pub Tid);

/// 分配一个新的任务标识，存活任务已达上限时返回 `None`
pub fn tid_alloc() -> Option<TidHandle> {
    TID_ALLOCATOR.exclusive_access().alloc().map(TidHandle)
}

/// 存活（尚未回收）的任务数
pub fn live_tasks() -> usize {
    TID_ALLOCATOR.exclusive_access().live()
}

impl Drop for TidHandle {
    fn drop(&mut self) {
        TID_ALLOCATOR.exclusive_access().dealloc(self.0);
    }
}

pub struct TidAllocator {
    next: Tid,
    live: usize,
    limit: usize,
}

impl TidAllocator {
    pub fn new(limit: usize) -> Self {
        TidAllocator {
            next: 1,
            live: 0,
            limit,
        }
    }

    pub fn alloc(&mut self) -> Option<Tid> {
        if self.live == self.limit {
            return None;
        }
        self.live += 1;
        self.next += 1;
        Some(self.next - 1)
    }

    pub fn dealloc(&mut self, tid: Tid) {
        assert!(tid < self.next, "tid {} was never allocated", tid);
        assert!(self.live > 0, "tid {} released twice", tid);
        self.live -= 1;
    }

    /// 当前存活的任务数
    pub fn live(&self) -> usize {
        self.live
    }
}
