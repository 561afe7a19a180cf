//! 进程生命周期与内存管理层的错误类型
//!
//! 调度与同步层的违例属于内核不变量破坏，直接 panic；
//! 只有资源耗尽与协议误用以 `Result` 形式返回给调用方。

use crate::task::Tid;
use core::fmt;

/// 进程生命周期操作的失败原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessError {
    /// 存活任务数已达 `MAX_TASKS`
    TooManyTasks,
    /// 优先级超出 `PRI_MIN..=PRI_MAX`
    InvalidPriority(usize),
    /// fork 的子任务未能复制父任务的资源；子任务仍可被 wait，退出码为 -1
    ForkFailed(Tid),
    /// 目标不是调用者的子任务（或已被回收）
    NotChild(Tid),
    /// 文件描述符无效
    BadFd(usize),
    /// 打开文件表已满
    TooManyFiles,
    /// 当前任务没有地址空间
    NoAddressSpace,
    /// 地址空间操作失败
    Memory(MmError),
}

/// 内存管理层的失败原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmError {
    /// 物理页帧耗尽
    OutOfFrames,
    /// 虚拟页已映射
    AlreadyMapped(usize),
    /// 虚拟地址未映射
    Unmapped(usize),
    /// 写入不可写的页
    ReadOnly(usize),
}

impl fmt::Display for ProcessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessError::TooManyTasks => write!(f, "too many tasks"),
            ProcessError::InvalidPriority(p) => write!(f, "invalid priority {}", p),
            ProcessError::ForkFailed(tid) => write!(f, "fork child {} failed to duplicate", tid),
            ProcessError::NotChild(tid) => write!(f, "task {} is not a child of the caller", tid),
            ProcessError::BadFd(fd) => write!(f, "bad file descriptor {}", fd),
            ProcessError::TooManyFiles => write!(f, "file table full"),
            ProcessError::NoAddressSpace => write!(f, "task has no address space"),
            ProcessError::Memory(e) => write!(f, "memory: {}", e),
        }
    }
}

impl fmt::Display for MmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MmError::OutOfFrames => write!(f, "out of physical frames"),
            MmError::AlreadyMapped(vpn) => write!(f, "page {:#x} already mapped", vpn),
            MmError::Unmapped(va) => write!(f, "address {:#x} not mapped", va),
            MmError::ReadOnly(va) => write!(f, "address {:#x} is read-only", va),
        }
    }
}

impl From<MmError> for ProcessError {
    fn from(e: MmError) -> Self {
        ProcessError::Memory(e)
    }
}
