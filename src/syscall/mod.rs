//! 系统调用入口
//!
//! `syscall(id, args)` 按调用号分发；未知调用号视为用户程序错误，以 -1 结束当前任务。
//! 进程层返回的 `Err` 统一变为 -1。指针参数是当前任务地址空间中的用户地址。

mod fs;
mod process;

pub use fs::*;
pub use process::*;

use crate::error::ProcessError;
use log::{debug, warn};
use num_enum::TryFromPrimitive;

#[derive(Copy, Clone, Debug, Eq, PartialEq, TryFromPrimitive)]
#[repr(usize)]
pub enum SyscallId {
    Halt = 0,
    Exit = 1,
    Wait = 4,
    Create = 5,
    Remove = 6,
    Open = 7,
    Filesize = 8,
    Read = 9,
    Write = 10,
    Close = 13,
    Dup2 = 22,
    Yield = 30,
    Sleep = 31,
    GetPriority = 32,
    SetPriority = 33,
    GetTid = 34,
}

pub fn syscall(syscall_id: usize, args: [usize; 3]) -> isize {
    let Ok(id) = SyscallId::try_from(syscall_id) else {
        warn!("unsupported syscall_id: {}", syscall_id);
        sys_exit(-1);
    };
    match id {
        SyscallId::Halt => sys_halt(),
        SyscallId::Exit => sys_exit(args[0] as i32),
        SyscallId::Wait => sys_wait(args[0]),
        SyscallId::Create => sys_create(args[0], args[1]),
        SyscallId::Remove => sys_remove(args[0], args[1]),
        SyscallId::Open => sys_open(args[0], args[1], args[2] as u32),
        SyscallId::Filesize => sys_filesize(args[0]),
        SyscallId::Read => sys_read(args[0], args[1], args[2]),
        SyscallId::Write => sys_write(args[0], args[1], args[2]),
        SyscallId::Close => sys_close(args[0]),
        SyscallId::Dup2 => sys_dup2(args[0], args[1]),
        SyscallId::Yield => sys_yield(),
        SyscallId::Sleep => sys_sleep(args[0] as u64),
        SyscallId::GetPriority => sys_get_priority(),
        SyscallId::SetPriority => sys_set_priority(args[0]),
        SyscallId::GetTid => sys_gettid(),
    }
}

/// 成功值转为返回值，错误记录后返回 -1
fn to_ret(result: Result<usize, ProcessError>) -> isize {
    match result {
        Ok(v) => v as isize,
        Err(e) => {
            debug!("syscall failed: {}", e);
            -1
        }
    }
}
