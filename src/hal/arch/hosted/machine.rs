//! 宿主机一侧的机器状态：控制台缓冲、停机信息、中断到达通知
//!
//! 这里的锁是宿主操作系统的互斥锁，只在单次操作内持有，
//! 绝不跨越内核上下文切换。

use alloc::collections::VecDeque;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use lazy_static::lazy_static;
use std::sync::{Condvar, Mutex, MutexGuard};

struct MachineState {
    console: Vec<u8>,
    input: VecDeque<u8>,
    halted: Option<String>,
}

lazy_static! {
    static ref MACHINE: Mutex<MachineState> = Mutex::new(MachineState {
        console: Vec::new(),
        input: VecDeque::new(),
        halted: None,
    });
    /// 有中断挂起或机器停机时通知
    static ref MACHINE_EVENT: Condvar = Condvar::new();
}

fn machine() -> MutexGuard<'static, MachineState> {
    MACHINE.lock().unwrap_or_else(|e| e.into_inner())
}

pub fn console_putchar(c: usize) {
    machine().console.push(c as u8);
}

/// 读取一个输入字节，无输入时返回 `usize::MAX`
pub fn console_getchar() -> usize {
    machine()
        .input
        .pop_front()
        .map(|c| c as usize)
        .unwrap_or(usize::MAX)
}

/// 向控制台输入缓冲追加数据（宿主侧调用）
pub fn push_console_input(bytes: &[u8]) {
    machine().input.extend(bytes.iter().copied());
}

/// 到目前为止控制台输出的全部内容
pub fn console_output() -> String {
    String::from_utf8_lossy(&machine().console).to_string()
}

/// 停机并记录原因。已停机时保留第一次的原因。
pub fn halt(reason: &str) {
    let mut m = machine();
    if m.halted.is_none() {
        m.halted = Some(reason.to_string());
    }
    MACHINE_EVENT.notify_all();
}

pub fn halted() -> Option<String> {
    machine().halted.clone()
}

/// 关机：停机后当前宿主线程永久挂起
pub fn shutdown() -> ! {
    halt("power off");
    park_forever()
}

pub(super) fn park_forever() -> ! {
    loop {
        std::thread::park();
    }
}

/// 在持有机器锁的前提下执行 `f` 并唤醒等待者，用于挂起中断，避免丢失唤醒
pub(super) fn notify_with<R>(f: impl FnOnce() -> R) -> R {
    let _m = machine();
    let r = f();
    MACHINE_EVENT.notify_all();
    r
}

/// 阻塞宿主线程，直到 `ready()` 为真或机器停机
pub(super) fn wait_until(ready: impl Fn() -> bool) {
    let mut m = machine();
    while !ready() && m.halted.is_none() {
        m = MACHINE_EVENT.wait(m).unwrap_or_else(|e| e.into_inner());
    }
    if m.halted.is_some() {
        drop(m);
        park_forever();
    }
}
