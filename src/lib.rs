//! 教学内核执行核心：调度器、同步原语与进程生命周期协议。
//!
//! # Overview
//! - `task`：任务控制块、就绪队列、调度器与进程生命周期（create / fork / wait / exit）
//! - `timer`：按唤醒时刻排序的睡眠队列与时钟中断处理
//! - `sync`：中断屏蔽单元、信号量、带优先级捐赠的锁、条件变量
//! - `mm` / `fs`：地址空间与打开文件表，作为生命周期协议的外部协作者
//! - `hal`：上下文切换、中断开关、时钟等硬件接口
//!
//! # Assumptions
//! - 单核（UP）模型，所有共享状态在屏蔽中断后访问
//! - 编译时必须选择一个体系结构实现（目前仅 `hosted`）

#![no_std]

extern crate alloc;
#[cfg(feature = "hosted")]
extern crate std;

#[cfg(not(feature = "hosted"))]
compile_error!("taskcore needs an architecture backend: enable the `hosted` feature");

#[macro_use]
pub mod console;
pub mod config;
pub mod error;
pub mod fs;
pub mod hal;
pub mod logging;
pub mod mm;
pub mod sync;
pub mod syscall;
pub mod task;
pub mod timer;

#[cfg(feature = "hosted")]
pub mod boot;

/// 单元测试共享全局单元（帧分配器、TID 分配器、中断屏蔽计数），需串行执行。
#[cfg(test)]
pub(crate) fn serial_guard() -> std::sync::MutexGuard<'static, ()> {
    static SERIAL: std::sync::Mutex<()> = std::sync::Mutex::new(());
    SERIAL.lock().unwrap_or_else(|e| e.into_inner())
}
