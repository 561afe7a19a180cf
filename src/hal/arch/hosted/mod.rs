//! 宿主机模拟的单核机器
//!
//! # Overview
//! 在宿主操作系统上实现内核所需的硬件接口，使执行核心可以作为普通库运行和测试：
//! - `switch`：每个内核上下文一个宿主线程，靠接力棒保证同一时刻只有一个在运行
//! - `sync`：模拟中断使能位与嵌套屏蔽
//! - `trap`：挂起中断集合、中断上下文标志、中断返回时让出
//! - `timer`：滴答时钟与下一次触发点
//! - `machine`：控制台、停机、宿主侧等待
//!
//! # Assumptions
//! - 宿主侧代码（测试线程）只通过 `post_external_interrupt` 与内核交互，
//!   不直接访问任何 `UPIntrFreeCell`

pub mod config;
mod machine;
mod switch;
mod sync;
mod timer;
mod trap;

pub use machine::{console_getchar, console_output, console_putchar, halt, halted, push_console_input, shutdown};
pub use switch::{__switch, live_contexts, run_on_boot_context, ContextEntry, TaskContext};
pub use sync::{
    intr_disable, intr_enable, intr_get_level, intr_set_level, InterruptGuard, IntrLevel,
    INTR_MASKING_INFO,
};
pub use timer::{get_time, set_next_trigger};
pub use trap::{
    in_interrupt, intr_yield_on_return, post_external_interrupt, raise_timer_interrupt,
    trap_handler, wait_for_interrupt, Irq,
};

use core::sync::atomic::{AtomicUsize, Ordering};

/// 当前激活的地址空间标识（0 表示仅内核空间）
static ACTIVE_SPACE: AtomicUsize = AtomicUsize::new(0);

/// 激活地址空间；`None` 表示切回内核空间
pub fn activate(token: Option<usize>) {
    ACTIVE_SPACE.store(token.unwrap_or(0), Ordering::SeqCst);
}

/// 当前激活的地址空间标识
pub fn active_token() -> Option<usize> {
    match ACTIVE_SPACE.load(Ordering::SeqCst) {
        0 => None,
        token => Some(token),
    }
}
