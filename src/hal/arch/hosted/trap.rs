//! 中断投递（宿主机模拟）
//!
//! # Overview
//! - 时钟中断由内核代码通过 `raise_timer_interrupt` 在当前指令边界触发，
//!   或由空闲任务在 `wait_for_interrupt` 中快进时钟产生
//! - 外部中断由宿主线程通过 `post_external_interrupt` 挂起
//! - 挂起的中断在中断打开时投递：`intr_enable`、中断返回、空闲等待
//!
//! # Invariants
//! - 中断处理程序运行时中断关闭，`in_interrupt()` 为真
//! - 处理程序不会阻塞；需要让出 CPU 时通过 `intr_yield_on_return` 推迟到中断返回

use super::machine::{notify_with, wait_until};
use super::sync::{intr_get_level, set_intr_flag, IntrLevel};
use super::timer::{advance_clock, next_trigger};
use bitflags::bitflags;
use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

bitflags! {
    /// 挂起的中断源
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct Irq: u8 {
        /// 时钟中断
        const TIMER = 1 << 0;
        /// 外部中断（宿主侧投递的任务）
        const EXTERNAL = 1 << 1;
    }
}

static PENDING: AtomicU8 = AtomicU8::new(0);
static IN_TRAP: AtomicBool = AtomicBool::new(false);
static YIELD_ON_RETURN: AtomicBool = AtomicBool::new(false);

fn pending() -> Irq {
    Irq::from_bits_truncate(PENDING.load(Ordering::SeqCst))
}

fn post(irq: Irq) {
    notify_with(|| PENDING.fetch_or(irq.bits(), Ordering::SeqCst));
}

/// 当前是否在中断处理程序中
pub fn in_interrupt() -> bool {
    IN_TRAP.load(Ordering::SeqCst)
}

/// 要求在中断返回前让出 CPU
pub fn intr_yield_on_return() {
    assert!(in_interrupt(), "intr_yield_on_return: not in an interrupt handler");
    YIELD_ON_RETURN.store(true, Ordering::SeqCst);
}

/// 在当前指令边界触发一次时钟中断。中断关闭时保持挂起。
pub fn raise_timer_interrupt() {
    assert!(!in_interrupt(), "raise_timer_interrupt: nested in an interrupt handler");
    post(Irq::TIMER);
    deliver_pending();
}

/// 宿主线程挂起一次外部中断
pub fn post_external_interrupt() {
    post(Irq::EXTERNAL);
}

/// 中断打开且不在处理程序中时，投递所有挂起的中断
pub(super) fn deliver_pending() {
    while intr_get_level() == IntrLevel::On && !in_interrupt() {
        let irq = Irq::from_bits_truncate(PENDING.swap(0, Ordering::SeqCst));
        if irq.is_empty() {
            break;
        }
        trap_handler(irq);
    }
}

/// 中断处理入口
pub fn trap_handler(irq: Irq) {
    set_intr_flag(false);
    IN_TRAP.store(true, Ordering::SeqCst);
    if irq.contains(Irq::TIMER) {
        advance_clock(1);
        crate::timer::timer_interrupt();
    }
    if irq.contains(Irq::EXTERNAL) {
        crate::boot::external_interrupt();
    }
    IN_TRAP.store(false, Ordering::SeqCst);
    if YIELD_ON_RETURN.swap(false, Ordering::SeqCst) {
        crate::task::yield_current();
    }
    set_intr_flag(true);
}

/// 空闲任务等待下一个中断。
///
/// 中断必须是打开的。已有挂起中断时直接投递；否则若设置了下一次时钟触发点，
/// 把时钟快进到触发点并投递时钟中断；都没有时阻塞宿主线程等待外部中断。
pub fn wait_for_interrupt() {
    assert_eq!(intr_get_level(), IntrLevel::On, "wait_for_interrupt: interrupts are off");
    if pending().is_empty() {
        if let Some(deadline) = next_trigger() {
            let skipped = advance_clock_to(deadline);
            if skipped > 0 {
                crate::timer::skip_idle_ticks(skipped);
            }
            post(Irq::TIMER);
        } else {
            wait_until(|| !pending().is_empty());
        }
    }
    deliver_pending();
}

/// 把时钟推进到 `deadline - 1`，使下一次时钟中断恰好到达 `deadline`。返回跳过的滴答数
fn advance_clock_to(deadline: u64) -> u64 {
    let now = super::timer::get_time();
    if deadline > now + 1 {
        let skipped = deadline - 1 - now;
        advance_clock(skipped);
        skipped
    } else {
        0
    }
}
