//! 时钟设备（宿主机模拟）
//!
//! 时钟只在时钟中断投递时前进一个滴答，空闲时可被快进到下一次触发点。

use core::sync::atomic::{AtomicU64, Ordering};

const NO_TRIGGER: u64 = u64::MAX;

static CLOCK: AtomicU64 = AtomicU64::new(0);
static NEXT_TRIGGER: AtomicU64 = AtomicU64::new(NO_TRIGGER);

/// 自启动以来的时钟滴答数
pub fn get_time() -> u64 {
    CLOCK.load(Ordering::SeqCst)
}

/// 设置（或清除）下一次需要关注的时钟时刻
pub fn set_next_trigger(deadline: Option<u64>) {
    NEXT_TRIGGER.store(deadline.unwrap_or(NO_TRIGGER), Ordering::SeqCst);
}

pub(super) fn next_trigger() -> Option<u64> {
    match NEXT_TRIGGER.load(Ordering::SeqCst) {
        NO_TRIGGER => None,
        t => Some(t),
    }
}

pub(super) fn advance_clock(ticks: u64) {
    CLOCK.fetch_add(ticks, Ordering::SeqCst);
}
