//! 中断开关与中断屏蔽管理（宿主机模拟）
//!
//! # Overview
//! 用一个原子标志模拟 CPU 的中断使能位。重新打开中断时，
//! 挂起的中断会立即在当前上下文中投递（见 `trap::deliver_pending`）。
//!
//! # Design
//! - `intr_disable` / `intr_enable` / `intr_set_level` 返回调用前的中断级别，
//!   调用方按 “保存 - 关中断 - 恢复” 的方式使用
//! - `IntrMaskingInfo` 支持嵌套屏蔽，供 `UPIntrFreeCell` 使用
//! - 中断级别是全局的而非每个上下文保存一份：上下文切换总是在关中断时发生，
//!   被切换回来的上下文自行恢复它保存的级别
//!
//! # Invariants
//! - `nested_level` 永远 >= 0
//! - 中断处理程序内部不得打开中断

use super::trap::{deliver_pending, in_interrupt};
use crate::sync::UPSafeCellRaw;
use core::sync::atomic::{AtomicBool, Ordering};
use lazy_static::lazy_static;

/// 模拟的中断使能位，上电时关闭
static INTR_ENABLED: AtomicBool = AtomicBool::new(false);

/// 中断级别
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IntrLevel {
    Off,
    On,
}

impl IntrLevel {
    fn from_flag(enabled: bool) -> Self {
        if enabled {
            IntrLevel::On
        } else {
            IntrLevel::Off
        }
    }
}

/// 当前中断级别
pub fn intr_get_level() -> IntrLevel {
    IntrLevel::from_flag(INTR_ENABLED.load(Ordering::SeqCst))
}

/// 设置中断级别，返回之前的级别
pub fn intr_set_level(level: IntrLevel) -> IntrLevel {
    match level {
        IntrLevel::On => intr_enable(),
        IntrLevel::Off => intr_disable(),
    }
}

/// 关中断，返回之前的级别
pub fn intr_disable() -> IntrLevel {
    IntrLevel::from_flag(INTR_ENABLED.swap(false, Ordering::SeqCst))
}

/// 开中断，返回之前的级别。
///
/// 打开后立即投递所有挂起的中断，因此调用可能导致当前任务被抢占。
pub fn intr_enable() -> IntrLevel {
    assert!(!in_interrupt(), "intr_enable: called inside an interrupt handler");
    let old = IntrLevel::from_flag(INTR_ENABLED.swap(true, Ordering::SeqCst));
    deliver_pending();
    old
}

/// 仅修改中断使能位，不投递挂起中断。供中断返回路径使用。
pub(super) fn set_intr_flag(enabled: bool) {
    INTR_ENABLED.store(enabled, Ordering::SeqCst);
}

/// 关中断的作用域守卫，离开作用域时恢复进入前的中断级别
pub struct InterruptGuard {
    old: IntrLevel,
}

impl InterruptGuard {
    pub fn new() -> Self {
        Self {
            old: intr_disable(),
        }
    }
}

impl Default for InterruptGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        intr_set_level(self.old);
    }
}

lazy_static! {
    /// 全局中断屏蔽管理信息实例
    ///
    /// # Safety
    /// - 使用 `UPSafeCellRaw` 保证单核环境下的独占访问。
    pub static ref INTR_MASKING_INFO: UPSafeCellRaw<IntrMaskingInfo> =
        unsafe { UPSafeCellRaw::new(IntrMaskingInfo::new()) };
}

/// 内核中断屏蔽信息
///
/// # Fields
/// - `nested_level`：嵌套屏蔽层数
/// - `enabled_before_masking`：第一次屏蔽前中断是否打开
pub struct IntrMaskingInfo {
    nested_level: usize,
    enabled_before_masking: bool,
}

impl IntrMaskingInfo {
    pub fn new() -> Self {
        Self {
            nested_level: 0,
            enabled_before_masking: false,
        }
    }

    /// 屏蔽中断，支持嵌套
    ///
    /// # Behavior
    /// - 保存第一次屏蔽前的中断级别
    /// - 嵌套调用时只增加层数，不重复保存状态
    pub fn enter(&mut self) {
        let old = intr_disable();
        if self.nested_level == 0 {
            self.enabled_before_masking = old == IntrLevel::On;
        }
        self.nested_level += 1;
    }

    /// 退出一层屏蔽。
    ///
    /// 返回 `true` 表示已退出最外层且屏蔽前中断是打开的，调用方应在
    /// 释放对本结构的引用之后再调用 `intr_enable`（开中断可能切换上下文）。
    pub fn exit(&mut self) -> bool {
        assert!(self.nested_level > 0, "IntrMaskingInfo: unbalanced exit");
        self.nested_level -= 1;
        self.nested_level == 0 && self.enabled_before_masking
    }
}

impl Default for IntrMaskingInfo {
    fn default() -> Self {
        Self::new()
    }
}
