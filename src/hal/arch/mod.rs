//! ARCH 统一接口模块
//! # Overview
//! 本模块根据编译特性选择底层体系结构实现，并统一导出内核需要的接口，
//! 如上下文切换、中断开关、时钟与控制台。上层内核只通过本模块访问硬件，
//! 无需关心具体实现。
//!
//! # Assumptions
//! - 编译时必须指定体系结构特性（目前为 `hosted`）
//! - 对应实现导出完整接口，保证上层内核可透明调用
//!
//! # Invariants
//! - 上层内核调用的接口在不同实现下行为一致

#[cfg(feature = "hosted")]
pub mod hosted;

#[cfg(feature = "hosted")]
pub use hosted::{
    // 地址空间激活
    activate,
    active_token,
    // 配置常量
    config::{KERNEL_STACK_SIZE, PAGE_SIZE, PAGE_SIZE_BITS},
    // 控制台与停机
    console_getchar,
    console_output,
    console_putchar,
    halt,
    halted,
    push_console_input,
    shutdown,
    // 时钟
    get_time,
    set_next_trigger,
    // 中断开关与中断屏蔽管理
    intr_disable,
    intr_enable,
    intr_get_level,
    intr_set_level,
    InterruptGuard,
    IntrLevel,
    INTR_MASKING_INFO,
    // 中断投递
    in_interrupt,
    intr_yield_on_return,
    post_external_interrupt,
    raise_timer_interrupt,
    trap_handler,
    wait_for_interrupt,
    Irq,
    // 任务上下文切换
    __switch,
    live_contexts,
    run_on_boot_context,
    ContextEntry,
    TaskContext,
};
