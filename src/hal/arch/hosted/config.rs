//! 宿主机模拟平台的配置常量

/// 页大小
pub const PAGE_SIZE: usize = 0x1000;
/// 页内偏移位宽
pub const PAGE_SIZE_BITS: usize = 0xc;

/// 每个内核上下文宿主线程的栈大小
pub const KERNEL_STACK_SIZE: usize = 256 * 1024;
