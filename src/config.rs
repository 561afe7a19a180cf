//! 内核配置常量

/// 最低优先级（空闲任务使用）
pub const PRI_MIN: usize = 0;
/// 默认优先级
pub const PRI_DEFAULT: usize = 31;
/// 最高优先级
pub const PRI_MAX: usize = 63;

/// 每个任务连续运行的最大时钟滴答数，用尽后在中断返回时让出 CPU
pub const TIME_SLICE: usize = 4;

/// 优先级捐赠沿 持有者 -> 所等待的锁 -> 持有者 传递的最大深度
pub const MAX_DONATION_DEPTH: usize = 8;

/// 同时存活的任务控制块上限（含 main 与 idle）
pub const MAX_TASKS: usize = 256;

/// 每个任务的打开文件表大小
pub const FD_TABLE_SIZE: usize = 64;

/// 物理页帧总数
pub const MEMORY_FRAMES: usize = 1024;

/// fork 子任务复制失败时的退出码
pub const FORK_FAILED_STATUS: i32 = -1;

/// 未设置 `LOG` 环境变量时的日志级别
pub const LOG_LEVEL: &str = "INFO";
