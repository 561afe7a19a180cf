use super::to_ret;
use crate::hal::shutdown;
use crate::task::{
    current_tid, exit, fork, get_priority, print_stats, set_priority, wait, yield_current, Tid,
};
use crate::timer::sleep;

/// 打印调度统计后关机
pub fn sys_halt() -> ! {
    print_stats();
    shutdown()
}

pub fn sys_exit(exit_code: i32) -> ! {
    exit(exit_code)
}

pub fn sys_yield() -> isize {
    yield_current();
    0
}

pub fn sys_gettid() -> isize {
    current_tid() as isize
}

/// 等待子任务，返回其退出码；不是子任务时返回 -1
pub fn sys_wait(tid: Tid) -> isize {
    match wait(tid) {
        Ok(status) => status as isize,
        Err(_) => -1,
    }
}

/// 复制当前任务，子任务复制成功后执行 `child_main`。
///
/// 父任务得到子任务标识，复制失败时得到 -1（子任务仍需 wait）。
pub fn sys_fork<F>(name: &str, child_main: F) -> isize
where
    F: FnOnce() -> i32 + Send + 'static,
{
    to_ret(fork(name, child_main))
}

pub fn sys_sleep(ticks: u64) -> isize {
    sleep(ticks);
    0
}

pub fn sys_get_priority() -> isize {
    get_priority() as isize
}

pub fn sys_set_priority(priority: usize) -> isize {
    to_ret(set_priority(priority).map(|()| 0))
}
