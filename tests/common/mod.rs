//! 集成测试公共工具
//!
//! 每个测试体都通过 `boot::run` 作为内核作业执行；作业串行，测试只会看到自己创建的任务。
//! 断言尽量放在宿主侧：内核中的 panic 会让整台机器停机。

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use taskcore::config::PRI_MIN;
use taskcore::hal::raise_timer_interrupt;
use taskcore::task::{get_priority, set_priority, yield_current};

/// 内核任务按发生顺序记录的事件
#[derive(Clone, Default)]
pub struct Trace(Arc<Mutex<Vec<String>>>);

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// 在当前任务中连续触发 `n` 次时钟中断
pub fn ticks(n: u64) {
    for _ in 0..n {
        raise_timer_interrupt();
    }
}

/// 让其他就绪任务都运行到阻塞或退出，并回收已退出的任务
pub fn settle() {
    let priority = get_priority();
    set_priority(PRI_MIN).unwrap();
    yield_current();
    yield_current();
    set_priority(priority).unwrap();
}

/// 把作业内的检查结果转为退出码
pub fn status(ok: bool) -> i32 {
    if ok {
        0
    } else {
        1
    }
}
