//! 宿主机启动入口
//!
//! # Overview
//! - 第一次调用 `run` 时在宿主线程 `cpu0` 上启动内核：初始化日志与任务子系统，
//!   然后由初始任务 `main` 执行 `kernel_main`
//! - `run` 把作业放进邮箱并挂起一次外部中断；中断处理程序为每个新作业 up `JOBS`
//! - `kernel_main` 逐个取出作业，`spawn` 成子任务并 `wait` 它，把退出码交回宿主侧
//!
//! # Behavior
//! - 作业串行执行，同一时刻内核里只有一个作业树
//! - 内核停机（panic 或关机）后 `run` 以停机原因 panic

use crate::hal::{halted, post_external_interrupt, run_on_boot_context};
use crate::sync::Semaphore;
use crate::task::{check_preemption, spawn, wait};
use alloc::boxed::Box;
use alloc::collections::{BTreeMap, VecDeque};
use alloc::string::String;
use lazy_static::lazy_static;
use log::{info, warn};
use std::sync::{Condvar, Mutex, MutexGuard, Once};
use std::time::Duration;

pub use crate::hal::{console_output, push_console_input};

type JobEntry = Box<dyn FnOnce() -> i32 + Send + 'static>;

struct Job {
    ticket: u64,
    name: String,
    priority: usize,
    entry: JobEntry,
}

#[derive(Default)]
struct Mailbox {
    jobs: VecDeque<Job>,
    posted: u64,
    announced: u64,
    results: BTreeMap<u64, i32>,
}

lazy_static! {
    static ref MAILBOX: Mutex<Mailbox> = Mutex::new(Mailbox::default());
    static ref DONE: Condvar = Condvar::new();
    /// 已投递但尚未被 `kernel_main` 取走的作业数
    static ref JOBS: Semaphore = Semaphore::new(0);
    static ref RUN_LOCK: Mutex<()> = Mutex::new(());
}

static BOOT: Once = Once::new();

fn mailbox() -> MutexGuard<'static, Mailbox> {
    MAILBOX.lock().unwrap_or_else(|e| e.into_inner())
}

fn boot() {
    BOOT.call_once(|| {
        let spawned = std::thread::Builder::new()
            .name(String::from("cpu0"))
            .spawn(|| {
                run_on_boot_context(|| {
                    crate::logging::init();
                    crate::task::init();
                    crate::task::start();
                    kernel_main()
                })
            });
        if let Err(e) = spawned {
            panic!("cannot start cpu0: {}", e);
        }
    });
}

/// 初始任务的主循环
fn kernel_main() -> ! {
    info!("[kernel] ready for jobs");
    loop {
        JOBS.down();
        let Some(job) = mailbox().jobs.pop_front() else {
            continue;
        };
        let Job {
            ticket,
            name,
            priority,
            entry,
        } = job;
        let status = match spawn(&name, priority, entry) {
            Ok(tid) => wait(tid).unwrap_or_else(|e| {
                warn!("job {}: {}", name, e);
                -1
            }),
            Err(e) => {
                warn!("job {}: {}", name, e);
                -1
            }
        };
        mailbox().results.insert(ticket, status);
        DONE.notify_all();
    }
}

/// 外部中断：宣告新到达的作业
pub fn external_interrupt() {
    let arrived = {
        let mut mb = mailbox();
        let arrived = mb.posted - mb.announced;
        mb.announced = mb.posted;
        arrived
    };
    for _ in 0..arrived {
        JOBS.up();
    }
    check_preemption();
}

/// 在内核中以 `priority` 运行 `entry`，返回其退出码（由 `wait` 取回）。
///
/// 第一次调用时启动内核。多个宿主线程的调用依次执行。
pub fn run<F>(name: &str, priority: usize, entry: F) -> i32
where
    F: FnOnce() -> i32 + Send + 'static,
{
    boot();
    let _serial = RUN_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let ticket = {
        let mut mb = mailbox();
        mb.posted += 1;
        let ticket = mb.posted;
        mb.jobs.push_back(Job {
            ticket,
            name: String::from(name),
            priority,
            entry: Box::new(entry),
        });
        ticket
    };
    post_external_interrupt();
    let mut mb = mailbox();
    loop {
        if let Some(status) = mb.results.remove(&ticket) {
            return status;
        }
        if let Some(reason) = halted() {
            drop(mb);
            panic!("kernel halted: {}", reason);
        }
        mb = DONE
            .wait_timeout(mb, Duration::from_millis(10))
            .map(|(guard, _)| guard)
            .unwrap_or_else(|e| e.into_inner().0);
    }
}
