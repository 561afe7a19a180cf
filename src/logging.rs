//! 内核日志
//!
//! 基于 `log` 门面，输出到控制台。日志级别在编译期由 `LOG` 环境变量决定
//! （ERROR / WARN / INFO / DEBUG / TRACE / OFF），缺省为 `config::LOG_LEVEL`。

use crate::config::LOG_LEVEL;
use log::{Level, LevelFilter, Log, Metadata, Record};

struct KernelLogger;

impl Log for KernelLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let color = match record.level() {
            Level::Error => 31,
            Level::Warn => 93,
            Level::Info => 34,
            Level::Debug => 32,
            Level::Trace => 90,
        };
        println!(
            "\u{1B}[{}m[{:>5}] {}\u{1B}[0m",
            color,
            record.level(),
            record.args()
        );
    }

    fn flush(&self) {}
}

fn level_filter(level: &str) -> LevelFilter {
    match level {
        "ERROR" => LevelFilter::Error,
        "WARN" => LevelFilter::Warn,
        "INFO" => LevelFilter::Info,
        "DEBUG" => LevelFilter::Debug,
        "TRACE" => LevelFilter::Trace,
        "OFF" => LevelFilter::Off,
        _ => LevelFilter::Info,
    }
}

/// 安装内核日志器。
///
/// 若宿主环境已安装了其他日志器，则保留其设置。
pub fn init() {
    static LOGGER: KernelLogger = KernelLogger;
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level_filter(option_env!("LOG").unwrap_or(LOG_LEVEL)));
    }
}
