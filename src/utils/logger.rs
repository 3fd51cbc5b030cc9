//! 日志模块：默认 env_logger 彩色控制台输出，`LOG_FORMAT=json` 时切换为 tracing-subscriber JSON
use env_logger::fmt::Formatter;
use env_logger::{Builder, Target, WriteStyle};
use log::{Level, LevelFilter, Record};
use std::io::Write;
use std::sync::Once;
use tracing_subscriber::EnvFilter;

const LOG_LEVEL: &str = "LOG_LEVEL";
const LOG_FORMAT: &str = "LOG_FORMAT";
const DEFAULT_LOG_LEVEL: &str = "INFO";

static INIT_LOGGER: Once = Once::new();

fn level_filter(level: &str) -> LevelFilter {
    match level {
        "TRACE" => LevelFilter::Trace,
        "DEBUG" => LevelFilter::Debug,
        "INFO" => LevelFilter::Info,
        "WARN" => LevelFilter::Warn,
        "ERROR" => LevelFilter::Error,
        _ => {
            eprintln!("⚠️ 无效日志级别「{}」，使用默认 INFO", level);
            LevelFilter::Info
        }
    }
}

pub fn init_logger() {
    INIT_LOGGER.call_once(|| {
        let log_level = std::env::var(LOG_LEVEL)
            .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string())
            .to_uppercase();
        let filter = level_filter(&log_level);

        let json = std::env::var(LOG_FORMAT)
            .map(|f| f.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let result = if json {
            init_json(filter)
        } else {
            init_console(filter)
        };

        match result {
            Ok(()) => log::info!("✅ 日志系统初始化完成 | 级别: {} | json: {}", log_level, json),
            Err(e) => eprintln!("❌ 日志初始化失败: {}", e),
        }
    });
}

/// JSON 输出（默认启用 tracing-log，log 宏同样会被收集）
fn init_json(filter: LevelFilter) -> Result<(), String> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{},ethers_providers=warn", filter.as_str().to_lowercase()))
    });
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(env_filter)
        .with_current_span(true)
        .try_init()
        .map_err(|e| e.to_string())
}

fn init_console(filter: LevelFilter) -> Result<(), String> {
    let mut builder = Builder::from_default_env();
    builder
        .filter(None, filter)
        .filter(Some("ethers_providers"), LevelFilter::Warn)
        .write_style(WriteStyle::Auto)
        .format(|f: &mut Formatter, record: &Record| {
            let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S.%3f");
            let level_color = match record.level() {
                Level::Error => "\x1b[91m",
                Level::Warn => "\x1b[93m",
                Level::Info => "\x1b[92m",
                Level::Debug => "\x1b[96m",
                Level::Trace => "\x1b[95m",
            };
            writeln!(
                f,
                "[{}] [{}{:>5}\x1b[0m] [{}] - {}",
                now,
                level_color,
                record.level(),
                record.module_path().unwrap_or("unknown"),
                record.args()
            )
        })
        .target(Target::Stdout);
    builder.try_init().map_err(|e| e.to_string())
}

// ==================== 便捷日志宏 ====================
#[macro_export]
macro_rules! log_trace { ($($arg:tt)*) => { log::trace!($($arg)*) }; }
#[macro_export]
macro_rules! log_debug { ($($arg:tt)*) => { log::debug!($($arg)*) }; }
#[macro_export]
macro_rules! log_info  { ($($arg:tt)*) => { log::info!($($arg)*) }; }
#[macro_export]
macro_rules! log_warn  { ($($arg:tt)*) => { log::warn!($($arg)*) }; }
#[macro_export]
macro_rules! log_error { ($($arg:tt)*) => { log::error!($($arg)*) }; }
