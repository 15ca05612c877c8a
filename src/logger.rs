use slog::Drain;
use slog_term::{CompactFormat, TermDecorator};
use std::io;
use std::sync::Mutex;
use time::{OffsetDateTime, UtcOffset};

use slog::*;

pub struct Logger {
    pub log_level: u8,
    logger: slog::Logger,
}

/// Maps the cli's numeric level to a slog level
pub fn level_from_u8(log_level: u8) -> Level {
    match log_level {
        0 => Level::Critical,
        1 => Level::Error,
        2 => Level::Warning,
        3 => Level::Info,
        4 => Level::Debug,
        5 => Level::Trace,
        // Anything above is as verbose as it gets
        _ => Level::Trace,
    }
}

fn to_localtime(dt: OffsetDateTime) -> OffsetDateTime {
    let tz_offset_sec = chrono::Local::now().offset().local_minus_utc();
    match UtcOffset::from_whole_seconds(tz_offset_sec) {
        Ok(offset) => dt.to_offset(offset),
        Err(_) => dt,
    }
}

// yyyy-mm-dd hh:mm:ss.mmm
fn timestamp(dt: OffsetDateTime) -> String {
    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:03}",
        dt.year(),
        u8::from(dt.month()),
        dt.day(),
        dt.hour(),
        dt.minute(),
        dt.second(),
        dt.millisecond()
    )
}

// stdout carries the deposit data, logs always go to stderr
fn new_drain(level: Level) -> Fuse<Mutex<Fuse<LevelFilter<CompactFormat<TermDecorator>>>>> {
    let decorator = slog_term::TermDecorator::new().stderr().build();
    let drain = slog_term::CompactFormat::new(decorator)
        .use_custom_timestamp(|w: &mut dyn io::Write| {
            write!(w, "{}", timestamp(to_localtime(OffsetDateTime::now_utc())))
        })
        .build()
        .filter_level(level)
        .fuse();
    Mutex::new(drain).fuse()
}

impl Logger {
    pub fn new(log_level: u8) -> Self {
        let logger = slog::Logger::root(
            new_drain(level_from_u8(log_level)),
            slog::o!("version" => env!("CARGO_PKG_VERSION")),
        );
        Logger { log_level, logger }
    }

    pub fn set_global(&self) -> Result<&Self> {
        // slog_stdlog uses the logger from slog_scope, so set a logger there
        let guard = slog_scope::set_global_logger(self.logger.clone());
        // https://github.com/slog-rs/slog/issues/249
        guard.cancel_reset();
        slog_stdlog::init_with_level(log_level(self.log_level))?;
        Ok(self)
    }
}

fn log_level(log_level: u8) -> log::Level {
    match level_from_u8(log_level) {
        Level::Critical | Level::Error => log::Level::Error,
        Level::Warning => log::Level::Warn,
        Level::Info => log::Level::Info,
        Level::Debug => log::Level::Debug,
        Level::Trace => log::Level::Trace,
    }
}

type Result<T> = std::result::Result<T, log::SetLoggerError>;
