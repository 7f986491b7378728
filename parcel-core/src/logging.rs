//! A process-wide logging sink with singleton lifetime and a single lock
//! guarding formatting and the write itself — the Rust shape of design
//! note §9's "injectable logging sink initialized once at process start,
//! guarded by a single lock", standing in for the original's
//! `log.c`/`log.h` global mutex-guarded logger.
//!
//! Binaries call [`init`] once from `main`; library code just uses the
//! `log` facade macros (`log::info!`, `log::warn!`, ...) as usual. Tests
//! that want to assert on log output can construct a [`SharedLogSink`]
//! directly and install it with `log::set_boxed_logger`.

use log::{Level, LevelFilter, Log, Metadata, Record};
use std::io::Write;
use std::sync::Mutex;

pub struct SharedLogSink {
    lock: Mutex<()>,
    level: LevelFilter,
}

impl SharedLogSink {
    pub fn new(level: LevelFilter) -> SharedLogSink {
        SharedLogSink {
            lock: Mutex::new(()),
            level,
        }
    }
}

impl Log for SharedLogSink {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let _guard = self.lock.lock().unwrap_or_else(|poison| poison.into_inner());
        let stream = std::io::stderr();
        let mut handle = stream.lock();
        let _ = writeln!(
            handle,
            "[{level}] {target}: {args}",
            level = color_code(record.level()),
            target = record.target(),
            args = record.args(),
        );
    }

    fn flush(&self) {
        let stream = std::io::stderr();
        let _ = stream.lock().flush();
    }
}

fn color_code(level: Level) -> &'static str {
    match level {
        Level::Error => "ERROR",
        Level::Warn => "WARN ",
        Level::Info => "INFO ",
        Level::Debug => "DEBUG",
        Level::Trace => "TRACE",
    }
}

/// Install the shared sink as the global `log` logger. Call once from
/// each binary's `main`. Subsequent calls are no-ops (matching
/// `log::set_boxed_logger`'s own idempotence contract).
pub fn init(level: LevelFilter) {
    let sink = SharedLogSink::new(level);
    if log::set_boxed_logger(Box::new(sink)).is_ok() {
        log::set_max_level(level);
    }
}
