// src/utils/logger.rs

use log::{Level, LevelFilter, Metadata, Record, SetLoggerError};
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};

static LOGGER: ConsoleLogger = ConsoleLogger;
static MAX_LEVEL: AtomicUsize = AtomicUsize::new(LevelFilter::Info as usize);

struct ConsoleLogger;

pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
  MAX_LEVEL.store(level as usize, Ordering::Relaxed);
  log::set_logger(&LOGGER).map(|()| log::set_max_level(level))
}

/// Parse "error", "warn", "info", "debug", "trace" or "off"
pub fn parse_level(name: &str) -> Option<LevelFilter> {
  name.trim().parse().ok()
}

fn icon(level: Level) -> &'static str {
  match level {
    Level::Error => "🔴", // Red Circle
    Level::Warn => "🟠",  // Orange Circle
    Level::Info => "🔵",  // Blue Circle
    Level::Debug => "⚪", // White/Gray Circle
    Level::Trace => "▫️", // Small dot
  }
}

impl log::Log for ConsoleLogger {
  fn enabled(&self, metadata: &Metadata) -> bool {
    (metadata.level() as usize) <= MAX_LEVEL.load(Ordering::Relaxed)
  }

  fn log(&self, record: &Record) {
    if self.enabled(record.metadata()) {
      // Format: "🔴  Configuration error: ..."
      let msg = if record.level() >= Level::Debug {
        format!("{}  [{}] {}\n", icon(record.level()), record.target(), record.args())
      } else {
        format!("{}  {}\n", icon(record.level()), record.args())
      };

      // single write per record
      let _ = std::io::stderr().lock().write_all(msg.as_bytes());
    }
  }

  fn flush(&self) {
    let _ = std::io::stderr().flush();
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_level() {
    assert_eq!(parse_level("debug"), Some(LevelFilter::Debug));
    assert_eq!(parse_level(" WARN "), Some(LevelFilter::Warn));
    assert_eq!(parse_level("loud"), None);
  }

  #[test]
  fn test_level_ordering() {
    assert_eq!(icon(Level::Error), "🔴");
    MAX_LEVEL.store(LevelFilter::Info as usize, Ordering::Relaxed);
    let info = Metadata::builder().level(Level::Info).build();
    let trace = Metadata::builder().level(Level::Trace).build();
    assert!(log::Log::enabled(&LOGGER, &info));
    assert!(!log::Log::enabled(&LOGGER, &trace));
  }
}
