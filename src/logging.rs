/*
================================================================================
                            ade20k-masks Logging
================================================================================

Console logging for the command-line tool, built on `env_logger` behind the
`log` facade. Library code only uses the `log` macros (debug!, info!, ...);
installing a logger is left to the binary.

**Log Levels**:
- RUST_LOG, when set, takes precedence
- Otherwise: DEBUG and above for this crate in debug builds (or with
  --verbose), INFO and above in release builds
- Logs from other crates are filtered out

**Format**: `timestamp LEVEL module:line message`, UTC timestamps, colored levels.
================================================================================
*/

use std::io::Write;
use chrono::Utc;
use env_logger::fmt::{Color, Formatter};
use log::{Level, LevelFilter, Record};

/// Target prefix of this crate's log records
const CRATE_TARGET: &str = "ade20k_masks";

/// Default level for this crate when RUST_LOG is not set
pub fn default_level(verbose: bool) -> LevelFilter {
    if verbose || cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

fn module_info(record: &Record) -> String {
    if let (Some(module), Some(line)) = (record.module_path(), record.line()) {
        format!("{module}:{line}")
    } else if let Some(module) = record.module_path() {
        module.to_string()
    } else if let Some(line) = record.line() {
        format!("line:{line}")
    } else {
        "unknown".to_string()
    }
}

pub fn setup_logger(verbose: bool) {
    let mut builder = env_logger::Builder::new();

    // First check if RUST_LOG is set - if so, use that configuration
    if std::env::var("RUST_LOG").is_ok() {
        builder.parse_env("RUST_LOG");
    } else {
        // Filter out all other crates' logs
        builder.filter(None, LevelFilter::Off);
        builder.filter(Some(CRATE_TARGET), default_level(verbose));
    }

    builder.format(|buf: &mut Formatter, record: &Record| {
        let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ");

        let mut level_style = buf.style();
        let mut meta_style = buf.style();

        match record.level() {
            Level::Error => level_style.set_color(Color::Red).set_bold(true),
            Level::Warn => level_style.set_color(Color::Yellow).set_bold(true),
            Level::Info => level_style.set_color(Color::Green).set_bold(true),
            Level::Debug => level_style.set_color(Color::Blue).set_bold(true),
            Level::Trace => level_style.set_color(Color::White),
        };

        #[cfg(target_os = "macos")]
        {
            // Color::Rgb does not work on macOS
            meta_style.set_color(Color::Blue);
        }

        #[cfg(not(target_os = "macos"))]
        {
            meta_style.set_color(Color::Rgb(120, 120, 120));
        }

        writeln!(
            buf,
            "{} {:<5} {} {}",
            meta_style.value(timestamp),
            level_style.value(record.level()),
            meta_style.value(module_info(record)),
            record.args()
        )
    });

    // A logger may already be installed (e.g. in tests); keep the existing one
    if builder.try_init().is_err() {
        log::debug!("Logger already initialized");
    }
}
