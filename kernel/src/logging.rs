//! `log` backend writing to the serial console.
//!
//! Lines look like `[ WARN][zuros_kernel::storage::flat_fs] message`.
//! The level filter comes from `config::log_level`.
use log::{Level, Log, Metadata, Record};

use crate::config;
use crate::serial_println;

/// Add an ANSI color escape around the formatted line.
macro_rules! with_color {
    ($args:expr, $color_code:expr) => {{
        format_args!("\u{1B}[{}m{}\u{1B}[0m", $color_code as u8, $args)
    }};
}

struct SerialLogger;

impl Log for SerialLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let color = match record.level() {
            Level::Error => 31, // Red
            Level::Warn => 93,  // BrightYellow
            Level::Info => 34,  // Blue
            Level::Debug => 32, // Green
            Level::Trace => 90, // BrightBlack
        };
        serial_println!(
            "{}",
            with_color!(
                format_args!(
                    "[{:>5}][{}] {}",
                    record.level(),
                    record.target(),
                    record.args()
                ),
                color
            )
        );
    }

    fn flush(&self) {}
}

static LOGGER: SerialLogger = SerialLogger;

/// Install the serial logger. Call once, after the serial port is up.
pub fn init() {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(config::log_level());
    }
}
