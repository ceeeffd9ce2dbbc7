//! File-backed debug logging for terrain investigation
//!
//! Routes the `log` macros used across the crate to a plain text file.
//! The file is recreated on each `init_debug_log()` call.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use log::{LevelFilter, Log, Metadata, Record};

lazy_static::lazy_static! {
    static ref DEBUG_LOG: Mutex<Option<File>> = Mutex::new(None);
}

static LOGGER: DebugFileLogger = DebugFileLogger;

struct DebugFileLogger;

impl Log for DebugFileLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.target().starts_with(env!("CARGO_CRATE_NAME"))
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let thread = std::thread::current();
        write_line(&format!(
            "[{:<5}] [{}] {}",
            record.level(),
            thread.name().unwrap_or("?"),
            record.args()
        ));
    }

    fn flush(&self) {
        if let Ok(mut guard) = DEBUG_LOG.lock() {
            if let Some(ref mut file) = *guard {
                let _ = file.flush();
            }
        }
    }
}

fn write_line(msg: &str) {
    if let Ok(mut guard) = DEBUG_LOG.lock() {
        if let Some(ref mut file) = *guard {
            let _ = writeln!(file, "{}", msg);
            let _ = file.flush();
        }
    }
}

/// Start logging to `path` (overwrites any existing log).
///
/// Installs the file logger unless the host already set one, in which case
/// records keep going to the host's logger and the file only gets the header.
pub fn init_debug_log(path: impl AsRef<Path>, level: LevelFilter) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    writeln!(file, "=== TERRAIN STREAM DEBUG LOG ===")?;
    writeln!(file, "Timestamp: {:?}", std::time::SystemTime::now())?;
    writeln!(file)?;

    if let Ok(mut guard) = DEBUG_LOG.lock() {
        *guard = Some(file);
    }

    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
    Ok(())
}

/// Stop writing to the debug file.
pub fn close_debug_log() {
    if let Ok(mut guard) = DEBUG_LOG.lock() {
        *guard = None;
    }
}
