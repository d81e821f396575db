/// File logging: mirrors every console line into logs/paperbot.log
///
/// Failures here are swallowed on purpose; logging must never take the bot
/// down.
use super::config::get_logger_config;
use once_cell::sync::Lazy;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

static LOG_FILE: Lazy<Mutex<Option<std::fs::File>>> = Lazy::new(|| Mutex::new(None));

fn log_file_path() -> PathBuf {
    PathBuf::from("logs").join("paperbot.log")
}

/// Open (and create) the log file. Called once from logger::init().
pub fn init_file_logging() {
    if !get_logger_config().file_logging {
        return;
    }

    if fs::create_dir_all("logs").is_err() {
        return;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path());

    if let (Ok(file), Ok(mut slot)) = (file, LOG_FILE.lock()) {
        *slot = Some(file);
    }
}

/// Append one line to the log file, if file logging is active
pub fn write_to_file(line: &str) {
    if let Ok(mut slot) = LOG_FILE.lock() {
        if let Some(file) = slot.as_mut() {
            let _ = writeln!(file, "{}", line);
        }
    }
}
