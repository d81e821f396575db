/// Logger configuration and per-module debug gating
///
/// Debug flags are read once from the command line at init; tests can update
/// the config afterwards through `set_logger_config`.
use super::levels::LogLevel;
use super::tags::LogTag;
use crate::arguments;
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::sync::RwLock;

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Minimum level to display (Error always shows)
    pub min_level: LogLevel,
    /// Modules with --debug-<module> enabled
    pub debug_modules: HashSet<String>,
    /// Mirror log output to a file
    pub file_logging: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            debug_modules: HashSet::new(),
            file_logging: true,
        }
    }
}

static LOGGER_CONFIG: Lazy<RwLock<LoggerConfig>> =
    Lazy::new(|| RwLock::new(LoggerConfig::default()));

pub fn get_logger_config() -> LoggerConfig {
    LOGGER_CONFIG
        .read()
        .map(|c| c.clone())
        .unwrap_or_default()
}

pub fn set_logger_config(config: LoggerConfig) {
    if let Ok(mut c) = LOGGER_CONFIG.write() {
        *c = config;
    }
}

/// Scan CMD_ARGS for --log-level, --verbose and --debug-<module> flags
pub fn init_from_args() {
    let mut config = LoggerConfig::default();

    if let Some(level) = arguments::get_arg_value("--log-level").and_then(|s| LogLevel::parse(&s))
    {
        config.min_level = level;
    }
    // --verbose wins over an explicit level
    if arguments::is_verbose_enabled() {
        config.min_level = LogLevel::Verbose;
    }

    for arg in arguments::get_cmd_args() {
        if let Some(module) = arg.strip_prefix("--debug-") {
            config.debug_modules.insert(module.to_string());
        }
    }

    set_logger_config(config);
}

/// Whether debug output is enabled for a specific tag
pub fn is_debug_enabled_for_tag(tag: &LogTag) -> bool {
    let config = get_logger_config();
    config.debug_modules.contains(&tag.to_debug_key())
}
