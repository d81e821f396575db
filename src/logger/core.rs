/// Core logging implementation with automatic filtering
///
/// Filtering rules:
/// 1. Errors are always shown
/// 2. Check against the minimum log level threshold
/// 3. Debug level requires --debug-<module> for that tag
/// 4. Verbose level requires --verbose
use super::config::{get_logger_config, is_debug_enabled_for_tag};
use super::levels::LogLevel;
use super::tags::LogTag;

/// Check if a log message should be displayed
pub fn should_log(tag: &LogTag, level: LogLevel) -> bool {
    let config = get_logger_config();

    // Rule 1: Errors always log
    if level == LogLevel::Error {
        return true;
    }

    // Rule 3: --debug-<module> overrides the threshold for its tag
    if level == LogLevel::Debug {
        return is_debug_enabled_for_tag(tag) || config.min_level >= LogLevel::Debug;
    }

    // Rule 2 & 4: threshold check (Verbose only passes when --verbose raised it)
    level <= config.min_level
}

/// Internal logging function with automatic filtering
pub fn log_internal(tag: LogTag, level: LogLevel, message: &str) {
    if !should_log(&tag, level) {
        return;
    }
    super::format::format_and_log(tag, level.as_str(), message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::config::{set_logger_config, LoggerConfig};

    // One test so the global config is not mutated from parallel tests
    #[test]
    fn test_filtering_rules() {
        set_logger_config(LoggerConfig::default());
        assert!(should_log(&LogTag::Ledger, LogLevel::Error));
        assert!(should_log(&LogTag::Ledger, LogLevel::Info));
        assert!(!should_log(&LogTag::Pending, LogLevel::Debug));
        assert!(!should_log(&LogTag::Pending, LogLevel::Verbose));

        let mut config = LoggerConfig::default();
        config.debug_modules.insert("pending".to_string());
        set_logger_config(config);
        assert!(should_log(&LogTag::Pending, LogLevel::Debug));
        assert!(!should_log(&LogTag::Ledger, LogLevel::Debug));

        set_logger_config(LoggerConfig::default());
    }
}
