/// Centralized argument handling for PaperBot
///
/// Consolidates command-line argument storage and debug flag checking so the
/// logger and individual modules read flags from one place.
///
/// Features:
/// - Centralized CMD_ARGS storage with thread-safe access
/// - Per-module debug flag checks (--debug-<module>)
/// - Simple flag/value parsing utilities
use once_cell::sync::Lazy;
use std::env;
use std::sync::Mutex;

/// Global command-line arguments storage
pub static CMD_ARGS: Lazy<Mutex<Vec<String>>> = Lazy::new(|| Mutex::new(env::args().collect()));

/// Sets the global command-line arguments
/// Used by tests to override the default env::args() collection
pub fn set_cmd_args(args: Vec<String>) {
    if let Ok(mut cmd_args) = CMD_ARGS.lock() {
        *cmd_args = args;
    }
}

/// Gets a copy of the current command-line arguments
pub fn get_cmd_args() -> Vec<String> {
    match CMD_ARGS.lock() {
        Ok(args) => args.clone(),
        Err(_) => env::args().collect(),
    }
}

/// Checks if a specific argument is present in the command line
pub fn has_arg(arg: &str) -> bool {
    get_cmd_args().iter().any(|a| a == arg)
}

/// Gets the value of a command-line argument that follows a flag
/// Returns None if the flag is not found or has no value
pub fn get_arg_value(flag: &str) -> Option<String> {
    let args = get_cmd_args();
    for (i, arg) in args.iter().enumerate() {
        if arg == flag && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
    }
    None
}

// =============================================================================
// DEBUG FLAG CHECKING FUNCTIONS
// =============================================================================

pub fn is_verbose_enabled() -> bool {
    has_arg("--verbose")
}

pub fn is_debug_ledger_enabled() -> bool {
    has_arg("--debug-ledger")
}

pub fn is_debug_trading_enabled() -> bool {
    has_arg("--debug-trading")
}

pub fn is_debug_pending_enabled() -> bool {
    has_arg("--debug-pending")
}

pub fn is_debug_monkey_enabled() -> bool {
    has_arg("--debug-monkey")
}

pub fn is_help_requested() -> bool {
    has_arg("--help") || has_arg("-h")
}

/// Path to the config file (override with --config <path>)
pub fn get_config_path() -> String {
    get_arg_value("--config").unwrap_or_else(|| "config.json".to_string())
}

/// Print usage information
pub fn print_help() {
    println!("PaperBot - virtual stock trading simulator");
    println!();
    println!("USAGE:");
    println!("    paperbot [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    --config <path>     Config file path (default: config.json)");
    println!("    --log-level <level> Minimum log level (error/warning/info/debug/verbose)");
    println!("    --verbose           Show verbose log output");
    println!("    --debug-ledger      Debug output for ledger writes/reads");
    println!("    --debug-trading     Debug output for settlement");
    println!("    --debug-pending     Debug output for interactive trade state");
    println!("    --debug-monkey      Debug output for the monkey auto-trader");
    println!("    -h, --help          Print this help message");
}
