//! Log formatting and output with ANSI colors
//!
//! Handles:
//! - Colorized console output with tag and level columns
//! - Wrapping long messages at word boundaries
//! - Dual output (console + file)
//! - Broken pipe handling for piped commands

use super::file::write_to_file;
use super::tags::LogTag;
use chrono::Local;
use colored::*;
use std::io::{stdout, ErrorKind, Write};

/// Log format widths for alignment
const TAG_WIDTH: usize = 9;
const LEVEL_WIDTH: usize = 8;

/// Maximum line length before wrapping
const MAX_LINE_LENGTH: usize = 140;

/// Format and output a log message
pub fn format_and_log(tag: LogTag, level: &str, message: &str) {
    let now = Local::now();
    let time = now.format("%H:%M:%S").to_string();

    let prefix = format!("{} ", time).dimmed().to_string();
    let base_line = format!("{}[{}] [{}] ", prefix, format_tag(&tag), format_level(level));

    let base_length = TAG_WIDTH + LEVEL_WIDTH + 6 + time.len() + 1;
    let available = MAX_LINE_LENGTH.saturating_sub(base_length).max(50);
    let chunks = wrap_text(message, available);

    print_stdout_safe(&format!("{}{}", base_line, chunks[0]));

    let timestamp = now.format("%Y-%m-%d %H:%M:%S").to_string();
    let tag_clean = tag.to_plain_string();
    write_to_file(&format!(
        "{} [{}] [{}] {}",
        timestamp, tag_clean, level, chunks[0]
    ));

    if chunks.len() > 1 {
        let continuation_prefix = " ".repeat(base_length);
        for chunk in &chunks[1..] {
            print_stdout_safe(&format!("{}{}", continuation_prefix, chunk));
            write_to_file(&format!("{} [{}] [{}] {}", timestamp, tag_clean, level, chunk));
        }
    }
}

/// Format a tag with appropriate color
fn format_tag(tag: &LogTag) -> ColoredString {
    let name = tag.to_plain_string();
    let padded = format!("{:<width$}", name, width = TAG_WIDTH);
    match tag {
        LogTag::System => padded.bright_yellow().bold(),
        LogTag::Ledger => padded.bright_blue().bold(),
        LogTag::Trading => padded.bright_green().bold(),
        LogTag::Pending => padded.bright_magenta().bold(),
        LogTag::Monkey => padded.bright_cyan().bold(),
        LogTag::Commands => padded.bright_white().bold(),
        LogTag::Market => padded.bright_green().bold(),
        LogTag::Archive => padded.bright_red().bold(),
        LogTag::Test => padded.bright_blue().bold(),
        LogTag::Other(_) => padded.white().bold(),
    }
}

/// Format a level column with appropriate color
fn format_level(level: &str) -> ColoredString {
    let padded = format!("{:<width$}", level, width = LEVEL_WIDTH);
    match level {
        "ERROR" => padded.bright_red().bold(),
        "WARNING" => padded.bright_yellow().bold(),
        _ => padded.white().bold(),
    }
}

/// Print to stdout but ignore broken pipe errors
fn print_stdout_safe(message: &str) {
    if let Err(e) = writeln!(stdout(), "{}", message) {
        if e.kind() == ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
        let _ = writeln!(std::io::stderr(), "Logger stdout error: {}", e);
    }
    if let Err(e) = stdout().flush() {
        if e.kind() == ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
    }
}

/// Wrap text at word boundaries, respecting existing newlines
fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    let mut result = Vec::new();

    for line in text.split('\n') {
        if line.chars().count() <= max_width {
            result.push(line.to_string());
            continue;
        }

        let mut current = String::new();
        for word in line.split_whitespace() {
            if current.is_empty() {
                current = word.to_string();
            } else if current.chars().count() + word.chars().count() + 1 <= max_width {
                current.push(' ');
                current.push_str(word);
            } else {
                result.push(current);
                current = word.to_string();
            }
        }
        if !current.is_empty() {
            result.push(current);
        }
    }

    if result.is_empty() {
        result.push(String::new());
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_text_short_line_untouched() {
        let chunks = wrap_text("hello world", 50);
        assert_eq!(chunks, vec!["hello world".to_string()]);
    }

    #[test]
    fn test_wrap_text_breaks_at_words() {
        let chunks = wrap_text("one two three four", 9);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 9);
        }
    }
}
