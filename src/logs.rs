use clap::Subcommand;
use std::fs::{File, metadata};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use crate::config;

const SIZE_WARNING_BYTES: u64 = 5 * 1024 * 1024;

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum LogsAction {
    /// Show recent log entries
    Show {
        /// Number of lines to show
        #[arg(short, long, default_value = "50")]
        lines: usize,
    },

    /// Clear the log file
    Clear,
}

pub fn init_logger() -> Result<(), Box<dyn std::error::Error>> {
    let log_file = config::log_file_path()?;

    if let Some(parent) = log_file.parent() {
        std::fs::create_dir_all(parent)?;
    }

    Ok(())
}

pub fn log_info(msg: &str) {
    write_log("INFO", msg);
}

pub fn log_warn(msg: &str) {
    write_log("WARN", msg);
}

pub fn log_error(msg: &str) {
    write_log("ERROR", msg);
}

fn format_entry(level: &str, msg: &str) -> String {
    let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
    format!("[{}] {}: {}\n", timestamp, level, msg)
}

fn append(log_file: &Path, entry: &str) -> std::io::Result<()> {
    if let Some(parent) = log_file.parent()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent)?;
    }

    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)?
        .write_all(entry.as_bytes())
}

fn write_log(level: &str, msg: &str) {
    let Ok(log_file) = config::log_file_path() else {
        return;
    };

    if append(&log_file, &format_entry(level, msg)).is_err() {
        return;
    }

    if let Ok(size) = metadata(&log_file).map(|m| m.len())
        && size > SIZE_WARNING_BYTES
    {
        let warning = format!(
            "Log file is {:.1} MiB. Consider running '{} logs clear'",
            size as f64 / 1_048_576.0,
            config::APP_NAME
        );
        let _ = append(&log_file, &format_entry("WARN", &warning));
    }
}

pub fn handle_logs_command(action: Option<LogsAction>) -> Result<(), Box<dyn std::error::Error>> {
    match action.unwrap_or(LogsAction::Show { lines: 50 }) {
        LogsAction::Show { lines } => show_logs(lines),
        LogsAction::Clear => clear_logs(),
    }
}

fn show_logs(lines: usize) -> Result<(), Box<dyn std::error::Error>> {
    let log_file = config::log_file_path()?;

    if !log_file.exists() {
        println!("No log file found");
        return Ok(());
    }

    let size = metadata(&log_file)?.len();
    if size > SIZE_WARNING_BYTES {
        eprintln!(
            "Warning: Log file is {:.1} MiB. Consider clearing it.",
            size as f64 / 1_048_576.0
        );
    }

    for line in tail(&log_file, lines)? {
        println!("{}", line);
    }

    Ok(())
}

fn tail(log_file: &Path, lines: usize) -> std::io::Result<Vec<String>> {
    let reader = BufReader::new(File::open(log_file)?);
    let mut all_lines: Vec<String> = reader.lines().collect::<Result<Vec<_>, _>>()?;

    let start = all_lines.len().saturating_sub(lines);
    Ok(all_lines.split_off(start))
}

fn clear_logs() -> Result<(), Box<dyn std::error::Error>> {
    let log_file = config::log_file_path()?;

    if log_file.exists() {
        std::fs::write(&log_file, "")?;
        println!("Log file cleared");
    } else {
        println!("No log file to clear");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_has_timestamp_level_and_message() {
        let entry = format_entry("WARN", "disk nearly full");
        assert!(entry.starts_with('['));
        assert!(entry.ends_with("] WARN: disk nearly full\n"));
        // [YYYY-MM-DD HH:MM:SS]
        assert_eq!(entry.find(']'), Some(20));
    }

    #[test]
    fn tail_returns_last_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.log");
        std::fs::write(&path, "one\ntwo\nthree\nfour\n").unwrap();

        assert_eq!(tail(&path, 2).unwrap(), vec!["three", "four"]);
        assert_eq!(tail(&path, 10).unwrap().len(), 4);
        assert!(tail(&path, 0).unwrap().is_empty());
    }

    #[test]
    fn append_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fresh.log");

        append(&path, "first\n").unwrap();
        append(&path, "second\n").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }

    #[test]
    fn append_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/app.log");

        append(&path, "hello\n").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello\n");
    }
}
