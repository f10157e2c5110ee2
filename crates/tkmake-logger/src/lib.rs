//! Console and log-file output for the tkmake CLI
//!
//! Every message goes to `~/.config/tkmake/tkmake.log` (truncated when the
//! process starts). What reaches the terminal depends on the verbosity chosen
//! on the command line and on `--no-stdout`. Library crates use `tracing`
//! instead; this crate is for what the user is meant to read.

use colored::{ColoredString, Colorize};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

const LOG_FILE_NAME: &str = "tkmake.log";
const SPINNER_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Error,
    Warn,
    Success,
    Info,
    Debug,
    Step,
}

impl Level {
    fn tag(self) -> &'static str {
        match self {
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Success => "SUCCESS",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Step => "STEP",
        }
    }

    /// Lowest verbosity at which the message is echoed to the terminal.
    fn threshold(self) -> u8 {
        match self {
            Level::Error | Level::Warn | Level::Success => 0,
            Level::Info | Level::Debug => 1,
            Level::Step => 2,
        }
    }

    /// Errors and warnings ignore `--no-stdout`.
    fn always_shown(self) -> bool {
        matches!(self, Level::Error | Level::Warn)
    }

    fn prefix(self) -> Option<ColoredString> {
        match self {
            Level::Error => Some("Error:".red().bold()),
            Level::Warn => Some("warning:".yellow().bold()),
            Level::Success => Some("\u{2714}".green().bold()),
            Level::Info => None,
            Level::Debug => Some("debug:".blue().bold()),
            Level::Step => Some("step:".dimmed()),
        }
    }
}

struct State {
    verbosity: u8,
    no_stdout: bool,
    log_path: Option<PathBuf>,
    log_file: Option<File>,
    spinner: Option<ProgressBar>,
}

static STATE: Mutex<State> = Mutex::new(State {
    verbosity: 0,
    no_stdout: false,
    log_path: None,
    log_file: None,
    spinner: None,
});

fn state() -> Option<MutexGuard<'static, State>> {
    STATE.lock().ok()
}

pub fn get_verbosity() -> u8 {
    state().map_or(0, |s| s.verbosity)
}

/// `tracing` filter directive for the current verbosity.
pub fn verbosity_to_filter() -> &'static str {
    filter_for(get_verbosity())
}

fn filter_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    }
}

/// Set verbosity and output mode, then start a fresh log file.
pub fn init_with_verbosity(verbosity: u8, no_stdout: bool) -> Result<(), String> {
    let dir = log_dir()?;
    fs::create_dir_all(&dir).map_err(|e| format!("Failed to create {}: {}", dir.display(), e))?;
    let path = dir.join(LOG_FILE_NAME);
    let file = File::create(&path).map_err(|e| format!("Failed to open {}: {}", path.display(), e))?;

    let mut s = state().ok_or_else(|| "Logger state lock poisoned".to_string())?;
    s.verbosity = verbosity;
    s.no_stdout = no_stdout;
    s.log_path = Some(path);
    s.log_file = Some(file);
    Ok(())
}

fn log_dir() -> Result<PathBuf, String> {
    #[cfg(not(target_os = "windows"))]
    let base = dirs::home_dir()
        .ok_or("Could not determine home directory")?
        .join(".config");

    #[cfg(target_os = "windows")]
    let base = dirs::config_dir().ok_or("Could not determine config directory")?;

    Ok(base.join("tkmake"))
}

fn write_line(s: &mut State, line: &str) {
    if let Some(file) = s.log_file.as_mut() {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        let _ = writeln!(file, "[{}] {}", timestamp, line);
    }
}

fn emit(level: Level, message: &str) {
    let Some(mut s) = state() else {
        eprintln!("{}", message);
        return;
    };
    write_line(&mut s, &format!("{} {}", level.tag(), message));

    let visible = s.verbosity >= level.threshold() && (level.always_shown() || !s.no_stdout);
    if !visible {
        return;
    }
    // Keep the spinner line from being overwritten mid-message.
    let print = || match level.prefix() {
        Some(prefix) => eprintln!("{} {}", prefix, message),
        None => eprintln!("{}", message),
    };
    match &s.spinner {
        Some(spinner) => spinner.suspend(print),
        None => print(),
    }
}

pub fn error(message: &str) {
    emit(Level::Error, message);
}

pub fn warn(message: &str) {
    emit(Level::Warn, message);
}

pub fn success(message: &str) {
    emit(Level::Success, message);
}

/// Shown with -v.
pub fn info(message: &str) {
    emit(Level::Info, message);
}

/// Shown with -v.
pub fn debug(message: &str) {
    emit(Level::Debug, message);
}

/// Progress detail, shown with -vv.
pub fn step(message: &str) {
    emit(Level::Step, message);
}

/// Record a finished subprocess and whatever it printed.
pub fn capture_output(command_name: &str, output: &std::process::Output) {
    let Some(mut s) = state() else {
        return;
    };
    let status = output
        .status
        .code()
        .map_or_else(|| "signal".to_string(), |code| code.to_string());
    write_line(&mut s, &format!("COMMAND {} exited with {}", command_name, status));
    for (stream, bytes) in [("stdout", &output.stdout), ("stderr", &output.stderr)] {
        if !bytes.is_empty() {
            let text = String::from_utf8_lossy(bytes);
            write_line(&mut s, &format!("  {}:\n{}", stream, text.trim_end()));
        }
    }
}

pub fn get_log_path() -> Option<PathBuf> {
    state().and_then(|s| s.log_path.clone())
}

pub fn show_log_path() {
    match get_log_path().or_else(|| log_dir().ok().map(|d| d.join(LOG_FILE_NAME))) {
        Some(path) => eprintln!("Log file: {}", path.display()),
        None => eprintln!("Log file location not available"),
    }
}

/// Spin while a slow operation runs. Skipped when verbose output would
/// interleave with it or when the terminal is off limits.
pub fn spinner_start(message: &str) {
    let Some(mut s) = state() else {
        return;
    };
    if s.verbosity > 0 || s.no_stdout {
        return;
    }
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_strings(SPINNER_FRAMES)
        .template("{spinner:.cyan} {msg}")
    {
        spinner.set_style(style);
    }
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner.set_message(message.to_string());
    if let Some(previous) = s.spinner.replace(spinner) {
        previous.finish_and_clear();
    }
}

pub fn spinner_success(message: &str) {
    spinner_stop();
    success(message);
}

pub fn spinner_error(message: &str) {
    spinner_stop();
    emit(Level::Error, message);
}

pub fn spinner_stop() {
    let spinner = state().and_then(|mut s| s.spinner.take());
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
}
