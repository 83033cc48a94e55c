use colored::Colorize;
use indicatif::ProgressBar;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

/// Environment variable that overrides the log directory.
pub const LOG_DIR_ENV: &str = "TERRAPREP_LOG_DIR";

const LOG_FILE_NAME: &str = "terraprep.log";

static LOG_FILE: Mutex<Option<PathBuf>> = Mutex::new(None);
static VERBOSITY: Mutex<u8> = Mutex::new(0);
static SPINNER: Mutex<Option<ProgressBar>> = Mutex::new(None);

/// Get the current verbosity level
pub fn get_verbosity() -> u8 {
    VERBOSITY.lock().ok().map(|v| *v).unwrap_or(0)
}

/// Map the verbosity level to a `tracing` filter directive
/// 0 = warn only, 1 = debug (-v), 2 = trace (-vv)
pub fn verbosity_to_filter() -> &'static str {
    match get_verbosity() {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    }
}

/// Initialize the logger with a verbosity level
pub fn init_with_verbosity(verbosity: u8) -> Result<(), String> {
    if let Ok(mut v) = VERBOSITY.lock() {
        *v = verbosity;
    }

    init()
}

fn init() -> Result<(), String> {
    let log_dir = get_log_dir()?;
    fs::create_dir_all(&log_dir).map_err(|e| format!("Failed to create log directory: {}", e))?;

    let log_file = log_dir.join(LOG_FILE_NAME);

    // Truncate on each run
    if log_file.exists() {
        let _ = fs::remove_file(&log_file);
    }

    let mut log_file_guard = LOG_FILE
        .lock()
        .map_err(|_| "Log file lock poisoned".to_string())?;
    *log_file_guard = Some(log_file);

    Ok(())
}

fn get_log_dir() -> Result<PathBuf, String> {
    if let Ok(dir) = std::env::var(LOG_DIR_ENV) {
        let trimmed = dir.trim();
        if !trimmed.is_empty() {
            return Ok(PathBuf::from(trimmed));
        }
    }

    #[cfg(not(target_os = "windows"))]
    let log_dir = dirs::home_dir()
        .ok_or("Could not determine home directory")?
        .join(".config")
        .join("terraprep");

    #[cfg(target_os = "windows")]
    let log_dir = dirs::config_dir()
        .ok_or("Could not determine config directory")?
        .join("terraprep");

    Ok(log_dir)
}

fn write_to_log(message: &str) {
    if let Ok(log_file_guard) = LOG_FILE.lock() {
        if let Some(ref log_path) = *log_file_guard {
            if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(log_path) {
                let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
                let _ = writeln!(file, "[{}] {}", timestamp, message);
            }
        }
    }
}

/// Log an informational message (to console if verbose >= 1, always to file)
pub fn info(message: &str) {
    write_to_log(&format!("INFO {}", message));
    if get_verbosity() >= 1 {
        eprintln!("{}", message);
    }
}

/// Log a debug message (to console if verbose >= 1, always to file)
pub fn debug(message: &str) {
    write_to_log(&format!("DEBUG {}", message));
    if get_verbosity() >= 1 {
        eprintln!("{} {}", "DEBUG:".blue().bold(), message);
    }
}

/// Log a warning message (to both file and console)
pub fn warn(message: &str) {
    write_to_log(&format!("WARN {}", message));
    eprintln!("{} {}", "warning:".yellow().bold(), message);
}

/// Log an error message (to both file and console)
pub fn error(message: &str) {
    write_to_log(&format!("ERROR {}", message));
    eprintln!("{} {}", "Error:".red().bold(), message);
}

/// Log a success message
pub fn success(message: &str) {
    write_to_log(&format!("SUCCESS {}", message));
    eprintln!("{} {}", "\u{2714}".green().bold(), message);
}

/// Log a step message (shown on console at -vv)
pub fn step(message: &str) {
    if get_verbosity() >= 2 {
        eprintln!("TRACE: {}", message);
    }
    write_to_log(&format!("STEP: {}", message));
}

/// Record the output of an external command in the log file
pub fn capture_output(command_name: &str, output: &std::process::Output) {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    write_to_log(&format!(
        "COMMAND: {} (exit code: {:?})",
        command_name,
        output.status.code()
    ));

    if !stdout.is_empty() {
        write_to_log(&format!("  STDOUT:\n{}", stdout));
    }

    if !stderr.is_empty() {
        write_to_log(&format!("  STDERR:\n{}", stderr));
    }
}

/// Get the log file path for display
pub fn get_log_path() -> Option<PathBuf> {
    LOG_FILE.lock().ok().and_then(|guard| guard.clone())
}

/// Print the log file path to the user
pub fn show_log_path() {
    if let Some(path) = get_log_path() {
        eprintln!("Log file: {}", path.display());
    } else if let Ok(log_dir) = get_log_dir() {
        eprintln!("Log file: {}", log_dir.join(LOG_FILE_NAME).display());
    } else {
        eprintln!("Log file location not available");
    }
}

/// Start a spinner with the given message (only if not verbose)
pub fn spinner_start(message: &str) {
    write_to_log(&format!("START {}", message));
    if get_verbosity() > 0 {
        eprintln!("{}", message);
        return;
    }

    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = indicatif::ProgressStyle::default_spinner()
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
        .template("{spinner:.cyan} {msg}")
    {
        spinner.set_style(style);
    }
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    spinner.set_message(message.to_string());

    if let Ok(mut spinner_guard) = SPINNER.lock() {
        *spinner_guard = Some(spinner);
    }
}

/// Complete the spinner with a success message
pub fn spinner_success(message: &str) {
    spinner_stop();
    success(message);
}

/// Stop the spinner with an error message
pub fn spinner_error(message: &str) {
    spinner_stop();
    write_to_log(&format!("FAILED {}", message));
    eprintln!("  {} {}", "✗".red().bold(), message);
}

/// Stop the spinner without any message
pub fn spinner_stop() {
    if let Ok(mut spinner_guard) = SPINNER.lock() {
        if let Some(spinner) = spinner_guard.take() {
            spinner.finish_and_clear();
        }
    }
}
