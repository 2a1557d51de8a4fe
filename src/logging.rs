use std::env;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Mutex;
use tracing::{debug, error, info, trace, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static LOG_FILE: Mutex<Option<std::fs::File>> = Mutex::new(None);

/// Initialize logging system
/// - Console logging is ONLY enabled when RUST_LOG is set
/// - File logging is enabled when SKALD_LOG_FILE is set (see below)
pub fn init_logging() {
    let rust_log_present = env::var("RUST_LOG").is_ok();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Only add console layer if RUST_LOG is set
    if rust_log_present {
        let console_layer = fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_writer(std::io::stderr);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .init();
    } else {
        // Initialize with just the filter, no output layers
        tracing_subscriber::registry().with(env_filter).init();
    }
}

/// Open the append-mode log file named by SKALD_LOG_FILE, if set.
pub fn setup_file_logging() -> anyhow::Result<()> {
    let Ok(path) = env::var("SKALD_LOG_FILE") else {
        return Ok(());
    };

    let file = OpenOptions::new().create(true).append(true).open(&path)?;

    if let Ok(mut guard) = LOG_FILE.lock() {
        *guard = Some(file);
    }

    log_info(&format!("File logging enabled: {path}"));
    Ok(())
}

// Helper to write to log file if enabled
fn write_to_file(level: &str, msg: &str) {
    if let Ok(mut guard) = LOG_FILE.lock() {
        if let Some(ref mut file) = *guard {
            let timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f");
            let _ = writeln!(file, "[{}] [{}] [skald] {}", timestamp, level, msg);
            let _ = file.flush();
        }
    }
}

pub fn log_error(msg: &str) {
    error!("{msg}");
    write_to_file("ERROR", msg);
}

pub fn log_warn(msg: &str) {
    warn!("{msg}");
    write_to_file("WARN", msg);
}

pub fn log_info(msg: &str) {
    info!("{msg}");
    write_to_file("INFO", msg);
}

pub fn log_debug(msg: &str) {
    debug!("{msg}");
    write_to_file("DEBUG", msg);
}

pub fn log_trace(msg: &str) {
    trace!("{msg}");
    write_to_file("TRACE", msg);
}
