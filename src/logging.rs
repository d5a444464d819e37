use std::path::PathBuf;
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::{
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
    Registry,
    Layer,
};

use crate::error::{ScholarError, ScholarResult};

/// Logging configuration for Scholarly
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub log_dir: PathBuf,
    /// Only honoured when built with the `advanced_logging` feature
    pub enable_file_logging: bool,
    pub enable_json_format: bool,
    pub max_log_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            log_dir: PathBuf::from("logs"),
            enable_file_logging: false,
            enable_json_format: false,
            max_log_files: 10,
        }
    }
}

/// Keeps the non-blocking file writer alive; drop it last
pub struct LogGuard {
    #[cfg(feature = "advanced_logging")]
    _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        // HTTP internals are noisy at debug level and would drown the typing output
        EnvFilter::new(format!(
            "scholarly={},reqwest=warn,hyper=warn,hyper_util=warn,{}",
            config.level, config.level
        ))
    })
}

/// Initialize the logging system
///
/// Console output always goes to stderr so the typed responses on stdout stay clean.
pub fn init_logging(config: &LoggingConfig) -> ScholarResult<LogGuard> {
    let registry = Registry::default().with(env_filter(config));

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .compact()
        .boxed();

    #[cfg(feature = "advanced_logging")]
    let guard = if config.enable_file_logging {
        use tracing_appender::{non_blocking, rolling};

        std::fs::create_dir_all(&config.log_dir).map_err(|e| {
            ScholarError::file_io(config.log_dir.to_string_lossy().to_string(), e)
        })?;

        let file_appender = rolling::daily(&config.log_dir, "scholarly.log");
        let (file_writer, file_guard) = non_blocking(file_appender);

        let file_layer = if config.enable_json_format {
            fmt::layer().json().with_writer(file_writer).boxed()
        } else {
            fmt::layer().with_writer(file_writer).with_ansi(false).boxed()
        };

        registry
            .with(console_layer)
            .with(file_layer)
            .try_init()
            .map_err(|e| ScholarError::configuration(format!("logging already initialized: {}", e)))?;

        LogGuard {
            _file_guard: Some(file_guard),
        }
    } else {
        registry
            .with(console_layer)
            .try_init()
            .map_err(|e| ScholarError::configuration(format!("logging already initialized: {}", e)))?;

        LogGuard { _file_guard: None }
    };

    #[cfg(not(feature = "advanced_logging"))]
    let guard = {
        registry
            .with(console_layer)
            .try_init()
            .map_err(|e| ScholarError::configuration(format!("logging already initialized: {}", e)))?;

        LogGuard {}
    };

    info!(level = %config.level, "Scholarly logging initialized");

    #[cfg(feature = "advanced_logging")]
    if config.enable_file_logging {
        info!("File logging enabled: {}", config.log_dir.display());
    }

    Ok(guard)
}

/// Log system information for debugging
pub fn log_system_info() {
    info!("Scholarly v{}", env!("CARGO_PKG_VERSION"));
    info!("System: {} {}", std::env::consts::OS, std::env::consts::ARCH);

    if let Ok(cwd) = std::env::current_dir() {
        info!("Working directory: {}", cwd.display());
    }
}

/// Performance logging utilities
pub struct PerformanceTimer {
    start: std::time::Instant,
    operation: String,
}

impl PerformanceTimer {
    pub fn start(operation: impl Into<String>) -> Self {
        let operation = operation.into();
        tracing::debug!("Starting: {}", operation);
        Self {
            start: std::time::Instant::now(),
            operation,
        }
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.start.elapsed().as_millis()
    }
}

impl Drop for PerformanceTimer {
    fn drop(&mut self) {
        info!(
            operation = %self.operation,
            elapsed_ms = self.elapsed_ms() as u64,
            "Completed"
        );
    }
}

/// Clean up old rotated log files
#[cfg(feature = "advanced_logging")]
pub fn cleanup_old_logs(config: &LoggingConfig) -> ScholarResult<()> {
    use std::fs;

    if !config.enable_file_logging {
        return Ok(());
    }

    let dir = config.log_dir.to_string_lossy().to_string();
    let mut log_files = Vec::new();

    for entry in fs::read_dir(&config.log_dir).map_err(|e| ScholarError::file_io(dir.clone(), e))? {
        let path = entry.map_err(|e| ScholarError::file_io(dir.clone(), e))?.path();
        let is_log = path
            .file_name()
            .and_then(|s| s.to_str())
            .map(|name| name.starts_with("scholarly.log"))
            .unwrap_or(false);

        if is_log {
            if let Ok(metadata) = fs::metadata(&path) {
                log_files.push((path, metadata.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH)));
            }
        }
    }

    // Newest first
    log_files.sort_by(|a, b| b.1.cmp(&a.1));

    if log_files.len() > config.max_log_files {
        for (path, _) in &log_files[config.max_log_files..] {
            if let Err(e) = fs::remove_file(path) {
                tracing::warn!("Failed to remove old log file {}: {}", path.display(), e);
            } else {
                info!("Removed old log file: {}", path.display());
            }
        }
    }

    Ok(())
}

/// Macro for logging with context
#[macro_export]
macro_rules! log_error {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            recoverable = $error.is_recoverable(),
            "Scholarly error occurred"
        );
    };
}
