//! Logging infrastructure - structured tracing for the foundation layer
//!
//! Design: Uses `tracing` for structured, contextual logging with:
//! - Configurable log levels per module
//! - Zero-cost when disabled
//! - Span-based performance tracking
//! - Console or file output, plain or JSON

use crate::error::TrapKind;
use once_cell::sync::OnceCell;
use std::io;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

/// Global logging state; holds the file writer guard for the process life
static LOGGER_INITIALIZED: OnceCell<Option<WorkerGuard>> = OnceCell::new();

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default log level
    pub level: Level,
    /// Enable file logging
    pub file_output: bool,
    /// Log file path (if file_output enabled)
    pub log_path: Option<String>,
    /// Enable JSON format (vs human-readable)
    pub json_format: bool,
    /// Show span events (enter/exit)
    pub show_spans: bool,
    /// Enable performance tracking
    pub track_performance: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            file_output: false,
            log_path: None,
            json_format: false,
            show_spans: false,
            track_performance: cfg!(debug_assertions),
        }
    }
}

fn parse_level(value: &str) -> Level {
    match value.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

impl LogConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // PARC_LOG_LEVEL: trace, debug, info, warn, error
        if let Ok(level_str) = std::env::var("PARC_LOG_LEVEL") {
            config.level = parse_level(&level_str);
        }

        // PARC_LOG_FILE: path to log file
        if let Ok(path) = std::env::var("PARC_LOG_FILE") {
            config.file_output = true;
            config.log_path = Some(path);
        }

        config.json_format = std::env::var("PARC_LOG_JSON").is_ok();
        config.show_spans = std::env::var("PARC_LOG_SPANS").is_ok();

        if let Ok(val) = std::env::var("PARC_LOG_PERF") {
            config.track_performance = val == "1" || val.to_lowercase() == "true";
        }

        config
    }

    /// Create high-performance config (minimal logging)
    pub fn performance() -> Self {
        Self {
            level: Level::ERROR,
            file_output: false,
            log_path: None,
            json_format: false,
            show_spans: false,
            track_performance: false,
        }
    }

    /// Create debug config (verbose logging to `parc.log`)
    pub fn debug() -> Self {
        Self {
            level: Level::TRACE,
            file_output: true,
            log_path: Some("parc.log".to_string()),
            json_format: false,
            show_spans: true,
            track_performance: true,
        }
    }
}

/// Initialize logging with configuration from the environment
pub fn init() {
    init_with_config(LogConfig::from_env());
}

/// Initialize logging with custom configuration
///
/// Only the first call has any effect. If another subscriber was already
/// installed globally, that subscriber is left in place.
pub fn init_with_config(config: LogConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        perf::set_enabled(config.track_performance);

        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("parc={}", config.level.as_str().to_lowercase()))
        });

        let span_events = if config.show_spans {
            FmtSpan::ENTER | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };

        let (writer, guard) = match config.log_path.as_deref().filter(|_| config.file_output) {
            Some(path) => {
                let path = std::path::Path::new(path);
                let directory = path
                    .parent()
                    .filter(|dir| !dir.as_os_str().is_empty())
                    .unwrap_or_else(|| std::path::Path::new("."));
                let file_name = path
                    .file_name()
                    .map(|name| name.to_owned())
                    .unwrap_or_else(|| "parc.log".into());
                let appender = tracing_appender::rolling::never(directory, file_name);
                let (writer, guard) = tracing_appender::non_blocking(appender);
                (fmt::writer::BoxMakeWriter::new(writer), Some(guard))
            }
            None => (fmt::writer::BoxMakeWriter::new(io::stdout), None),
        };

        let layer = fmt::layer()
            .with_writer(writer)
            .with_span_events(span_events)
            .with_target(true)
            .with_thread_ids(cfg!(debug_assertions))
            .with_line_number(cfg!(debug_assertions));

        let layer: Box<dyn Layer<Registry> + Send + Sync> = if config.json_format {
            layer.json().boxed()
        } else {
            layer.boxed()
        };

        let _ = tracing_subscriber::registry()
            .with(layer)
            .with(env_filter)
            .try_init();

        guard
    });
}

/// Check if logging is initialized
pub fn is_initialized() -> bool {
    LOGGER_INITIALIZED.get().is_some()
}

// ============================================================================
// Foundation-layer logging functions
// ============================================================================

/// Log memory allocation
#[inline]
pub fn log_allocation(backend: &str, size: usize, alignment: usize, ptr: *const u8) {
    use tracing::trace;
    trace!(
        event = "allocation",
        backend,
        size_bytes = size,
        alignment,
        address = ?ptr,
        "Memory allocated"
    );
}

/// Log memory deallocation
#[inline]
pub fn log_deallocation(backend: &str, ptr: *const u8) {
    use tracing::trace;
    trace!(
        event = "deallocation",
        backend,
        address = ?ptr,
        "Memory deallocated"
    );
}

/// Log a guard word violation found while checking an allocation
pub fn log_guard_violation(state: &str, ptr: *const u8) {
    use tracing::error;
    error!(
        event = "guard_violation",
        state,
        address = ?ptr,
        "Memory guard violation detected"
    );
}

/// Log allocations still outstanding when a debug allocator is torn down
pub fn log_leak_report(outstanding: usize, report: &str) {
    use tracing::warn;
    warn!(
        event = "leak_report",
        outstanding,
        report,
        "Allocations outstanding at teardown"
    );
}

/// Log the destruction of a reference counted object
#[inline]
pub fn log_object_destroyed(type_name: &str, address: *const u8) {
    use tracing::trace;
    trace!(
        event = "object_destroyed",
        type_name,
        address = ?address,
        "Object destroyed"
    );
}

/// Log a thread blocking on a contended object lock
#[inline]
pub fn log_lock_contention(type_name: &str, address: *const u8) {
    use tracing::trace;
    trace!(
        event = "lock_contention",
        type_name,
        address = ?address,
        "Waiting for object lock"
    );
}

/// Log a hash map capacity change
pub fn log_hash_map_resize(old_capacity: usize, new_capacity: usize, size: usize) {
    use tracing::debug;
    debug!(
        event = "hash_map_resize",
        old_capacity,
        new_capacity,
        size,
        "Hash map resized"
    );
}

/// Log a buffer reallocation
pub fn log_buffer_resize(old_capacity: usize, new_capacity: usize) {
    use tracing::debug;
    debug!(
        event = "buffer_resize",
        old_capacity,
        new_capacity,
        "Buffer resized"
    );
}

/// Log a trap before the thread unwinds
pub fn log_trap(kind: TrapKind, message: &str, file: &str, line: u32) {
    use tracing::error;
    error!(
        event = "trap",
        kind = kind.as_str(),
        message,
        file,
        line,
        "Trap"
    );
}

/// Performance tracking utilities
pub mod perf {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Instant;
    use tracing::debug;

    /// Set from `LogConfig::track_performance` when logging is initialized
    static ENABLED: AtomicBool = AtomicBool::new(false);

    pub(crate) fn set_enabled(enabled: bool) {
        ENABLED.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled() -> bool {
        ENABLED.load(Ordering::Relaxed)
    }

    /// Track `operation` only when performance tracking is enabled
    #[must_use]
    pub fn track_if_enabled(operation: &'static str) -> Option<PerformanceGuard> {
        track_when(is_enabled(), operation)
    }

    #[must_use]
    pub fn track_when(enabled: bool, operation: &'static str) -> Option<PerformanceGuard> {
        enabled.then(|| track(operation))
    }

    /// Track operation duration (returns guard that logs on drop)
    #[must_use]
    pub fn track(operation: &'static str) -> PerformanceGuard {
        PerformanceGuard {
            operation,
            start: Instant::now(),
        }
    }

    pub struct PerformanceGuard {
        operation: &'static str,
        start: Instant,
    }

    impl Drop for PerformanceGuard {
        fn drop(&mut self) {
            let elapsed = self.start.elapsed();
            debug!(
                operation = self.operation,
                duration_us = elapsed.as_micros() as u64,
                "operation completed"
            );
        }
    }
}
