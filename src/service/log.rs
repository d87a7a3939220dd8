//! Plugin log routing

use std::fmt;

/// Target used for every plugin log line
pub const PLUGIN_LOG_TARGET: &str = "sensekit::plugin";

/// Severity of a plugin log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogSeverity {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    /// Logged at error level
    Fatal,
}

impl LogSeverity {
    pub fn as_str(self) -> &'static str {
        match self {
            LogSeverity::Trace => "trace",
            LogSeverity::Debug => "debug",
            LogSeverity::Info => "info",
            LogSeverity::Warn => "warn",
            LogSeverity::Error => "error",
            LogSeverity::Fatal => "fatal",
        }
    }
}

impl fmt::Display for LogSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Emit a plugin log line through `tracing`
pub(crate) fn emit(channel: &str, severity: LogSeverity, args: fmt::Arguments<'_>) {
    match severity {
        LogSeverity::Trace => {
            tracing::trace!(target: PLUGIN_LOG_TARGET, channel = %channel, "{}", args)
        }
        LogSeverity::Debug => {
            tracing::debug!(target: PLUGIN_LOG_TARGET, channel = %channel, "{}", args)
        }
        LogSeverity::Info => {
            tracing::info!(target: PLUGIN_LOG_TARGET, channel = %channel, "{}", args)
        }
        LogSeverity::Warn => {
            tracing::warn!(target: PLUGIN_LOG_TARGET, channel = %channel, "{}", args)
        }
        LogSeverity::Error => {
            tracing::error!(target: PLUGIN_LOG_TARGET, channel = %channel, "{}", args)
        }
        LogSeverity::Fatal => {
            tracing::error!(target: PLUGIN_LOG_TARGET, channel = %channel, fatal = true, "{}", args)
        }
    }
}
