//! Contract for logger plug-ins

use crate::log::{LogLevel, LogRecord};
use std::collections::BTreeSet;

/// A plug-in that records log messages somewhere.
///
/// Logger plug-ins sit inside the trusted logging path: the host assumes
/// their calls never fail and does not mediate them through the invocation
/// gateway. In return they must not panic and must not block for long.
/// Should a future logger capability ever return data, callers must treat
/// that data as untrusted like any other plug-in output.
pub trait LoggerPlugin: Send + Sync {
    /// Record a single message.
    ///
    /// The host only delivers records whose level is in the configured
    /// level set; implementations do not need to filter again.
    fn log(&self, record: &LogRecord);

    /// Replace the set of levels this logger acquires.
    ///
    /// Called by the host when the level filter changes, so loggers that
    /// keep their own mirror of the filter stay in sync.
    fn set_levels(&self, levels: &BTreeSet<LogLevel>);
}

/// The level set loggers start with: everything except debug
pub fn default_levels() -> BTreeSet<LogLevel> {
    [
        LogLevel::Error,
        LogLevel::Critical,
        LogLevel::Warning,
        LogLevel::Information,
    ]
    .into_iter()
    .collect()
}
