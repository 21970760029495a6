//! Trusted logger sink
//!
//! The sink is the process-wide multiplexer to every registered logger
//! plug-in. Logger calls sit inside the trust boundary's carve-out: they
//! are assumed never to raise, so records are delivered without gateway
//! mediation. When no logger plug-in is registered yet (early in
//! discovery, or in a headless deployment) records fall back to `tracing`
//! so nothing is lost.

use crate::registry::Registry;
use luna_plugin_api::{default_levels, Kind, LogLevel, LogRecord};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

/// Multiplexes log records to registered logger plug-ins, filtered by each
/// logger's configured level set
pub struct LogSink {
    registry: Arc<Registry>,
    /// Level filter per logger identity. This is the only soft state a
    /// registered descriptor has.
    levels: Mutex<HashMap<String, BTreeSet<LogLevel>>>,
}

impl LogSink {
    /// Create a sink over the given registry
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            levels: Mutex::new(HashMap::new()),
        }
    }

    /// Deliver a record to every logger whose level set contains the
    /// record's level
    pub fn log(&self, record: LogRecord) {
        let loggers = self.registry.by_kind(Kind::Logger);
        if loggers.is_empty() {
            fallback(&record);
            return;
        }

        let levels = self.levels.lock().unwrap_or_else(|e| e.into_inner());
        for descriptor in &loggers {
            let enabled = levels
                .get(descriptor.identity())
                .map(|set| set.contains(&record.level))
                .unwrap_or_else(|| default_levels().contains(&record.level));
            if !enabled {
                continue;
            }
            if let Some(logger) = descriptor.instance().as_logger() {
                // Trusted call: loggers are assumed not to raise.
                logger.log(&record);
            }
        }
    }

    /// Log an error message
    pub fn error(&self, message: impl Into<String>) {
        self.log(LogRecord::new(LogLevel::Error, message));
    }

    /// Log a critical message
    pub fn critical(&self, message: impl Into<String>) {
        self.log(LogRecord::new(LogLevel::Critical, message));
    }

    /// Log a warning message
    pub fn warning(&self, message: impl Into<String>) {
        self.log(LogRecord::new(LogLevel::Warning, message));
    }

    /// Log an information message
    pub fn info(&self, message: impl Into<String>) {
        self.log(LogRecord::new(LogLevel::Information, message));
    }

    /// Log a debug message
    pub fn debug(&self, message: impl Into<String>) {
        self.log(LogRecord::new(LogLevel::Debug, message));
    }

    /// Replace the level set of one logger and tell the plug-in about it
    pub fn set_levels(&self, identity: &str, levels: BTreeSet<LogLevel>) {
        {
            let mut filter = self.levels.lock().unwrap_or_else(|e| e.into_inner());
            filter.insert(identity.to_string(), levels.clone());
        }
        if let Some(descriptor) = self.registry.by_key(Kind::Logger, identity) {
            if let Some(logger) = descriptor.instance().as_logger() {
                logger.set_levels(&levels);
            }
        }
    }

    /// The configured level set for a logger
    pub fn levels(&self, identity: &str) -> BTreeSet<LogLevel> {
        let filter = self.levels.lock().unwrap_or_else(|e| e.into_inner());
        filter.get(identity).cloned().unwrap_or_else(default_levels)
    }
}

/// Route a record through `tracing` when no logger plug-in is registered
fn fallback(record: &LogRecord) {
    let message = record.message.as_str();
    let title = record.title.as_deref();
    match record.level {
        LogLevel::Error | LogLevel::Critical => tracing::error!(?title, "{message}"),
        LogLevel::Warning => tracing::warn!(?title, "{message}"),
        LogLevel::Information => tracing::info!(?title, "{message}"),
        LogLevel::Debug => tracing::debug!(?title, "{message}"),
    }
}
