//! Log record types shared between the host and logger plug-ins

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity of a log message.
///
/// The ordering is semantic only (`Debug` is the least severe, `Error` the
/// most). Filtering is done by set membership, never by comparing levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Diagnostic detail, off by default
    Debug,
    /// Normal progress messages
    Information,
    /// Something unexpected but survivable
    Warning,
    /// A failure that endangers the current operation
    Critical,
    /// A failure that ends the current operation
    Error,
}

impl LogLevel {
    /// All levels, least severe first
    pub const ALL: [LogLevel; 5] = [
        LogLevel::Debug,
        LogLevel::Information,
        LogLevel::Warning,
        LogLevel::Critical,
        LogLevel::Error,
    ];

    /// Short uppercase tag for display
    pub fn tag(self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Information => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Critical => "CRITICAL",
            LogLevel::Error => "ERROR",
        }
    }
}

/// One frame of captured failure context, most recent last in a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallFrame {
    /// Function or operation name
    pub function: String,
    /// Source location, if known
    pub location: Option<String>,
}

impl CallFrame {
    /// Create a frame without a source location
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            location: None,
        }
    }
}

/// A single log message on its way to the logger plug-ins
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    /// Severity of the message
    pub level: LogLevel,
    /// The message text
    pub message: String,
    /// Optional header for the message
    pub title: Option<String>,
    /// When the record was created
    pub timestamp: DateTime<Utc>,
    /// Captured failure context, outermost frame first
    pub context: Vec<CallFrame>,
}

impl LogRecord {
    /// Create a record with the current timestamp and no context
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            title: None,
            timestamp: Utc::now(),
            context: Vec::new(),
        }
    }

    /// Attach a title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Attach failure context frames
    pub fn with_context(mut self, context: Vec<CallFrame>) -> Self {
        self.context = context;
        self
    }
}
