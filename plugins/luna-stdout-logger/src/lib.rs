//! Console logger plug-in
//!
//! Formats log records as single lines on standard output. Output is
//! serialized through a mutex so records from different threads never
//! interleave mid-line.

use luna_plugin_api::{
    default_levels, LogLevel, LogRecord, LoggerPlugin, PluginBundle, PluginInstance,
    PluginManifest,
};
use std::collections::BTreeSet;
use std::io::Write;
use std::sync::Mutex;

/// Logger that writes formatted records to standard output
pub struct StdoutLogger {
    levels: Mutex<BTreeSet<LogLevel>>,
}

impl StdoutLogger {
    pub fn new() -> Self {
        Self {
            levels: Mutex::new(default_levels()),
        }
    }

    fn format(record: &LogRecord) -> String {
        let timestamp = record.timestamp.format("%Y-%m-%d %H:%M:%S%.3f");
        let mut line = match &record.title {
            Some(title) => format!("[{timestamp}] {:<8} {title}: {}", record.level.tag(), record.message),
            None => format!("[{timestamp}] {:<8} {}", record.level.tag(), record.message),
        };
        for frame in &record.context {
            line.push_str("\n    in ");
            line.push_str(&frame.function);
            if let Some(location) = &frame.location {
                line.push_str(" (");
                line.push_str(location);
                line.push(')');
            }
        }
        line
    }
}

impl Default for StdoutLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggerPlugin for StdoutLogger {
    fn log(&self, record: &LogRecord) {
        let levels = self.levels.lock().unwrap_or_else(|e| e.into_inner());
        if !levels.contains(&record.level) {
            return;
        }
        let mut stdout = std::io::stdout().lock();
        // A full console is not worth failing the application over.
        let _ = writeln!(stdout, "{}", Self::format(record));
    }

    fn set_levels(&self, levels: &BTreeSet<LogLevel>) {
        let mut current = self.levels.lock().unwrap_or_else(|e| e.into_inner());
        *current = levels.clone();
    }
}

/// Build the plug-in bundle this library exports
pub fn bundle() -> PluginBundle {
    PluginBundle {
        manifest: PluginManifest {
            name: "Console logger".to_string(),
            description: "Prints log records to standard output".to_string(),
            ..Default::default()
        },
        instances: vec![PluginInstance::Logger(Box::new(StdoutLogger::new()))],
    }
}

#[cfg(feature = "export")]
#[cfg(feature = "export")]
luna_plugin_api::export_plugin!(bundle);
