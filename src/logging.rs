/// Event logging for the monitoring service.
///
/// Every operational event carries a severity and a scope: either a
/// station id or "GERAL" for service-wide events. Events are echoed to
/// the console and appended durably to the store's events table, from
/// which they can be filtered per station or globally.
///
/// Display/export line format:
///   <ISO8601 UTC timestamp> | <LEVEL> | <station_id or GERAL> | <message>

use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;

use crate::db::Store;

/// Scope marker for events not tied to a single station.
pub const SCOPE_GERAL: &str = "GERAL";

// ---------------------------------------------------------------------------
// Log levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Event records
// ---------------------------------------------------------------------------

/// One persisted event, as read back from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub timestamp: DateTime<Utc>,
    pub level: String,
    pub scope: String,
    pub message: String,
}

impl EventRecord {
    /// Renders the canonical one-line export format.
    pub fn format_line(&self) -> String {
        format!(
            "{} | {} | {} | {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.level,
            self.scope,
            self.message
        )
    }
}

// ---------------------------------------------------------------------------
// Event log handle
// ---------------------------------------------------------------------------

/// Handle for emitting events. Constructed once at startup and passed to
/// the components that log; no global logger state.
#[derive(Clone)]
pub struct EventLog {
    store: Store,
    min_level: LogLevel,
    console: bool,
}

impl EventLog {
    pub fn new(store: Store, min_level: LogLevel) -> Self {
        Self {
            store,
            min_level,
            console: true,
        }
    }

    /// Silences console echo; events still persist. Used by tests.
    pub fn without_console(mut self) -> Self {
        self.console = false;
        self
    }

    pub fn debug(&self, scope: &str, message: &str) {
        self.log(LogLevel::Debug, scope, message);
    }

    pub fn info(&self, scope: &str, message: &str) {
        self.log(LogLevel::Info, scope, message);
    }

    pub fn warn(&self, scope: &str, message: &str) {
        self.log(LogLevel::Warning, scope, message);
    }

    pub fn error(&self, scope: &str, message: &str) {
        self.log(LogLevel::Error, scope, message);
    }

    fn log(&self, level: LogLevel, scope: &str, message: &str) {
        if level < self.min_level {
            return;
        }

        let now = Utc::now();
        let record = EventRecord {
            timestamp: now,
            level: level.to_string(),
            scope: scope.to_string(),
            message: message.to_string(),
        };

        if self.console {
            match level {
                LogLevel::Error | LogLevel::Warning => eprintln!("{}", record.format_line()),
                _ => println!("{}", record.format_line()),
            }
        }

        // The logger cannot log its own failures; last resort is stderr.
        if let Err(e) = self
            .store
            .append_event(now, level.as_str(), scope, message)
        {
            eprintln!("Failed to persist event ({} | {}): {}", scope, message, e);
        }
    }

    /// Reads back persisted events, optionally filtered to one scope.
    pub fn events(&self, scope: Option<&str>) -> Vec<EventRecord> {
        self.store.query_events(scope).unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
