//! Notification Sink - Zustellung von Benutzer-Meldungen
//!
//! Die Session meldet Ereignisse ("Call started", "Microphone access
//! failed") über einen NotificationSink. Die Standard-Implementierung
//! schreibt ins Log; eine Oberfläche hängt einen eigenen Sink ein.

use std::fmt;

// ============================================================================
// NOTIFY KIND
// ============================================================================

/// Art einer Benachrichtigung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyKind {
    Success,
    Error,
    Info,
}

impl NotifyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotifyKind::Success => "success",
            NotifyKind::Error => "error",
            NotifyKind::Info => "info",
        }
    }
}

impl fmt::Display for NotifyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// NOTIFICATION SINK
// ============================================================================

/// Empfänger für Benutzer-Meldungen der Session
pub trait NotificationSink: Send + Sync {
    fn notify(&self, kind: NotifyKind, message: &str);
}

/// Standard-Sink: schreibt Meldungen ins Log
#[derive(Debug, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, kind: NotifyKind, message: &str) {
        match kind {
            NotifyKind::Error => tracing::error!("{}", message),
            _ => tracing::info!("{}", message),
        }
    }
}

// ============================================================================
// TEST SINK
// ============================================================================

/// Sink-Attrappe die alle Meldungen aufzeichnet
#[cfg(test)]
#[derive(Default)]
pub struct MemorySink {
    messages: parking_lot::Mutex<Vec<(NotifyKind, String)>>,
}

#[cfg(test)]
impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Alle bisher aufgezeichneten Meldungen
    pub fn messages(&self) -> Vec<(NotifyKind, String)> {
        self.messages.lock().clone()
    }

    /// Anzahl der Meldungen einer Art
    pub fn count_of(&self, kind: NotifyKind) -> usize {
        self.messages.lock().iter().filter(|(k, _)| *k == kind).count()
    }
}

#[cfg(test)]
impl NotificationSink for MemorySink {
    fn notify(&self, kind: NotifyKind, message: &str) {
        self.messages.lock().push((kind, message.to_string()));
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_as_str() {
        assert_eq!(NotifyKind::Success.as_str(), "success");
        assert_eq!(NotifyKind::Error.as_str(), "error");
        assert_eq!(NotifyKind::Info.as_str(), "info");
        assert_eq!(NotifyKind::Info.to_string(), "info");
    }

    #[test]
    fn test_memory_sink_records() {
        let sink = MemorySink::new();
        sink.notify(NotifyKind::Info, "hello");
        sink.notify(NotifyKind::Error, "boom");

        assert_eq!(sink.messages().len(), 2);
        assert_eq!(sink.count_of(NotifyKind::Error), 1);
        assert_eq!(sink.messages()[0].1, "hello");
    }
}
