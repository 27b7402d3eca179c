//! Notification Module - Meldungen an die Oberfläche
//!
//! Abstrahiert die Zustellung von Benutzer-Meldungen (Erfolg, Fehler,
//! Info) an eine Präsentationsschicht. Wie die Meldungen dargestellt
//! werden (Toasts etc.) entscheidet der eingehängte Sink.

mod sink;

pub use sink::{LogSink, NotificationSink, NotifyKind};

#[cfg(test)]
pub use sink::MemorySink;
