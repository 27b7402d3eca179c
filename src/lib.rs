//! Soft Phone - Lokale Call-Session-Engine
//!
//! Eine Bibliothek für den Anruf-Lebenszyklus eines Soft Phones:
//! - Status-Maschine (idle → connecting → active → ended → idle)
//! - Mikrofon-Capture über cpal
//! - Mute/Unmute der gehaltenen Audio-Tracks
//! - Anrufdauer-Zählung
//!
//! Es gibt kein Signaling und keinen Remote-Peer: Verbindungsaufbau und
//! Auflegen werden über Timer simuliert, die Mikrofon-Aufnahme ist das
//! einzige echte I/O.

pub mod call_session;
pub mod notify;

pub use call_session::{
    format_duration, AudioTrack, CallEvent, CallSession, CallSessionError, CallSnapshot,
    CallStatus, CaptureConstraints, CaptureError, CaptureHandle, CaptureProvider,
    MicrophoneProvider, SessionConfig, DEFAULT_SAMPLE_RATE,
};
pub use notify::{LogSink, NotificationSink, NotifyKind};

// ============================================================================
// LOGGING
// ============================================================================

/// Initialisiert das Logging der Bibliothek
///
/// Liest den Filter aus der Umgebung (`RUST_LOG`) und schaltet die
/// crate-eigenen Meldungen standardmäßig auf `debug`.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("softphone=debug".parse().unwrap()),
        )
        .init();
}
