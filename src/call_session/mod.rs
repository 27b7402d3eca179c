//! Call Session Module - Status-Maschine und Mikrofon-Capture
//!
//! Dieses Modul verwaltet:
//! - den Anruf-Lebenszyklus (idle → connecting → active → ended)
//! - die Anrufdauer
//! - Mute/Unmute
//! - die Mikrofon-Aufnahme als exklusiv gehaltene Ressource

mod capture;
mod session;

pub use capture::{
    AudioTrack, CaptureConstraints, CaptureError, CaptureHandle, CaptureProvider,
    MicrophoneProvider, DEFAULT_SAMPLE_RATE,
};
pub use session::{
    format_duration, CallEvent, CallSession, CallSessionError, CallSnapshot, CallStatus,
    SessionConfig,
};
