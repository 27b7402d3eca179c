//! Mikrofon-Capture - Erwerb und Verwaltung der Aufnahme-Ressource
//!
//! Verwendet cpal für Cross-Platform Audio-Input. Der CaptureProvider
//! ist als Trait geschnitten, damit die Session ohne echte Hardware
//! getestet werden kann.

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig, SupportedStreamConfigRange};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Standard Sample Rate für die Mikrofon-Aufnahme (44.1kHz)
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Fehler beim Erwerb der Capture-Ressource
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("No audio input device found")]
    NoInputDevice,

    #[error("Unsupported audio configuration: {0}")]
    UnsupportedConfig(String),

    #[error("Failed to build audio stream: {0}")]
    StreamBuild(String),

    #[error("Failed to start audio stream: {0}")]
    StreamPlay(String),
}

// ============================================================================
// CAPTURE CONSTRAINTS
// ============================================================================

/// Wunsch-Parameter für die Mikrofon-Aufnahme
#[derive(Debug, Clone)]
pub struct CaptureConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub sample_rate: u32,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }
}

// ============================================================================
// AUDIO TRACK
// ============================================================================

/// Ein einzelner Audio-Track innerhalb einer Capture-Ressource
///
/// Mute bedeutet Deaktivieren (`enabled = false`), nicht Stoppen: ein
/// gestoppter Track gibt das Gerät frei und kann nicht reaktiviert werden.
pub trait AudioTrack: Send + Sync {
    /// Gibt zurück ob der Track gerade aktiviert ist
    fn is_enabled(&self) -> bool;

    /// Aktiviert oder deaktiviert den Track (Mute/Unmute)
    fn set_enabled(&self, enabled: bool);

    /// Stoppt den Track endgültig und gibt das Gerät frei
    fn stop(&self);

    /// Aktueller Eingangspegel (0.0 - 1.0) für Visualisierung
    fn level(&self) -> f32 {
        0.0
    }
}

// ============================================================================
// CAPTURE HANDLE
// ============================================================================

/// Exklusiv gehaltene Capture-Ressource mit ihren Audio-Tracks
pub struct CaptureHandle {
    tracks: Vec<Arc<dyn AudioTrack>>,
}

impl CaptureHandle {
    /// Erstellt ein Handle aus einer Liste von Tracks
    pub fn new(tracks: Vec<Arc<dyn AudioTrack>>) -> Self {
        Self { tracks }
    }

    /// Gibt alle Tracks zurück
    pub fn tracks(&self) -> &[Arc<dyn AudioTrack>] {
        &self.tracks
    }

    /// Aktiviert oder deaktiviert alle Tracks
    pub fn set_all_enabled(&self, enabled: bool) {
        for track in &self.tracks {
            track.set_enabled(enabled);
        }
    }

    /// Stoppt alle Tracks
    pub fn stop_all(&self) {
        for track in &self.tracks {
            track.stop();
        }
        tracing::info!("Capture stopped ({} track(s))", self.tracks.len());
    }

    /// Höchster Eingangspegel über alle Tracks
    pub fn input_level(&self) -> f32 {
        self.tracks.iter().map(|t| t.level()).fold(0.0, f32::max)
    }
}

impl fmt::Debug for CaptureHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureHandle")
            .field("tracks", &self.tracks.len())
            .finish()
    }
}

// ============================================================================
// CAPTURE PROVIDER
// ============================================================================

/// Quelle für Capture-Ressourcen
///
/// Der Erwerb ist asynchron und kann fehlschlagen (kein Gerät vorhanden,
/// Konfiguration nicht unterstützt).
#[async_trait]
pub trait CaptureProvider: Send + Sync {
    async fn acquire(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<CaptureHandle, CaptureError>;
}

// ============================================================================
// MICROPHONE PROVIDER (CPAL)
// ============================================================================

/// Echter CaptureProvider über das Standard-Eingabegerät des Systems
#[derive(Debug, Default)]
pub struct MicrophoneProvider;

#[async_trait]
impl CaptureProvider for MicrophoneProvider {
    async fn acquire(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<CaptureHandle, CaptureError> {
        let track = MicrophoneTrack::open(constraints)?;
        Ok(CaptureHandle::new(vec![Arc::new(track) as Arc<dyn AudioTrack>]))
    }
}

/// Audio-Track über einen cpal Input-Stream
struct MicrophoneTrack {
    // Der Stream wird in Option gehalten und bei stop() gedroppt
    stream: Mutex<Option<Stream>>,

    /// Mute-Status, wird im Stream-Callback geprüft
    enabled: Arc<Mutex<bool>>,

    /// Eingangspegel (0.0 - 1.0) für Visualisierung
    level: Arc<Mutex<f32>>,
}

// Stream ist nicht Send; der Zugriff läuft ausschließlich über den Mutex
unsafe impl Send for MicrophoneTrack {}
unsafe impl Sync for MicrophoneTrack {}

impl MicrophoneTrack {
    /// Öffnet das Standard-Eingabegerät und startet den Stream
    fn open(constraints: &CaptureConstraints) -> Result<Self, CaptureError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(CaptureError::NoInputDevice)?;

        let config = Self::find_input_config(&device, constraints.sample_rate)?;

        tracing::info!(
            "Starting audio capture: {} Hz, {} channel(s)",
            config.sample_rate.0,
            config.channels
        );
        // cpal wendet keine Signalverarbeitung an; die Flags werden nur protokolliert
        tracing::debug!(
            "Requested constraints: echo_cancellation={}, noise_suppression={}",
            constraints.echo_cancellation,
            constraints.noise_suppression
        );

        let enabled = Arc::new(Mutex::new(true));
        let level = Arc::new(Mutex::new(0.0f32));

        let enabled_cb = Arc::clone(&enabled);
        let level_cb = Arc::clone(&level);

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if !*enabled_cb.lock() {
                        // Deaktivierter Track liefert keinen Pegel
                        *level_cb.lock() = 0.0;
                        return;
                    }

                    // Eingangspegel berechnen (RMS)
                    let rms: f32 =
                        (data.iter().map(|s| s * s).sum::<f32>() / data.len() as f32).sqrt();
                    *level_cb.lock() = rms.min(1.0);
                },
                |err| {
                    tracing::error!("Audio capture error: {}", err);
                },
                None,
            )
            .map_err(|e| CaptureError::StreamBuild(e.to_string()))?;

        stream
            .play()
            .map_err(|e| CaptureError::StreamPlay(e.to_string()))?;

        Ok(Self {
            stream: Mutex::new(Some(stream)),
            enabled,
            level,
        })
    }

    /// Findet eine passende Input-Konfiguration für das Gerät
    fn find_input_config(
        device: &Device,
        sample_rate: u32,
    ) -> Result<StreamConfig, CaptureError> {
        let configs = device
            .supported_input_configs()
            .map_err(|e| CaptureError::UnsupportedConfig(e.to_string()))?;

        Self::select_best_config(configs.collect(), sample_rate)
    }

    /// Wählt die beste Konfiguration aus einer Liste
    fn select_best_config(
        configs: Vec<SupportedStreamConfigRange>,
        sample_rate: u32,
    ) -> Result<StreamConfig, CaptureError> {
        // Priorität: Wunsch-Rate > andere, F32 > andere
        let target_rate = cpal::SampleRate(sample_rate);

        // Versuche die Wunsch-Rate exakt zu treffen
        for config in &configs {
            if config.min_sample_rate() <= target_rate
                && config.max_sample_rate() >= target_rate
                && config.sample_format() == SampleFormat::F32
            {
                return Ok(config.clone().with_sample_rate(target_rate).into());
            }
        }

        // Fallback auf die beste verfügbare F32-Konfiguration
        for config in &configs {
            if config.sample_format() == SampleFormat::F32 {
                return Ok(config.clone().with_max_sample_rate().into());
            }
        }

        // Nehme die erste verfügbare Konfiguration
        if let Some(config) = configs.first() {
            return Ok(config.clone().with_max_sample_rate().into());
        }

        Err(CaptureError::UnsupportedConfig(
            "No suitable audio configuration found".to_string(),
        ))
    }
}

impl AudioTrack for MicrophoneTrack {
    fn is_enabled(&self) -> bool {
        *self.enabled.lock()
    }

    fn set_enabled(&self, enabled: bool) {
        *self.enabled.lock() = enabled;
        tracing::debug!("Audio track enabled: {}", enabled);
    }

    fn stop(&self) {
        // Stream droppen beendet die Aufnahme
        *self.stream.lock() = None;
    }

    fn level(&self) -> f32 {
        *self.level.lock()
    }
}

// ============================================================================
// TEST DOUBLES
// ============================================================================


// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::testing::TestTrack;
    use super::*;

    #[test]
    fn test_default_constraints() {
        let constraints = CaptureConstraints::default();
        assert!(constraints.echo_cancellation);
        assert!(constraints.noise_suppression);
        assert_eq!(constraints.sample_rate, DEFAULT_SAMPLE_RATE);
    }

    #[test]
    fn test_handle_set_all_enabled() {
        let a = TestTrack::new();
        let b = TestTrack::new();
        let handle = CaptureHandle::new(vec![
            Arc::clone(&a) as Arc<dyn AudioTrack>,
            Arc::clone(&b) as Arc<dyn AudioTrack>,
        ]);

        handle.set_all_enabled(false);
        assert!(!a.is_enabled());
        assert!(!b.is_enabled());

        handle.set_all_enabled(true);
        assert!(a.is_enabled());
        assert!(b.is_enabled());
    }

    #[test]
    fn test_handle_stop_all() {
        let a = TestTrack::new();
        let handle = CaptureHandle::new(vec![Arc::clone(&a) as Arc<dyn AudioTrack>]);

        handle.stop_all();
        assert!(a.is_stopped());
    }

    #[test]
    fn test_input_level_is_max_over_tracks() {
        let a = TestTrack::new();
        let b = TestTrack::new();
        b.set_enabled(false);
        let handle = CaptureHandle::new(vec![
            Arc::clone(&a) as Arc<dyn AudioTrack>,
            Arc::clone(&b) as Arc<dyn AudioTrack>,
        ]);

        assert_eq!(handle.input_level(), 0.5);

        handle.set_all_enabled(false);
        assert_eq!(handle.input_level(), 0.0);
    }
}
