//! Call Session Controller - Anruf-Lebenszyklus
//!
//! Verwaltet den Lebenszyklus eines (simulierten) Anrufs:
//! - Status-Maschine: idle → connecting → active → ended → idle
//! - Mikrofon-Capture als exklusiv gehaltene Ressource
//! - Anrufdauer-Zählung (nur während active)
//! - Mute/Unmute der gehaltenen Tracks
//!
//! Es gibt keinen Remote-Peer: der Verbindungsaufbau und der Rückfall
//! von `Ended` auf `Idle` werden über Timer simuliert.

use super::capture::{
    CaptureConstraints, CaptureError, CaptureHandle, CaptureProvider, MicrophoneProvider,
};
use crate::notify::{LogSink, NotificationSink, NotifyKind};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Fehler der Call Session
///
/// Der Mikrofon-Erwerb ist der einzige Vorgang der fehlschlagen kann;
/// alle anderen Operationen sind total.
#[derive(Error, Debug)]
pub enum CallSessionError {
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),
}

// ============================================================================
// CALL STATUS
// ============================================================================

/// Öffentlicher Status eines Anrufs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    /// Kein Anruf
    Idle,
    /// Anruf wird aufgebaut (Mikrofon-Erwerb oder Verbindungs-Delay)
    Connecting,
    /// Anruf läuft
    Active,
    /// Anruf beendet, fällt automatisch auf Idle zurück
    Ended,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Idle => "idle",
            CallStatus::Connecting => "connecting",
            CallStatus::Active => "active",
            CallStatus::Ended => "ended",
        }
    }
}

impl std::fmt::Display for CallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// EVENTS
// ============================================================================

/// Events die von der Session ausgelöst werden
#[derive(Debug, Clone)]
pub enum CallEvent {
    StatusChanged(CallStatus),
    DurationChanged(u64),
    Error(String),
}

// ============================================================================
// CONFIG
// ============================================================================

/// Timing- und Capture-Parameter der Session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Simulierter Verbindungsaufbau nach erteiltem Mikrofon-Zugriff
    pub connect_delay: Duration,
    /// Verweildauer in `Ended` bevor automatisch `Idle` erreicht wird
    pub idle_return_delay: Duration,
    /// Intervall des Dauer-Zählers
    pub tick_interval: Duration,
    /// Wunsch-Parameter für den Mikrofon-Erwerb
    pub constraints: CaptureConstraints,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_delay: Duration::from_secs(1),
            idle_return_delay: Duration::from_secs(2),
            tick_interval: Duration::from_secs(1),
            constraints: CaptureConstraints::default(),
        }
    }
}

// ============================================================================
// SNAPSHOT
// ============================================================================

/// Momentaufnahme der Session für eine Präsentationsschicht
#[derive(Debug, Clone, Serialize)]
pub struct CallSnapshot {
    pub status: CallStatus,
    pub duration_seconds: u64,
    pub muted: bool,
    pub capture_active: bool,
}

/// Formatiert eine Anrufdauer als "MM:SS"
pub fn format_duration(seconds: u64) -> String {
    let mins = seconds / 60;
    let secs = seconds % 60;
    format!("{:02}:{:02}", mins, secs)
}

// ============================================================================
// INTERNAL PHASE
// ============================================================================

/// Interner Zustand der Session
///
/// Jede Variante trägt nur die Daten die in ihr gültig sind: ein
/// Capture-Handle existiert ausschließlich nach erteiltem Zugriff
/// (`Connecting`, `Active`), der Mute-Status nur zusammen mit dem Handle.
enum Phase {
    /// Kein Anruf
    Idle,
    /// Mikrofon-Erwerb läuft, noch kein Handle
    Requesting { call_id: Uuid },
    /// Zugriff erteilt, Verbindungs-Delay läuft
    Connecting {
        call_id: Uuid,
        capture: CaptureHandle,
        muted: bool,
    },
    /// Anruf aktiv
    Active {
        call_id: Uuid,
        capture: CaptureHandle,
        muted: bool,
    },
    /// Anruf beendet, wartet auf den Rückfall zu Idle
    Ended,
}

impl Phase {
    /// Öffentlicher Status dieser Phase
    fn status(&self) -> CallStatus {
        match self {
            Phase::Idle => CallStatus::Idle,
            Phase::Requesting { .. } | Phase::Connecting { .. } => CallStatus::Connecting,
            Phase::Active { .. } => CallStatus::Active,
            Phase::Ended => CallStatus::Ended,
        }
    }

    fn muted(&self) -> bool {
        match self {
            Phase::Connecting { muted, .. } | Phase::Active { muted, .. } => *muted,
            _ => false,
        }
    }

    fn capture(&self) -> Option<&CaptureHandle> {
        match self {
            Phase::Connecting { capture, .. } | Phase::Active { capture, .. } => Some(capture),
            _ => None,
        }
    }
}

// ============================================================================
// SHARED STATE
// ============================================================================

/// Von der Session und ihren Timern geteilter Kern
struct SessionShared {
    phase: Mutex<Phase>,
    duration_secs: Mutex<u64>,
    event_tx: broadcast::Sender<CallEvent>,
}

impl SessionShared {
    fn emit(&self, event: CallEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Wechselt nach dem Verbindungs-Delay von Connecting auf Active
    ///
    /// Wurde der Anruf inzwischen beendet, passiert nichts.
    fn spawn_connect_timer(
        self: &Arc<Self>,
        call_id: Uuid,
        sink: Arc<dyn NotificationSink>,
        connect_delay: Duration,
        tick_interval: Duration,
    ) {
        let shared = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(connect_delay).await;

            let activated = {
                let mut phase = shared.phase.lock();
                match std::mem::replace(&mut *phase, Phase::Ended) {
                    Phase::Connecting {
                        call_id: current,
                        capture,
                        muted,
                    } if current == call_id => {
                        *phase = Phase::Active {
                            call_id,
                            capture,
                            muted,
                        };
                        true
                    }
                    other => {
                        *phase = other;
                        false
                    }
                }
            };

            if activated {
                tracing::info!("Call {} is active", call_id);
                shared.emit(CallEvent::StatusChanged(CallStatus::Active));
                sink.notify(NotifyKind::Success, "Call started");
                shared.spawn_duration_timer(call_id, tick_interval);
            }
        });
    }

    /// Startet den Dauer-Zähler; läuft bis dieser Anruf `Active` verlässt
    fn spawn_duration_timer(self: &Arc<Self>, call_id: Uuid, tick_interval: Duration) {
        let shared = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick_interval);
            // Der erste Tick feuert sofort
            interval.tick().await;

            loop {
                interval.tick().await;

                let duration = {
                    let phase = shared.phase.lock();
                    if !matches!(&*phase, Phase::Active { call_id: c, .. } if *c == call_id) {
                        break;
                    }
                    let mut duration = shared.duration_secs.lock();
                    *duration += 1;
                    *duration
                };
                shared.emit(CallEvent::DurationChanged(duration));
            }
        });
    }

    /// Fällt nach dem Delay automatisch von Ended auf Idle zurück
    fn spawn_idle_timer(self: &Arc<Self>, idle_return_delay: Duration) {
        let shared = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(idle_return_delay).await;

            let returned = {
                let mut phase = shared.phase.lock();
                if matches!(*phase, Phase::Ended) {
                    *phase = Phase::Idle;
                    // Die Dauer wird genau beim Erreichen von Idle zurückgesetzt
                    *shared.duration_secs.lock() = 0;
                    true
                } else {
                    false
                }
            };

            if returned {
                shared.emit(CallEvent::StatusChanged(CallStatus::Idle));
            }
        });
    }
}

// ============================================================================
// CALL SESSION
// ============================================================================

/// Call Session Controller
///
/// Eine Instanz pro Oberflächen-Mount. Beim Drop werden das Capture
/// freigegeben und alle laufenden Timer beendet.
pub struct CallSession<P: CaptureProvider> {
    shared: Arc<SessionShared>,
    provider: P,
    sink: Arc<dyn NotificationSink>,
    config: SessionConfig,
}

impl CallSession<MicrophoneProvider> {
    /// Session mit echtem Mikrofon und Log-Sink
    pub fn with_microphone() -> Self {
        Self::new(MicrophoneProvider, Arc::new(LogSink))
    }
}

impl<P: CaptureProvider> CallSession<P> {
    /// Erstellt eine neue Session mit Standard-Konfiguration
    pub fn new(provider: P, sink: Arc<dyn NotificationSink>) -> Self {
        Self::with_config(provider, sink, SessionConfig::default())
    }

    /// Erstellt eine neue Session mit eigener Konfiguration
    pub fn with_config(provider: P, sink: Arc<dyn NotificationSink>, config: SessionConfig) -> Self {
        let (event_tx, _) = broadcast::channel(64);

        Self {
            shared: Arc::new(SessionShared {
                phase: Mutex::new(Phase::Idle),
                duration_secs: Mutex::new(0),
                event_tx,
            }),
            provider,
            sink,
            config,
        }
    }

    /// Gibt einen Event-Receiver zurück
    pub fn subscribe(&self) -> broadcast::Receiver<CallEvent> {
        self.shared.event_tx.subscribe()
    }

    /// Gibt den aktuellen Status zurück
    pub fn status(&self) -> CallStatus {
        self.shared.phase.lock().status()
    }

    /// Bisherige Anrufdauer in Sekunden
    pub fn duration_seconds(&self) -> u64 {
        *self.shared.duration_secs.lock()
    }

    /// Gibt den Mute-Status zurück
    pub fn is_muted(&self) -> bool {
        self.shared.phase.lock().muted()
    }

    /// Aktueller Mikrofon-Pegel (0.0 wenn kein Capture gehalten wird)
    pub fn input_level(&self) -> f32 {
        self.shared
            .phase
            .lock()
            .capture()
            .map(|c| c.input_level())
            .unwrap_or(0.0)
    }

    /// Momentaufnahme für die Präsentationsschicht
    pub fn snapshot(&self) -> CallSnapshot {
        let phase = self.shared.phase.lock();
        CallSnapshot {
            status: phase.status(),
            duration_seconds: *self.shared.duration_secs.lock(),
            muted: phase.muted(),
            capture_active: phase.capture().is_some(),
        }
    }

    /// Startet einen Anruf
    ///
    /// Fordert Mikrofon-Zugriff an und wechselt auf `Connecting`; nach dem
    /// Verbindungs-Delay wird der Anruf `Active`. Außerhalb von `Idle`
    /// wird der Aufruf ignoriert. Schlägt der Erwerb fehl, fällt die
    /// Session sofort auf `Idle` zurück und es bleibt nichts gehalten.
    pub async fn start_call(&self) -> Result<(), CallSessionError> {
        let call_id = Uuid::new_v4();

        {
            let mut phase = self.shared.phase.lock();
            if !matches!(*phase, Phase::Idle) {
                tracing::debug!("start_call ignored, session is {}", phase.status());
                return Ok(());
            }
            *phase = Phase::Requesting { call_id };
        }

        tracing::info!("Starting call {}, requesting microphone access", call_id);
        self.shared
            .emit(CallEvent::StatusChanged(CallStatus::Connecting));

        let capture = match self.provider.acquire(&self.config.constraints).await {
            Ok(capture) => capture,
            Err(e) => {
                tracing::error!("Microphone access failed: {}", e);

                let reverted = {
                    let mut phase = self.shared.phase.lock();
                    if matches!(*phase, Phase::Requesting { call_id: c } if c == call_id) {
                        *phase = Phase::Idle;
                        true
                    } else {
                        false
                    }
                };
                if reverted {
                    self.shared.emit(CallEvent::StatusChanged(CallStatus::Idle));
                }
                self.shared.emit(CallEvent::Error(e.to_string()));
                self.sink.notify(NotifyKind::Error, "Microphone access failed");
                return Err(e.into());
            }
        };

        {
            let mut phase = self.shared.phase.lock();
            if matches!(*phase, Phase::Requesting { call_id: c } if c == call_id) {
                *phase = Phase::Connecting {
                    call_id,
                    capture,
                    muted: false,
                };
            } else {
                // Der Anruf wurde während des Erwerbs beendet; die eben
                // erteilte Ressource wird sofort wieder freigegeben
                drop(phase);
                capture.stop_all();
                tracing::debug!("Call {} was ended during microphone acquisition", call_id);
                return Ok(());
            }
        }

        tracing::info!("Microphone access granted for call {}", call_id);
        self.shared.spawn_connect_timer(
            call_id,
            Arc::clone(&self.sink),
            self.config.connect_delay,
            self.config.tick_interval,
        );

        Ok(())
    }

    /// Setzt den Mute-Status
    ///
    /// No-op wenn kein Capture gehalten wird oder der Status unverändert ist.
    pub fn set_muted(&self, muted: bool) {
        let changed = {
            let mut phase = self.shared.phase.lock();
            match &mut *phase {
                Phase::Connecting {
                    muted: m, capture, ..
                }
                | Phase::Active {
                    muted: m, capture, ..
                } => {
                    if *m == muted {
                        false
                    } else {
                        *m = muted;
                        capture.set_all_enabled(!muted);
                        true
                    }
                }
                _ => false,
            }
        };

        if changed {
            tracing::debug!("Microphone muted: {}", muted);
            self.sink.notify(
                NotifyKind::Info,
                if muted {
                    "Microphone muted"
                } else {
                    "Microphone unmuted"
                },
            );
        }
    }

    /// Kehrt den Mute-Status um (No-op ohne Capture)
    pub fn toggle_mute(&self) {
        let muted = self.is_muted();
        self.set_muted(!muted);
    }

    /// Beendet den aktuellen Anruf
    ///
    /// Stoppt alle Tracks, gibt das Capture frei und wechselt auf `Ended`;
    /// nach dem Delay fällt die Session automatisch auf `Idle` zurück.
    /// In `Idle` und `Ended` ist der Aufruf ein No-op.
    pub fn end_call(&self) {
        let released = {
            let mut phase = self.shared.phase.lock();
            match std::mem::replace(&mut *phase, Phase::Ended) {
                Phase::Requesting { call_id } => {
                    // Der Erwerb läuft noch; das Handle wird bei der
                    // Erteilung verworfen
                    tracing::info!("Ending call {} during microphone acquisition", call_id);
                    None
                }
                Phase::Connecting {
                    call_id, capture, ..
                }
                | Phase::Active {
                    call_id, capture, ..
                } => {
                    tracing::info!("Ending call {}", call_id);
                    Some(capture)
                }
                other @ (Phase::Idle | Phase::Ended) => {
                    *phase = other;
                    return;
                }
            }
        };

        if let Some(capture) = released {
            capture.stop_all();
        }

        self.shared.emit(CallEvent::StatusChanged(CallStatus::Ended));
        self.sink.notify(NotifyKind::Success, "Call ended");
        self.shared.spawn_idle_timer(self.config.idle_return_delay);
    }
}

impl<P: CaptureProvider> Drop for CallSession<P> {
    fn drop(&mut self) {
        // Capture auf jedem Austrittspfad freigeben; laufende Timer
        // erkennen den Phasenwechsel und beenden sich selbst
        let released = {
            let mut phase = self.shared.phase.lock();
            let released = match std::mem::replace(&mut *phase, Phase::Idle) {
                Phase::Connecting { capture, .. } | Phase::Active { capture, .. } => Some(capture),
                _ => None,
            };
            *self.shared.duration_secs.lock() = 0;
            released
        };

        if let Some(capture) = released {
            capture.stop_all();
        }
    }
}

impl<P: CaptureProvider> std::fmt::Debug for CallSession<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallSession")
            .field("status", &self.status())
            .field("duration_seconds", &self.duration_seconds())
            .field("muted", &self.is_muted())
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::super::capture::testing::TestProvider;
    use super::super::capture::AudioTrack;
    use super::*;
    use crate::notify::MemorySink;
    use tokio::time::sleep;

    const CONNECT: Duration = Duration::from_millis(30);
    const IDLE_RETURN: Duration = Duration::from_millis(60);
    const TICK: Duration = Duration::from_millis(25);

    fn test_config() -> SessionConfig {
        SessionConfig {
            connect_delay: CONNECT,
            idle_return_delay: IDLE_RETURN,
            tick_interval: TICK,
            constraints: CaptureConstraints::default(),
        }
    }

    fn session(provider: TestProvider) -> (CallSession<TestProvider>, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let session = CallSession::with_config(
            provider,
            Arc::clone(&sink) as Arc<dyn NotificationSink>,
            test_config(),
        );
        (session, sink)
    }

    #[tokio::test]
    async fn test_start_call_with_capture_granted() {
        let provider = TestProvider::granting();
        let (session, sink) = session(provider);

        session.start_call().await.unwrap();
        let snap = session.snapshot();
        assert_eq!(snap.status, CallStatus::Connecting);
        assert!(snap.capture_active);
        assert!(!snap.muted);

        sleep(CONNECT * 3).await;
        assert_eq!(session.status(), CallStatus::Active);
        assert!(!session.is_muted());
        assert_eq!(sink.count_of(NotifyKind::Success), 1);
    }

    #[tokio::test]
    async fn test_start_call_denied() {
        let provider = TestProvider::denying();
        let (session, sink) = session(provider);

        let result = session.start_call().await;
        assert!(result.is_err());
        assert_eq!(session.status(), CallStatus::Idle);
        assert!(!session.snapshot().capture_active);
        assert_eq!(sink.count_of(NotifyKind::Error), 1);

        // Es darf nachträglich kein Active entstehen
        sleep(CONNECT * 3).await;
        assert_eq!(session.status(), CallStatus::Idle);
    }

    #[tokio::test]
    async fn test_start_call_ignored_when_not_idle() {
        let provider = TestProvider::granting();
        let (session, _sink) = session(provider.clone());

        session.start_call().await.unwrap();
        session.start_call().await.unwrap();
        assert_eq!(provider.acquire_count(), 1);
    }

    #[tokio::test]
    async fn test_toggle_mute_flips_tracks() {
        let provider = TestProvider::granting();
        let (session, sink) = session(provider.clone());

        session.start_call().await.unwrap();
        sleep(CONNECT * 3).await;
        assert_eq!(session.status(), CallStatus::Active);

        session.toggle_mute();
        assert!(session.is_muted());
        let tracks = provider.acquired();
        assert!(tracks.iter().all(|t| !t.is_enabled()));

        session.toggle_mute();
        assert!(!session.is_muted());
        assert!(tracks.iter().all(|t| t.is_enabled()));

        assert_eq!(sink.count_of(NotifyKind::Info), 2);
    }

    #[tokio::test]
    async fn test_toggle_mute_without_capture_is_noop() {
        let provider = TestProvider::granting();
        let (session, sink) = session(provider);

        session.toggle_mute();
        assert_eq!(session.status(), CallStatus::Idle);
        assert!(!session.is_muted());
        assert!(sink.messages().is_empty());
    }

    #[tokio::test]
    async fn test_end_call_releases_capture_and_returns_to_idle() {
        let provider = TestProvider::granting();
        let (session, sink) = session(provider.clone());

        session.start_call().await.unwrap();
        sleep(CONNECT * 3).await;
        assert_eq!(session.status(), CallStatus::Active);
        session.toggle_mute();
        assert!(session.is_muted());

        session.end_call();
        assert_eq!(session.status(), CallStatus::Ended);
        assert!(!session.is_muted());
        assert!(!session.snapshot().capture_active);
        assert!(provider.acquired().iter().all(|t| t.is_stopped()));
        // "Call started" + "Call ended"
        assert_eq!(sink.count_of(NotifyKind::Success), 2);

        sleep(IDLE_RETURN * 3).await;
        assert_eq!(session.status(), CallStatus::Idle);
        assert_eq!(session.duration_seconds(), 0);
    }

    #[tokio::test]
    async fn test_end_call_is_idempotent() {
        let provider = TestProvider::granting();
        let (session, sink) = session(provider);

        // In Idle: No-op, keine Meldung
        session.end_call();
        assert_eq!(session.status(), CallStatus::Idle);
        assert!(sink.messages().is_empty());

        session.start_call().await.unwrap();
        sleep(CONNECT * 3).await;

        session.end_call();
        let after_first = sink.messages().len();

        // In Ended: No-op
        session.end_call();
        assert_eq!(session.status(), CallStatus::Ended);
        assert_eq!(sink.messages().len(), after_first);
    }

    #[tokio::test]
    async fn test_duration_ticks_only_while_active() {
        let provider = TestProvider::granting();
        let (session, _sink) = session(provider);

        session.start_call().await.unwrap();
        // Connecting zählt nicht
        assert_eq!(session.duration_seconds(), 0);

        sleep(CONNECT * 2).await;
        assert_eq!(session.status(), CallStatus::Active);
        sleep(TICK * 4).await;
        let during = session.duration_seconds();
        assert!(during >= 2, "duration should have ticked, was {}", during);

        session.end_call();
        let at_end = session.duration_seconds();

        // In Ended bleibt der Wert stehen
        sleep(TICK).await;
        assert_eq!(session.duration_seconds(), at_end);

        // und wird erst beim Erreichen von Idle zurückgesetzt
        sleep(IDLE_RETURN * 3).await;
        assert_eq!(session.status(), CallStatus::Idle);
        assert_eq!(session.duration_seconds(), 0);
    }

    #[tokio::test]
    async fn test_end_call_while_connecting_cancels_activation() {
        let provider = TestProvider::granting();
        let (session, _sink) = session(provider.clone());

        session.start_call().await.unwrap();
        assert_eq!(session.status(), CallStatus::Connecting);

        session.end_call();
        assert_eq!(session.status(), CallStatus::Ended);
        assert!(provider.acquired()[0].is_stopped());

        // Der alte Verbindungs-Timer darf den Anruf nicht mehr aktivieren
        sleep(CONNECT * 3).await;
        assert_ne!(session.status(), CallStatus::Active);
    }

    #[tokio::test]
    async fn test_end_call_during_acquisition_discards_grant() {
        let provider = TestProvider::granting().with_delay(Duration::from_millis(40));
        let (session, _sink) = session(provider.clone());

        let session = Arc::new(session);
        let starter = Arc::clone(&session);
        let task = tokio::spawn(async move { starter.start_call().await });

        sleep(Duration::from_millis(10)).await;
        assert_eq!(session.status(), CallStatus::Connecting);
        session.end_call();
        assert_eq!(session.status(), CallStatus::Ended);

        task.await.unwrap().unwrap();

        // Die nachträglich erteilte Ressource wurde sofort gestoppt
        let tracks = provider.acquired();
        assert_eq!(tracks.len(), 1);
        assert!(tracks[0].is_stopped());
        assert!(!session.snapshot().capture_active);

        sleep(CONNECT * 3).await;
        assert_ne!(session.status(), CallStatus::Active);
    }

    #[tokio::test]
    async fn test_input_level_follows_capture() {
        let provider = TestProvider::granting();
        let (session, _sink) = session(provider);

        assert_eq!(session.input_level(), 0.0);
        session.start_call().await.unwrap();
        assert!(session.input_level() > 0.0);

        session.set_muted(true);
        assert_eq!(session.input_level(), 0.0);
    }

    #[tokio::test]
    async fn test_drop_releases_capture() {
        let provider = TestProvider::granting();
        let (session, _sink) = session(provider.clone());

        session.start_call().await.unwrap();
        drop(session);
        assert!(provider.acquired()[0].is_stopped());
    }

    #[tokio::test]
    async fn test_status_events_follow_lifecycle() {
        let provider = TestProvider::granting();
        let (session, _sink) = session(provider);
        let mut rx = session.subscribe();

        session.start_call().await.unwrap();
        sleep(CONNECT * 3).await;
        session.end_call();
        sleep(IDLE_RETURN * 3).await;

        let mut statuses = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let CallEvent::StatusChanged(status) = event {
                statuses.push(status);
            }
        }
        assert_eq!(
            statuses,
            vec![
                CallStatus::Connecting,
                CallStatus::Active,
                CallStatus::Ended,
                CallStatus::Idle
            ]
        );
    }

    #[tokio::test]
    async fn test_snapshot_serializes() {
        let provider = TestProvider::granting();
        let (session, _sink) = session(provider);

        let json = serde_json::to_value(session.snapshot()).unwrap();
        assert_eq!(json["status"], "idle");
        assert_eq!(json["duration_seconds"], 0);
        assert_eq!(json["muted"], false);
        assert_eq!(json["capture_active"], false);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "00:00");
        assert_eq!(format_duration(5), "00:05");
        assert_eq!(format_duration(65), "01:05");
        assert_eq!(format_duration(600), "10:00");
    }
}
