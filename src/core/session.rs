//! Session state machine
//!
//! Owns every piece of client state and drives the probe, the acquirer and
//! the translation backend. State lives behind one lock that is never held
//! across an await, so each transition is observed whole. A snapshot is
//! emitted to the view after every transition.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::core::acquirer::{ImageAcquirer, PickResult, PickerOptions};
use crate::core::connectivity::{ConnectivityProbe, ReachabilityProbe};
use crate::core::translation::{Translation, TranslationBackend, TranslationClient, TranslationOutcome};
use crate::core::upload;
use crate::shared::emit::{emit_event, EventSink};
use crate::shared::error::{AppError, AppResult};
use crate::shared::events::{AlertChoice, SessionEvent};
use crate::shared::settings::ClientSettings;
use crate::shared::types::{ConnectionStatus, LanguageCode, SelectedImage, SessionPhase, SessionSnapshot};

pub const CONNECTION_ALERT_MESSAGE: &str =
    "Unable to connect to the server. Make sure it is running and reachable, then retry.";
pub const PERMISSION_MESSAGE: &str = "Permission to access your photos is required to pick an image.";
pub const NETWORK_FAILURE_MESSAGE: &str = "Could not reach the server. Check your connection and try again.";
pub const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong while processing the image. Please try again.";

/// Result of asking the user for an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickOutcome {
    Selected,
    Canceled,
}

#[derive(Debug, Default)]
struct SessionState {
    connection: ConnectionStatus,
    phase: SessionPhase,
    image: Option<SelectedImage>,
    language: LanguageCode,
    busy: bool,
    translation: Option<Translation>,
    last_failure: Option<String>,
    connection_alert: Option<String>,
    /// Token of the most recently started probe
    latest_probe: u64,
}

impl SessionState {
    fn snapshot(&self) -> SessionSnapshot {
        let connected = self.connection.is_connected();
        SessionSnapshot {
            connection: self.connection,
            phase: self.phase,
            selected_image: self.image.as_ref().map(|img| img.uri.clone()),
            language: self.language,
            busy: self.busy,
            translation: self.translation.as_ref().map(|t| t.text.clone()),
            extracted_text: self.translation.as_ref().and_then(|t| t.extracted_text.clone()),
            last_failure: self.last_failure.clone(),
            connection_alert: self.connection_alert.clone(),
            can_pick_image: connected && !self.busy,
            can_submit: connected && !self.busy && self.image.is_some(),
            can_change_language: !self.busy,
        }
    }

    fn idle_phase(&self) -> SessionPhase {
        if self.image.is_some() {
            SessionPhase::ImageReady
        } else {
            SessionPhase::Idle
        }
    }
}

struct Inner {
    state: Mutex<SessionState>,
    probe: Arc<dyn ReachabilityProbe>,
    backend: Arc<dyn TranslationBackend>,
    acquirer: Arc<dyn ImageAcquirer>,
    sink: Arc<dyn EventSink>,
}

/// Handle to a session; clones share the same state
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Inner>,
}

impl SessionController {
    pub fn new(
        probe: Arc<dyn ReachabilityProbe>,
        backend: Arc<dyn TranslationBackend>,
        acquirer: Arc<dyn ImageAcquirer>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(SessionState::default()),
                probe,
                backend,
                acquirer,
                sink,
            }),
        }
    }

    /// Session talking HTTP to the configured server
    pub fn connect(
        settings: &ClientSettings,
        acquirer: Arc<dyn ImageAcquirer>,
        sink: Arc<dyn EventSink>,
    ) -> AppResult<Self> {
        let probe = Arc::new(ConnectivityProbe::new(settings)?);
        let backend = Arc::new(TranslationClient::new(settings)?);
        let session = Self::new(probe, backend, acquirer, sink);
        session.lock().language = settings.default_language;
        Ok(session)
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply a state change and publish the resulting snapshot
    fn update<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        let (result, snapshot) = {
            let mut state = self.lock();
            let result = f(&mut *state);
            (result, state.snapshot())
        };
        tracing::debug!(
            target: "snap_translate::session",
            phase = ?snapshot.phase,
            connection = ?snapshot.connection,
            busy = snapshot.busy,
            "state changed"
        );
        emit_event(self.inner.sink.as_ref(), SessionEvent::StateChanged(snapshot));
        result
    }

    /// Like [`update`](Self::update), but nothing is published when `f` refuses
    fn transition<R>(&self, f: impl FnOnce(&mut SessionState) -> AppResult<R>) -> AppResult<R> {
        let (result, snapshot) = {
            let mut state = self.lock();
            match f(&mut *state) {
                Ok(result) => (result, state.snapshot()),
                Err(e) => return Err(e),
            }
        };
        emit_event(self.inner.sink.as_ref(), SessionEvent::StateChanged(snapshot));
        Ok(result)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.lock().snapshot()
    }

    /// First reachability check after launch
    pub async fn start(&self) -> ConnectionStatus {
        self.check_connection().await
    }

    /// Run the probe and apply its result unless a newer probe was started meanwhile
    ///
    /// Returns the connection status in effect once this probe resolved.
    pub async fn check_connection(&self) -> ConnectionStatus {
        let guard = self.update(|s| {
            let guard = CheckGuard {
                session: self,
                token: s.latest_probe + 1,
                previous: s.connection,
                previous_alert: s.connection_alert.take(),
                armed: true,
            };
            s.latest_probe = guard.token;
            s.connection = ConnectionStatus::Checking;
            guard
        });

        let status = self.inner.probe.check().await;
        let token = guard.disarm();

        let (current, alert) = self.update(|s| {
            if s.latest_probe != token {
                tracing::debug!(target: "snap_translate::session", token, latest = s.latest_probe, "dropping stale probe result");
                return (s.connection, None);
            }
            s.connection = status;
            if status == ConnectionStatus::Disconnected {
                s.connection_alert = Some(CONNECTION_ALERT_MESSAGE.to_string());
            }
            (s.connection, s.connection_alert.clone())
        });

        if let Some(message) = alert {
            emit_event(self.inner.sink.as_ref(), SessionEvent::ConnectionAlert { message });
        }
        current
    }

    /// Answer the blocking connection alert
    ///
    /// Retry re-runs the probe and returns its status; Dismiss just closes the alert.
    pub async fn resolve_alert(&self, choice: AlertChoice) -> Option<ConnectionStatus> {
        match choice {
            AlertChoice::Retry => Some(self.check_connection().await),
            AlertChoice::Dismiss => {
                self.update(|s| s.connection_alert = None);
                None
            }
        }
    }

    /// Ask the acquirer for an image and make it the current selection
    pub async fn pick_image(&self) -> AppResult<PickOutcome> {
        {
            let state = self.lock();
            if state.busy {
                return Err(AppError::Busy);
            }
            if !state.connection.is_connected() {
                return Err(AppError::NotConnected);
            }
        }

        if !self.inner.acquirer.request_permission().await {
            self.update(|s| s.last_failure = Some(PERMISSION_MESSAGE.to_string()));
            return Err(AppError::PermissionDenied(PERMISSION_MESSAGE.to_string()));
        }

        let asset = match self.inner.acquirer.launch_picker(PickerOptions::default()).await {
            Ok(PickResult::Picked(asset)) => asset,
            Ok(PickResult::Canceled) => return Ok(PickOutcome::Canceled),
            Err(e) => {
                tracing::warn!(target: "snap_translate::session", error = %e, "image picker failed");
                self.update(|s| s.last_failure = Some(e.to_string()));
                return Err(e);
            }
        };

        self.transition(|s| {
            if s.busy {
                return Err(AppError::Busy);
            }
            if !s.connection.is_connected() {
                return Err(AppError::NotConnected);
            }
            s.image = Some(match asset.bytes {
                Some(bytes) => SelectedImage::with_data(asset.uri, bytes),
                None => SelectedImage::from_uri(asset.uri),
            });
            s.phase = SessionPhase::ImageReady;
            s.last_failure = None;
            Ok(PickOutcome::Selected)
        })
    }

    pub fn set_language(&self, language: LanguageCode) -> AppResult<()> {
        self.transition(|s| {
            if s.busy {
                return Err(AppError::Busy);
            }
            s.language = language;
            if s.phase == SessionPhase::ResultShown {
                s.phase = SessionPhase::ImageReady;
            }
            Ok(())
        })
    }

    /// Send the selected image for translation
    ///
    /// Refused with `Busy`, `NotConnected` or `NoImageSelected` before anything
    /// is sent. Every other failure comes back as a non-success outcome.
    pub async fn submit(&self) -> AppResult<TranslationOutcome> {
        let (image, language) = self.transition(|s| {
            if s.busy {
                return Err(AppError::Busy);
            }
            if !s.connection.is_connected() {
                return Err(AppError::NotConnected);
            }
            let image = s.image.clone().ok_or(AppError::NoImageSelected)?;
            s.busy = true;
            s.phase = SessionPhase::Submitting;
            s.last_failure = None;
            Ok((image, s.language))
        })?;

        let guard = BusyGuard { session: self, armed: true };

        let payload = match upload::build(&image, language, self.inner.acquirer.uri_normalization()) {
            Ok(payload) => payload,
            Err(e) => {
                guard.release(Some(e.to_string()));
                return Err(e);
            }
        };

        let outcome = self.inner.backend.submit(payload).await;
        guard.resolve(&outcome);
        Ok(outcome)
    }

    /// Resubmit the current image with a freshly built payload
    pub async fn retry_submission(&self) -> AppResult<TranslationOutcome> {
        self.submit().await
    }
}

/// User-facing message for a failed outcome
pub fn failure_message(outcome: &TranslationOutcome) -> Option<String> {
    match outcome {
        TranslationOutcome::Success(_) => None,
        TranslationOutcome::ServerError { message } => Some(message.clone()),
        TranslationOutcome::NetworkError => Some(NETWORK_FAILURE_MESSAGE.to_string()),
        TranslationOutcome::MalformedResponse => Some(GENERIC_FAILURE_MESSAGE.to_string()),
        TranslationOutcome::ClientError { message } => Some(format!("Could not send the image: {}", message)),
    }
}

/// Clears the busy flag however the submission ends, including when its
/// future is dropped mid-flight
struct BusyGuard<'a> {
    session: &'a SessionController,
    armed: bool,
}

impl BusyGuard<'_> {
    fn release(mut self, failure: Option<String>) {
        self.armed = false;
        self.session.update(|s| {
            s.busy = false;
            s.phase = s.idle_phase();
            if failure.is_some() {
                s.last_failure = failure;
            }
        });
    }

    fn resolve(mut self, outcome: &TranslationOutcome) {
        self.armed = false;
        if matches!(outcome, TranslationOutcome::MalformedResponse) {
            tracing::warn!(target: "snap_translate::session", "server response did not match the expected contract");
        }
        self.session.update(|s| {
            s.busy = false;
            s.phase = SessionPhase::ResultShown;
            match outcome {
                TranslationOutcome::Success(translation) => {
                    s.translation = Some(translation.clone());
                    s.last_failure = None;
                }
                other => s.last_failure = failure_message(other),
            }
        });
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            tracing::debug!(target: "snap_translate::session", "submission abandoned");
            self.session.update(|s| {
                s.busy = false;
                s.phase = s.idle_phase();
            });
        }
    }
}

/// Puts the previous connection status back when a check is dropped before
/// its result arrives, so the session is not left `Checking`
struct CheckGuard<'a> {
    session: &'a SessionController,
    token: u64,
    previous: ConnectionStatus,
    previous_alert: Option<String>,
    armed: bool,
}

impl CheckGuard<'_> {
    fn disarm(mut self) -> u64 {
        self.armed = false;
        self.token
    }
}

impl Drop for CheckGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let token = self.token;
        let previous = self.previous;
        let previous_alert = self.previous_alert.take();
        self.session.update(|s| {
            if s.latest_probe != token {
                return;
            }
            tracing::debug!(target: "snap_translate::session", token, "connection check abandoned");
            // an earlier check still in flight becomes the latest again
            s.latest_probe = token - 1;
            s.connection = previous;
            s.connection_alert = previous_alert;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::acquirer::{PickedAsset, UriNormalization};
    use crate::core::upload::UploadPayload;
    use crate::test_support::{settings_for, spawn_server};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    struct ScriptedProbe {
        script: Mutex<VecDeque<(u64, ConnectionStatus)>>,
        calls: AtomicUsize,
    }

    impl ScriptedProbe {
        fn new(script: Vec<(u64, ConnectionStatus)>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
            })
        }

        fn always(status: ConnectionStatus) -> Arc<Self> {
            Self::new(vec![(0, status); 8])
        }
    }

    #[async_trait]
    impl ReachabilityProbe for ScriptedProbe {
        async fn check(&self) -> ConnectionStatus {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().unwrap().pop_front();
            let (delay_ms, status) = next.unwrap_or((0, ConnectionStatus::Disconnected));
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            status
        }
    }

    struct ScriptedBackend {
        outcomes: Mutex<VecDeque<TranslationOutcome>>,
        delay: Duration,
        payloads: Mutex<Vec<UploadPayload>>,
    }

    impl ScriptedBackend {
        fn new(outcomes: Vec<TranslationOutcome>) -> Arc<Self> {
            Self::delayed(outcomes, Duration::ZERO)
        }

        fn delayed(outcomes: Vec<TranslationOutcome>, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                delay,
                payloads: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.payloads.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl TranslationBackend for ScriptedBackend {
        async fn submit(&self, payload: UploadPayload) -> TranslationOutcome {
            self.payloads.lock().unwrap().push(payload);
            tokio::time::sleep(self.delay).await;
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(TranslationOutcome::NetworkError)
        }
    }

    struct FakeAcquirer {
        granted: bool,
        result: PickResult,
        picker_delay: Duration,
        calls: AtomicUsize,
    }

    impl FakeAcquirer {
        fn picking(uri: &str) -> Arc<Self> {
            Arc::new(Self {
                granted: true,
                result: PickResult::Picked(PickedAsset {
                    uri: uri.to_string(),
                    bytes: Some(b"img".to_vec()),
                }),
                picker_delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            })
        }

        fn slow_picking(uri: &str, picker_delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                granted: true,
                result: PickResult::Picked(PickedAsset {
                    uri: uri.to_string(),
                    bytes: Some(b"img".to_vec()),
                }),
                picker_delay,
                calls: AtomicUsize::new(0),
            })
        }

        fn with(granted: bool, result: PickResult) -> Arc<Self> {
            Arc::new(Self {
                granted,
                result,
                picker_delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ImageAcquirer for FakeAcquirer {
        async fn request_permission(&self) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.granted
        }

        async fn launch_picker(&self, options: PickerOptions) -> AppResult<PickResult> {
            assert_eq!(options, PickerOptions::default());
            tokio::time::sleep(self.picker_delay).await;
            Ok(self.result.clone())
        }

        fn uri_normalization(&self) -> UriNormalization {
            UriNormalization::StripFileScheme
        }
    }

    fn success(text: &str) -> TranslationOutcome {
        TranslationOutcome::Success(Translation {
            text: text.to_string(),
            extracted_text: Some("Hello".to_string()),
            source_language: Some("en".to_string()),
            target_language: None,
        })
    }

    fn session(
        probe: Arc<ScriptedProbe>,
        backend: Arc<ScriptedBackend>,
        acquirer: Arc<FakeAcquirer>,
    ) -> (SessionController, UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (SessionController::new(probe, backend, acquirer, Arc::new(tx)), rx)
    }

    fn drain(rx: &mut UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_connected_probe_enables_picking() {
        let (session, _rx) = session(
            ScriptedProbe::always(ConnectionStatus::Connected),
            ScriptedBackend::new(vec![]),
            FakeAcquirer::picking("file:///tmp/photo.png"),
        );

        assert_eq!(session.snapshot().connection, ConnectionStatus::Checking);
        assert!(!session.snapshot().can_pick_image);

        assert_eq!(session.start().await, ConnectionStatus::Connected);
        let snap = session.snapshot();
        assert!(snap.can_pick_image);
        assert!(!snap.can_submit);
        assert_eq!(snap.phase, SessionPhase::Idle);
    }

    #[tokio::test]
    async fn test_failed_probe_raises_alert_and_retry_reruns_check() {
        let probe = ScriptedProbe::new(vec![
            (0, ConnectionStatus::Disconnected),
            (0, ConnectionStatus::Connected),
        ]);
        let (session, mut rx) = session(
            probe.clone(),
            ScriptedBackend::new(vec![]),
            FakeAcquirer::picking("file:///tmp/photo.png"),
        );

        assert_eq!(session.start().await, ConnectionStatus::Disconnected);
        assert_eq!(session.snapshot().connection_alert.as_deref(), Some(CONNECTION_ALERT_MESSAGE));
        assert!(drain(&mut rx).iter().any(|e| matches!(e, SessionEvent::ConnectionAlert { .. })));

        assert_eq!(session.resolve_alert(AlertChoice::Retry).await, Some(ConnectionStatus::Connected));
        assert_eq!(probe.calls.load(Ordering::SeqCst), 2);
        let snap = session.snapshot();
        assert_eq!(snap.connection_alert, None);
        assert!(snap.can_pick_image);
    }

    #[tokio::test]
    async fn test_dismiss_closes_alert_without_probing() {
        let probe = ScriptedProbe::always(ConnectionStatus::Disconnected);
        let (session, _rx) = session(
            probe.clone(),
            ScriptedBackend::new(vec![]),
            FakeAcquirer::picking("file:///tmp/photo.png"),
        );

        session.start().await;
        assert_eq!(session.resolve_alert(AlertChoice::Dismiss).await, None);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.snapshot().connection_alert, None);
        assert_eq!(session.snapshot().connection, ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_disconnected_rejects_pick_and_submit_without_calls() {
        let backend = ScriptedBackend::new(vec![success("Bonjour")]);
        let acquirer = FakeAcquirer::picking("file:///tmp/photo.png");
        let (session, _rx) = session(
            ScriptedProbe::always(ConnectionStatus::Disconnected),
            backend.clone(),
            acquirer.clone(),
        );

        session.start().await;
        assert_eq!(session.pick_image().await, Err(AppError::NotConnected));
        assert_eq!(session.submit().await, Err(AppError::NotConnected));
        assert_eq!(acquirer.calls.load(Ordering::SeqCst), 0);
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_photo_in_french_shows_bonjour() {
        let backend = ScriptedBackend::new(vec![success("Bonjour")]);
        let (session, mut rx) = session(
            ScriptedProbe::always(ConnectionStatus::Connected),
            backend.clone(),
            FakeAcquirer::picking("file:///var/mobile/photo.png"),
        );

        session.start().await;
        assert_eq!(session.pick_image().await, Ok(PickOutcome::Selected));
        assert_eq!(session.snapshot().phase, SessionPhase::ImageReady);
        session.set_language(LanguageCode::Fr).unwrap();

        let outcome = session.submit().await.unwrap();
        assert!(outcome.is_success());

        let snap = session.snapshot();
        assert_eq!(snap.translation.as_deref(), Some("Bonjour"));
        assert_eq!(snap.extracted_text.as_deref(), Some("Hello"));
        assert!(!snap.busy);
        assert_eq!(snap.phase, SessionPhase::ResultShown);
        assert_eq!(snap.last_failure, None);

        let payloads = backend.payloads.lock().unwrap();
        assert_eq!(payloads[0].file_name, "photo.png");
        assert_eq!(payloads[0].content_type, "image/png");
        assert_eq!(payloads[0].source, "/var/mobile/photo.png");
        assert_eq!(payloads[0].language, LanguageCode::Fr);

        let events = drain(&mut rx);
        let Some(SessionEvent::StateChanged(last)) = events.last() else {
            panic!("expected a state change event");
        };
        assert_eq!(last, &snap);
        assert!(events.iter().any(|e| matches!(e, SessionEvent::StateChanged(s) if s.busy)));
    }

    #[tokio::test]
    async fn test_second_submit_while_busy_is_rejected() {
        let backend = ScriptedBackend::delayed(vec![success("Hola")], Duration::from_millis(50));
        let (session, _rx) = session(
            ScriptedProbe::always(ConnectionStatus::Connected),
            backend.clone(),
            FakeAcquirer::picking("file:///tmp/photo.png"),
        );
        session.start().await;
        session.pick_image().await.unwrap();

        let observer = session.clone();
        let (first, second) = tokio::join!(session.submit(), async move {
            tokio::task::yield_now().await;
            let snap = observer.snapshot();
            assert!(snap.busy);
            assert_eq!(snap.phase, SessionPhase::Submitting);
            assert!(!snap.can_submit && !snap.can_pick_image && !snap.can_change_language);
            assert_eq!(observer.set_language(LanguageCode::Es), Err(AppError::Busy));
            assert_eq!(observer.pick_image().await, Err(AppError::Busy));
            observer.retry_submission().await
        });

        assert!(first.unwrap().is_success());
        assert_eq!(second, Err(AppError::Busy));
        assert_eq!(backend.calls(), 1);
        assert!(!session.snapshot().busy);
    }

    #[tokio::test]
    async fn test_server_error_keeps_previous_translation() {
        let backend = ScriptedBackend::new(vec![
            success("Bonjour"),
            TranslationOutcome::ServerError { message: "bad image".to_string() },
        ]);
        let (session, _rx) = session(
            ScriptedProbe::always(ConnectionStatus::Connected),
            backend,
            FakeAcquirer::picking("file:///tmp/photo.png"),
        );
        session.start().await;
        session.pick_image().await.unwrap();

        session.submit().await.unwrap();
        let outcome = session.retry_submission().await.unwrap();
        assert_eq!(outcome, TranslationOutcome::ServerError { message: "bad image".to_string() });

        let snap = session.snapshot();
        assert_eq!(snap.translation.as_deref(), Some("Bonjour"));
        assert_eq!(snap.last_failure.as_deref(), Some("bad image"));
        assert!(!snap.busy);
    }

    #[tokio::test]
    async fn test_malformed_response_shows_generic_message() {
        let (session, _rx) = session(
            ScriptedProbe::always(ConnectionStatus::Connected),
            ScriptedBackend::new(vec![TranslationOutcome::MalformedResponse]),
            FakeAcquirer::picking("file:///tmp/photo.png"),
        );
        session.start().await;
        session.pick_image().await.unwrap();

        assert_eq!(session.submit().await.unwrap(), TranslationOutcome::MalformedResponse);
        let snap = session.snapshot();
        assert_eq!(snap.last_failure.as_deref(), Some(GENERIC_FAILURE_MESSAGE));
        assert_eq!(snap.translation, None);
        assert_eq!(snap.phase, SessionPhase::ResultShown);
    }

    #[tokio::test]
    async fn test_network_error_returns_to_interactive_state() {
        let (session, _rx) = session(
            ScriptedProbe::always(ConnectionStatus::Connected),
            ScriptedBackend::new(vec![TranslationOutcome::NetworkError]),
            FakeAcquirer::picking("file:///tmp/photo.png"),
        );
        session.start().await;
        session.pick_image().await.unwrap();

        assert_eq!(session.submit().await.unwrap(), TranslationOutcome::NetworkError);
        let snap = session.snapshot();
        assert!(!snap.busy);
        assert!(snap.can_submit);
        assert_eq!(snap.last_failure.as_deref(), Some(NETWORK_FAILURE_MESSAGE));
    }

    #[tokio::test]
    async fn test_permission_denied_is_surfaced() {
        let (session, _rx) = session(
            ScriptedProbe::always(ConnectionStatus::Connected),
            ScriptedBackend::new(vec![]),
            FakeAcquirer::with(false, PickResult::Canceled),
        );
        session.start().await;

        assert!(matches!(session.pick_image().await, Err(AppError::PermissionDenied(_))));
        let snap = session.snapshot();
        assert_eq!(snap.last_failure.as_deref(), Some(PERMISSION_MESSAGE));
        assert_eq!(snap.selected_image, None);
    }

    #[tokio::test]
    async fn test_canceled_pick_changes_nothing() {
        let (session, _rx) = session(
            ScriptedProbe::always(ConnectionStatus::Connected),
            ScriptedBackend::new(vec![]),
            FakeAcquirer::with(true, PickResult::Canceled),
        );
        session.start().await;

        assert_eq!(session.pick_image().await, Ok(PickOutcome::Canceled));
        assert_eq!(session.snapshot().phase, SessionPhase::Idle);
        assert_eq!(session.submit().await, Err(AppError::NoImageSelected));
    }

    #[tokio::test]
    async fn test_unusable_reference_fails_before_network() {
        let backend = ScriptedBackend::new(vec![success("never")]);
        let (session, _rx) = session(
            ScriptedProbe::always(ConnectionStatus::Connected),
            backend.clone(),
            FakeAcquirer::picking("file:///tmp/"),
        );
        session.start().await;
        session.pick_image().await.unwrap();

        assert!(matches!(session.submit().await, Err(AppError::InvalidInput(_))));
        assert_eq!(backend.calls(), 0);
        let snap = session.snapshot();
        assert!(!snap.busy);
        assert_eq!(snap.phase, SessionPhase::ImageReady);
        assert!(snap.last_failure.is_some());
    }

    #[tokio::test]
    async fn test_language_change_after_result_returns_to_image_ready() {
        let (session, _rx) = session(
            ScriptedProbe::always(ConnectionStatus::Connected),
            ScriptedBackend::new(vec![success("Hola")]),
            FakeAcquirer::picking("file:///tmp/photo.png"),
        );
        session.start().await;
        session.pick_image().await.unwrap();
        session.submit().await.unwrap();
        assert_eq!(session.snapshot().phase, SessionPhase::ResultShown);

        session.set_language(LanguageCode::Es).unwrap();
        let snap = session.snapshot();
        assert_eq!(snap.phase, SessionPhase::ImageReady);
        assert_eq!(snap.language, LanguageCode::Es);
        assert_eq!(snap.translation.as_deref(), Some("Hola"));
    }

    #[tokio::test]
    async fn test_dropped_submission_releases_busy_flag() {
        let backend = ScriptedBackend::delayed(vec![success("late")], Duration::from_secs(5));
        let (session, _rx) = session(
            ScriptedProbe::always(ConnectionStatus::Connected),
            backend,
            FakeAcquirer::picking("file:///tmp/photo.png"),
        );
        session.start().await;
        session.pick_image().await.unwrap();

        let abandoned = tokio::time::timeout(Duration::from_millis(20), session.submit()).await;
        assert!(abandoned.is_err());

        let snap = session.snapshot();
        assert!(!snap.busy);
        assert_eq!(snap.phase, SessionPhase::ImageReady);
    }

    #[tokio::test]
    async fn test_stale_probe_cannot_overwrite_newer_result() {
        let probe = ScriptedProbe::new(vec![
            (200, ConnectionStatus::Disconnected),
            (10, ConnectionStatus::Connected),
        ]);
        let (session, mut rx) = session(
            probe,
            ScriptedBackend::new(vec![]),
            FakeAcquirer::picking("file:///tmp/photo.png"),
        );

        let retry = session.clone();
        let (slow, fast) = tokio::join!(session.start(), async move {
            tokio::task::yield_now().await;
            retry.check_connection().await
        });

        assert_eq!(fast, ConnectionStatus::Connected);
        assert_eq!(slow, ConnectionStatus::Connected);
        assert_eq!(session.snapshot().connection, ConnectionStatus::Connected);
        assert_eq!(session.snapshot().connection_alert, None);
        assert!(!drain(&mut rx).iter().any(|e| matches!(e, SessionEvent::ConnectionAlert { .. })));
    }

    #[tokio::test]
    async fn test_pick_finishing_after_disconnect_is_rejected() {
        let probe = ScriptedProbe::new(vec![
            (0, ConnectionStatus::Connected),
            (0, ConnectionStatus::Disconnected),
        ]);
        let (session, _rx) = session(
            probe,
            ScriptedBackend::new(vec![]),
            FakeAcquirer::slow_picking("file:///tmp/photo.png", Duration::from_millis(50)),
        );
        assert_eq!(session.start().await, ConnectionStatus::Connected);

        let recheck = session.clone();
        let (picked, status) = tokio::join!(session.pick_image(), async move {
            tokio::task::yield_now().await;
            recheck.check_connection().await
        });

        assert_eq!(status, ConnectionStatus::Disconnected);
        assert_eq!(picked, Err(AppError::NotConnected));
        let snap = session.snapshot();
        assert_eq!(snap.selected_image, None);
        assert_eq!(snap.phase, SessionPhase::Idle);
    }

    #[tokio::test]
    async fn test_dropped_connection_check_restores_previous_status() {
        let probe = ScriptedProbe::new(vec![
            (0, ConnectionStatus::Connected),
            (5_000, ConnectionStatus::Disconnected),
            (0, ConnectionStatus::Disconnected),
        ]);
        let (session, _rx) = session(
            probe,
            ScriptedBackend::new(vec![]),
            FakeAcquirer::picking("file:///tmp/photo.png"),
        );
        assert_eq!(session.start().await, ConnectionStatus::Connected);

        let abandoned = tokio::time::timeout(Duration::from_millis(20), session.check_connection()).await;
        assert!(abandoned.is_err());

        let snap = session.snapshot();
        assert_eq!(snap.connection, ConnectionStatus::Connected);
        assert!(snap.can_pick_image);

        // a later check still applies its result
        assert_eq!(session.check_connection().await, ConnectionStatus::Disconnected);
        assert_eq!(session.snapshot().connection_alert.as_deref(), Some(CONNECTION_ALERT_MESSAGE));
    }

    #[tokio::test]
    async fn test_http_session_end_to_end() {
        use axum::{routing::{get, post}, Json, Router};
        use serde_json::json;

        let app = Router::new()
            .route("/test", get(|| async { Json(json!({"status": "Server is running"})) }))
            .route("/process", post(|| async { Json(json!({"translated_text": "Bonjour"})) }));
        let addr = spawn_server(app).await;

        let (tx, _rx) = mpsc::unbounded_channel();
        let session = SessionController::connect(
            &settings_for(addr),
            FakeAcquirer::picking("file:///tmp/photo.png"),
            Arc::new(tx),
        )
        .unwrap();

        assert_eq!(session.start().await, ConnectionStatus::Connected);
        session.pick_image().await.unwrap();
        session.set_language(LanguageCode::Fr).unwrap();
        assert!(session.submit().await.unwrap().is_success());
        assert_eq!(session.snapshot().translation.as_deref(), Some("Bonjour"));
    }
}
