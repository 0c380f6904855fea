//! Session state machine: `Idle → Sending → Streaming → Idle`.

use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;
use tracing::{debug, info, warn};

use banter_client::{CancelToken, StreamEnd};
use banter_protocol::{Message, Role};

use crate::settings::GenerationSettings;
use crate::transport::{GenerateOutcome, GenerateTransport};

/// Where the session currently is in its exchange lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Sending,
    Streaming,
}

/// How an `append`/`reload` call concluded. All of these leave the session
/// back at `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The assistant response arrived in full.
    Completed,
    /// A stop marker ended the stream early.
    Stopped,
    /// The user cancelled; whatever was accumulated stays.
    Cancelled,
    /// Nothing to do (`reload` with no prior exchange).
    Noop,
}

/// Session API misuse and generation failures.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A second exchange was started while one is in flight.
    #[error("a response is already in flight")]
    Busy,
    /// The server or transport reported a failure; the message is the
    /// user-visible notification text.
    #[error("generation failed: {0}")]
    Generation(String),
}

#[derive(Debug)]
struct SessionState {
    messages: Vec<Message>,
    pending_response_id: Option<String>,
    phase: Phase,
    cancel: CancelToken,
    last_prompt: Option<String>,
}

impl SessionState {
    fn new() -> Self {
        Self {
            messages: Vec::new(),
            pending_response_id: None,
            phase: Phase::Idle,
            cancel: CancelToken::new(),
            last_prompt: None,
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only copy of the session for rendering.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub messages: Vec<Message>,
    pub pending_response_id: Option<String>,
    pub phase: Phase,
}

/// Shared handle to one session's state.
///
/// Constructed at session start and passed around explicitly; a front end
/// keeps a clone to render messages while a response streams in and to
/// request `stop` from another task.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<Mutex<SessionState>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        // A poisoned lock only means a panic elsewhere; the state itself
        // is still structurally valid.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Copy of the current session for rendering.
    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.lock();
        SessionSnapshot {
            messages: state.messages.clone(),
            pending_response_id: state.pending_response_id.clone(),
            phase: state.phase,
        }
    }

    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    /// Request cancellation of the in-flight exchange.
    ///
    /// The session returns to `Idle` immediately; the stream reader
    /// observes the flag at its next chunk boundary.
    pub fn stop(&self) {
        let mut state = self.lock();
        if state.phase == Phase::Idle {
            return;
        }
        debug!("stop requested");
        state.cancel.cancel();
        state.phase = Phase::Idle;
        state.pending_response_id = None;
    }

    /// Drop all session state. Called on session teardown.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.cancel.cancel();
        *state = SessionState::new();
    }

    /// Mark the pending exchange as streaming. Called as soon as the
    /// endpoint answers with a raw stream, before any token is decoded.
    fn begin_streaming(&self, response_id: &str) {
        let mut state = self.lock();
        if state.pending_response_id.as_deref() == Some(response_id)
            && state.phase == Phase::Sending
        {
            state.phase = Phase::Streaming;
        }
    }

    /// Append streamed text to the pending assistant message, creating it
    /// on the first token. Append-only: content is extended, never
    /// overwritten.
    fn append_streamed(&self, response_id: &str, text: &str) {
        let mut state = self.lock();
        if state.pending_response_id.as_deref() != Some(response_id) {
            // Exchange already concluded (stopped or cleared); drop late
            // tokens rather than resurrecting the message.
            return;
        }
        if state.messages.iter().all(|m| m.id != response_id) {
            state.messages.push(Message {
                id: response_id.to_string(),
                role: Role::Assistant,
                content: String::new(),
            });
        }
        if let Some(message) = state.messages.iter_mut().find(|m| m.id == response_id) {
            message.content.push_str(text);
        }
    }
}

/// Orchestrates one prompt/response exchange at a time.
pub struct SessionController<T: GenerateTransport> {
    transport: T,
    settings: GenerationSettings,
    store: SessionStore,
}

impl<T: GenerateTransport> SessionController<T> {
    pub fn new(transport: T, settings: GenerationSettings) -> Self {
        Self {
            transport,
            settings,
            store: SessionStore::new(),
        }
    }

    /// Handle to the shared session state.
    pub fn store(&self) -> SessionStore {
        self.store.clone()
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    /// Send one prompt and accumulate the response.
    ///
    /// Rejects with [`SessionError::Busy`] while a previous exchange is in
    /// flight. On failure before any content arrived, the assistant
    /// message is fully absent rather than half-written.
    pub async fn append(&self, prompt: &str) -> Result<AppendOutcome, SessionError> {
        let (response_id, cancel) = self.begin(prompt)?;
        info!("sending prompt ({} chars)", prompt.len());

        let body = self.settings.request_body(prompt);

        let stream_store = self.store.clone();
        let stream_id = response_id.clone();
        let mut on_stream = move || stream_store.begin_streaming(&stream_id);

        let token_store = self.store.clone();
        let token_id = response_id.clone();
        let mut on_token = move |text: &str| token_store.append_streamed(&token_id, text);

        let outcome = self
            .transport
            .generate(
                body,
                &self.settings.stop_markers,
                cancel,
                &mut on_stream,
                &mut on_token,
            )
            .await;

        self.conclude(&response_id, outcome)
    }

    /// Set the cancellation flag and return to `Idle` immediately.
    pub fn stop(&self) {
        self.store.stop();
    }

    /// Discard the last assistant response and re-issue the last prompt.
    ///
    /// Idempotent when there is nothing to redo: without a prior exchange
    /// this is a no-op returning [`AppendOutcome::Noop`].
    pub async fn reload(&self) -> Result<AppendOutcome, SessionError> {
        let prompt = {
            let mut state = self.store.lock();
            if state.phase != Phase::Idle {
                return Err(SessionError::Busy);
            }
            let Some(prompt) = state.last_prompt.clone() else {
                return Ok(AppendOutcome::Noop);
            };

            // Drop the previous exchange: trailing assistant message (if
            // the response ever landed) and the user message that drove it.
            while matches!(state.messages.last(), Some(m) if m.role == Role::Assistant) {
                state.messages.pop();
            }
            if matches!(state.messages.last(), Some(m) if m.role == Role::User) {
                state.messages.pop();
            }
            prompt
        };

        debug!("reloading last prompt");
        self.append(&prompt).await
    }

    /// Transition `Idle → Sending` and record the new exchange.
    fn begin(&self, prompt: &str) -> Result<(String, CancelToken), SessionError> {
        let mut state = self.store.lock();
        if state.phase != Phase::Idle {
            return Err(SessionError::Busy);
        }

        state.messages.push(Message::user(prompt));
        state.last_prompt = Some(prompt.to_string());

        let response_id = uuid::Uuid::new_v4().to_string();
        state.pending_response_id = Some(response_id.clone());
        state.cancel = CancelToken::new();
        state.phase = Phase::Sending;

        Ok((response_id, state.cancel.clone()))
    }

    /// Conclude the exchange this call started, leaving the session `Idle`.
    ///
    /// Guarded by the response id so a `stop()` that already reset the
    /// session (or a newer exchange) is never clobbered.
    fn conclude(
        &self,
        response_id: &str,
        outcome: GenerateOutcome,
    ) -> Result<AppendOutcome, SessionError> {
        let mut state = self.store.lock();
        let still_pending = state.pending_response_id.as_deref() == Some(response_id);
        if still_pending {
            state.pending_response_id = None;
            state.phase = Phase::Idle;
        }

        match outcome {
            GenerateOutcome::Complete(text) => {
                // Non-streaming provider: the full text is assigned once.
                // If stop() already reset the session the user asked for
                // nothing more, so the text is discarded.
                if !still_pending {
                    return Ok(AppendOutcome::Cancelled);
                }
                state.messages.push(Message {
                    id: response_id.to_string(),
                    role: Role::Assistant,
                    content: text,
                });
                Ok(AppendOutcome::Completed)
            }
            GenerateOutcome::Streamed(StreamEnd::Completed) => Ok(AppendOutcome::Completed),
            GenerateOutcome::Streamed(StreamEnd::StopMarker) => Ok(AppendOutcome::Stopped),
            GenerateOutcome::Streamed(StreamEnd::Cancelled) => {
                info!("exchange cancelled");
                Ok(AppendOutcome::Cancelled)
            }
            GenerateOutcome::Streamed(StreamEnd::TransportFailed(message)) => {
                // Content accumulated before the failure stays, same as
                // cancellation.
                warn!("stream failed mid-response: {}", message);
                Err(SessionError::Generation(message))
            }
            GenerateOutcome::Failed(message) => {
                warn!("generation failed: {}", message);
                // Failed before any content: the assistant message must be
                // fully absent, not half-committed.
                state.messages.retain(|m| m.id != response_id);
                Err(SessionError::Generation(message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    use crate::transport::{OnStream, OnToken};

    /// Scripted transport standing in for the HTTP registry.
    enum Script {
        Tokens(Vec<&'static str>, StreamEnd),
        Complete(&'static str),
        Fail(&'static str),
        CancelBeforeFirstFrame,
    }

    struct FakeTransport {
        script: Script,
        calls: AtomicUsize,
    }

    impl FakeTransport {
        fn new(script: Script) -> Self {
            Self {
                script,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl GenerateTransport for FakeTransport {
        async fn generate(
            &self,
            _body: Value,
            _stop_markers: &[String],
            cancel: CancelToken,
            on_stream: OnStream<'_>,
            on_token: OnToken<'_>,
        ) -> GenerateOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.script {
                Script::Tokens(tokens, end) => {
                    on_stream();
                    for token in tokens {
                        on_token(token);
                    }
                    GenerateOutcome::Streamed(end.clone())
                }
                Script::Complete(text) => GenerateOutcome::Complete(text.to_string()),
                Script::Fail(message) => GenerateOutcome::Failed(message.to_string()),
                Script::CancelBeforeFirstFrame => {
                    on_stream();
                    cancel.cancel();
                    GenerateOutcome::Streamed(StreamEnd::Cancelled)
                }
            }
        }
    }

    fn controller(script: Script) -> SessionController<FakeTransport> {
        SessionController::new(FakeTransport::new(script), GenerationSettings::default())
    }

    #[tokio::test]
    async fn streamed_tokens_accumulate_into_one_message() {
        let controller = controller(Script::Tokens(vec!["Hel", "lo"], StreamEnd::Completed));

        let outcome = controller.append("hi").await.unwrap();
        assert_eq!(outcome, AppendOutcome::Completed);

        let snapshot = controller.store().snapshot();
        assert_eq!(snapshot.phase, Phase::Idle);
        assert_eq!(snapshot.messages.len(), 2);
        assert_eq!(snapshot.messages[0].role, Role::User);
        assert_eq!(snapshot.messages[0].content, "hi");
        assert_eq!(snapshot.messages[1].role, Role::Assistant);
        assert_eq!(snapshot.messages[1].content, "Hello");
        assert!(snapshot.pending_response_id.is_none());
    }

    #[tokio::test]
    async fn complete_text_is_assigned_once() {
        let controller = controller(Script::Complete("full answer"));

        controller.append("q").await.unwrap();
        let snapshot = controller.store().snapshot();
        assert_eq!(snapshot.messages[1].content, "full answer");
        assert_eq!(snapshot.phase, Phase::Idle);
    }

    #[tokio::test]
    async fn failure_leaves_no_assistant_message() {
        let controller = controller(Script::Fail("bad model id"));

        let err = controller.append("q").await.unwrap_err();
        assert!(matches!(err, SessionError::Generation(ref m) if m == "bad model id"));

        let snapshot = controller.store().snapshot();
        assert_eq!(snapshot.phase, Phase::Idle);
        // The user message stays; the assistant message is fully absent.
        assert_eq!(snapshot.messages.len(), 1);
        assert_eq!(snapshot.messages[0].role, Role::User);
    }

    #[tokio::test]
    async fn cancellation_before_first_frame_leaves_clean_state() {
        let controller = controller(Script::CancelBeforeFirstFrame);

        let outcome = controller.append("q").await.unwrap();
        assert_eq!(outcome, AppendOutcome::Cancelled);

        let snapshot = controller.store().snapshot();
        assert_eq!(snapshot.phase, Phase::Idle);
        assert_eq!(snapshot.messages.len(), 1);
        assert!(snapshot.pending_response_id.is_none());
    }

    #[tokio::test]
    async fn stop_marker_keeps_accumulated_content() {
        let controller = controller(Script::Tokens(vec!["partial"], StreamEnd::StopMarker));

        let outcome = controller.append("q").await.unwrap();
        assert_eq!(outcome, AppendOutcome::Stopped);
        assert_eq!(controller.store().snapshot().messages[1].content, "partial");
    }

    #[tokio::test]
    async fn mid_stream_failure_keeps_partial_content() {
        let controller = controller(Script::Tokens(
            vec!["par", "tial"],
            StreamEnd::TransportFailed("connection reset".to_string()),
        ));

        let err = controller.append("q").await.unwrap_err();
        assert!(matches!(err, SessionError::Generation(_)));

        let snapshot = controller.store().snapshot();
        assert_eq!(snapshot.phase, Phase::Idle);
        assert_eq!(snapshot.messages[1].content, "partial");
    }

    #[tokio::test]
    async fn reload_with_no_prior_exchange_is_a_noop() {
        let controller = controller(Script::Complete("unused"));

        let outcome = controller.reload().await.unwrap();
        assert_eq!(outcome, AppendOutcome::Noop);
        assert!(controller.store().snapshot().messages.is_empty());

        // Idempotent: calling it again changes nothing either.
        let outcome = controller.reload().await.unwrap();
        assert_eq!(outcome, AppendOutcome::Noop);
        assert!(controller.store().snapshot().messages.is_empty());
    }

    #[tokio::test]
    async fn reload_reissues_the_last_prompt() {
        let controller = controller(Script::Complete("pong"));

        controller.append("ping").await.unwrap();
        controller.reload().await.unwrap();

        let snapshot = controller.store().snapshot();
        assert_eq!(snapshot.messages.len(), 2);
        assert_eq!(snapshot.messages[0].content, "ping");
        assert_eq!(snapshot.messages[1].content, "pong");
        assert_eq!(controller.transport.calls.load(Ordering::SeqCst), 2);
    }

    /// Transport that parks until released, so a second `append` can be
    /// attempted while the first is in flight.
    struct ParkedTransport {
        release: Notify,
    }

    #[async_trait]
    impl GenerateTransport for ParkedTransport {
        async fn generate(
            &self,
            _body: Value,
            _stop_markers: &[String],
            _cancel: CancelToken,
            _on_stream: OnStream<'_>,
            _on_token: OnToken<'_>,
        ) -> GenerateOutcome {
            self.release.notified().await;
            GenerateOutcome::Complete("done".to_string())
        }
    }

    #[tokio::test]
    async fn second_append_while_in_flight_is_rejected() {
        let controller = Arc::new(SessionController::new(
            ParkedTransport {
                release: Notify::new(),
            },
            GenerationSettings::default(),
        ));

        let first = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move { controller.append("one").await })
        };

        // Wait until the first append has left Idle.
        while controller.store().phase() == Phase::Idle {
            tokio::task::yield_now().await;
        }

        let err = controller.append("two").await.unwrap_err();
        assert!(matches!(err, SessionError::Busy));

        controller.transport.release.notify_one();
        first.await.unwrap().unwrap();
        assert_eq!(controller.store().phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn complete_arriving_after_stop_reports_cancelled() {
        let controller = Arc::new(SessionController::new(
            ParkedTransport {
                release: Notify::new(),
            },
            GenerationSettings::default(),
        ));

        let pending = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move { controller.append("q").await })
        };

        while controller.store().phase() == Phase::Idle {
            tokio::task::yield_now().await;
        }

        controller.stop();
        controller.transport.release.notify_one();

        let outcome = pending.await.unwrap().unwrap();
        assert_eq!(outcome, AppendOutcome::Cancelled);

        // The text that arrived after stop is discarded.
        let snapshot = controller.store().snapshot();
        assert_eq!(snapshot.messages.len(), 1);
        assert_eq!(snapshot.messages[0].role, Role::User);
    }

    /// Transport that reports the stream open, then parks without
    /// delivering any data frames.
    struct OpenStreamTransport {
        release: Notify,
    }

    #[async_trait]
    impl GenerateTransport for OpenStreamTransport {
        async fn generate(
            &self,
            _body: Value,
            _stop_markers: &[String],
            _cancel: CancelToken,
            on_stream: OnStream<'_>,
            _on_token: OnToken<'_>,
        ) -> GenerateOutcome {
            on_stream();
            self.release.notified().await;
            GenerateOutcome::Streamed(StreamEnd::Completed)
        }
    }

    #[tokio::test]
    async fn phase_is_streaming_once_the_stream_opens_even_without_tokens() {
        let controller = Arc::new(SessionController::new(
            OpenStreamTransport {
                release: Notify::new(),
            },
            GenerationSettings::default(),
        ));

        let pending = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move { controller.append("q").await })
        };

        // The phase must reach Streaming while the stream is still open,
        // before any token has been decoded.
        while controller.store().phase() != Phase::Streaming {
            tokio::task::yield_now().await;
        }

        controller.transport.release.notify_one();
        let outcome = pending.await.unwrap().unwrap();
        assert_eq!(outcome, AppendOutcome::Completed);
        assert_eq!(controller.store().phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn stop_during_sending_resets_phase_and_late_tokens_are_dropped() {
        let store = SessionStore::new();
        // Simulate an exchange mid-flight.
        {
            let mut state = store.lock();
            state.phase = Phase::Sending;
            state.pending_response_id = Some("resp-1".to_string());
        }

        store.stop();
        assert_eq!(store.phase(), Phase::Idle);
        assert!(store.snapshot().pending_response_id.is_none());

        // A token arriving after stop must not resurrect the message.
        store.append_streamed("resp-1", "late");
        assert!(store.snapshot().messages.is_empty());
    }

    #[tokio::test]
    async fn clear_resets_everything() {
        let controller = controller(Script::Complete("pong"));
        controller.append("ping").await.unwrap();

        let store = controller.store();
        store.clear();
        let snapshot = store.snapshot();
        assert!(snapshot.messages.is_empty());
        assert_eq!(snapshot.phase, Phase::Idle);
    }
}
