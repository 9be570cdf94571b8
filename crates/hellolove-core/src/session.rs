//! Session controller: routes user input through the command interpreter into
//! the stores and owns the transient UI flags.
//!
//! All mutation happens through this type. Work that outlives a call (the
//! delayed assistant reply, adapter callbacks) only holds a weak reference to
//! the session and observes a cancellation token fired on drop, so anything
//! that fires after teardown is a no-op.

use std::sync::{Arc, Weak};
use std::time::Duration;

use anyhow::Result;
use hellolove_bus::BusPublisher;
use hellolove_schema::{BusMessage, Message, MessageId, Panel, Role, Settings, Task, TaskId};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::conversation::ConversationStore;
use crate::interpreter::{CommandInterpreter, Effect, Interpretation};
use crate::settings::{SettingsError, SettingsPatch, SettingsStore};
use crate::speech::{SpeechEvent, SpeechOutput, SpeechSink, Utterance};
use crate::tasks::TaskStore;
use crate::voice::{VoiceCapture, VoiceEvent, VoiceSink, VOICE_UNSUPPORTED_MESSAGE};

pub const DEFAULT_GREETING_TEMPLATE: &str = "Hello! I'm {name}, how can I help you today?";
pub const DEFAULT_RESPONSE_DELAY: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub initial_settings: Settings,
    /// Pause before the assistant reply is appended
    pub response_delay: Duration,
    /// Fallback reply for plain text; `{name}` is replaced by the assistant name
    pub greeting_template: String,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            initial_settings: Settings::default(),
            response_delay: DEFAULT_RESPONSE_DELAY,
            greeting_template: DEFAULT_GREETING_TEMPLATE.to_string(),
        }
    }
}

pub fn render_greeting(template: &str, assistant_name: &str) -> String {
    template.replace("{name}", assistant_name)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UiState {
    pub listening: bool,
    pub show_settings: bool,
    pub show_tasks: bool,
    /// Static error shown when speech recognition is missing
    pub voice_error: Option<String>,
    pub interim_transcript: String,
    pub speaking: Option<MessageId>,
}

#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub messages: Vec<Message>,
    pub tasks: Vec<Task>,
    pub settings: Settings,
    pub ui: UiState,
}

#[derive(Debug, Default)]
struct SessionState {
    ui: UiState,
    listen_generation: u64,
    speech_seq: u64,
}

/// Pending assistant reply.
#[derive(Debug)]
pub struct ReplyHandle {
    handle: JoinHandle<Option<Message>>,
}

impl ReplyHandle {
    /// Resolves with the appended assistant message, or `None` when the
    /// session was torn down first.
    pub async fn wait(self) -> Option<Message> {
        self.handle.await.ok().flatten()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

#[derive(Debug)]
pub struct Submission {
    pub user_message: Message,
    pub interpretation: Interpretation,
    pub reply: ReplyHandle,
}

struct SessionInner {
    conversation: ConversationStore,
    tasks: TaskStore,
    settings: SettingsStore,
    interpreter: CommandInterpreter,
    state: RwLock<SessionState>,
    publisher: BusPublisher,
    voice: Arc<dyn VoiceCapture>,
    voice_available: bool,
    voice_tx: mpsc::UnboundedSender<VoiceEvent>,
    speech: Arc<dyn SpeechOutput>,
    speech_tx: mpsc::UnboundedSender<SpeechEvent>,
    response_delay: Duration,
    greeting_template: String,
    cancel: CancellationToken,
}

pub struct SessionController {
    inner: Arc<SessionInner>,
}

impl SessionController {
    /// Builds the session and checks voice availability once. Must be called
    /// inside a tokio runtime.
    pub async fn start(
        options: SessionOptions,
        interpreter: CommandInterpreter,
        publisher: BusPublisher,
        voice: Arc<dyn VoiceCapture>,
        speech: Arc<dyn SpeechOutput>,
    ) -> Result<Self> {
        let settings = SettingsStore::new(options.initial_settings, publisher.clone())?;
        let (voice_tx, voice_rx) = mpsc::unbounded_channel();
        let (speech_tx, speech_rx) = mpsc::unbounded_channel();
        let voice_available = voice.is_available();

        let mut state = SessionState::default();
        if !voice_available {
            state.ui.voice_error = Some(VOICE_UNSUPPORTED_MESSAGE.to_string());
        }

        let inner = Arc::new(SessionInner {
            conversation: ConversationStore::new(publisher.clone()),
            tasks: TaskStore::new(publisher.clone()),
            settings,
            interpreter,
            state: RwLock::new(state),
            publisher,
            voice,
            voice_available,
            voice_tx,
            speech,
            speech_tx,
            response_delay: options.response_delay,
            greeting_template: options.greeting_template,
            cancel: CancellationToken::new(),
        });

        if !voice_available {
            tracing::warn!("speech recognition unavailable, voice input disabled");
            inner
                .publish(BusMessage::VoiceUnavailable {
                    reason: VOICE_UNSUPPORTED_MESSAGE.to_string(),
                })
                .await;
        }

        spawn_adapter_pump(Arc::downgrade(&inner), inner.cancel.clone(), voice_rx, speech_rx);
        tracing::info!("session started");
        Ok(Self { inner })
    }

    pub fn conversation(&self) -> &ConversationStore {
        &self.inner.conversation
    }

    pub fn tasks(&self) -> &TaskStore {
        &self.inner.tasks
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.inner.settings
    }

    pub fn interpreter(&self) -> &CommandInterpreter {
        &self.inner.interpreter
    }

    /// Records the user message, applies any command effect and schedules the
    /// assistant reply. Blank input is ignored and returns `None`.
    pub async fn submit_input(&self, raw: &str) -> Option<Submission> {
        self.inner.submit_input(raw).await
    }

    pub async fn ui_state(&self) -> UiState {
        self.inner.state.read().await.ui.clone()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            messages: self.inner.conversation.list().await,
            tasks: self.inner.tasks.list().await,
            settings: self.inner.settings.get().await,
            ui: self.ui_state().await,
        }
    }

    pub async fn toggle_tasks(&self) -> bool {
        self.inner.set_panel(Panel::Tasks, None).await
    }

    pub async fn toggle_settings(&self) -> bool {
        self.inner.set_panel(Panel::Settings, None).await
    }

    pub async fn open_settings(&self) {
        self.inner.set_panel(Panel::Settings, Some(true)).await;
    }

    pub async fn toggle_task(&self, id: &TaskId) -> Option<bool> {
        self.inner.tasks.toggle_completed(id).await
    }

    pub async fn delete_task(&self, id: &TaskId) -> bool {
        self.inner.tasks.delete(id).await
    }

    pub async fn update_settings(&self, patch: SettingsPatch) -> Result<Settings, SettingsError> {
        self.inner.settings.update(patch).await
    }

    pub async fn replace_settings(&self, settings: Settings) -> Result<Settings, SettingsError> {
        self.inner.settings.replace(settings).await
    }

    /// Flips the listening flag and starts or stops capture. Returns the new
    /// value, which stays `false` when voice input is unavailable.
    pub async fn toggle_listening(&self) -> bool {
        self.inner.toggle_listening().await
    }

    /// Applies an adapter event directly. Events normally arrive through the
    /// [`VoiceSink`] handed to the adapter.
    pub async fn handle_voice_event(&self, event: VoiceEvent) {
        self.inner.handle_voice_event(event).await;
    }

    /// Starts speaking the message, or stops it if it is the one currently
    /// being spoken. Returns whether the message is now speaking.
    pub async fn toggle_speech(&self, message_id: &MessageId) -> bool {
        self.inner.toggle_speech(message_id).await
    }

    pub async fn stop_speech(&self) {
        self.inner.stop_speech().await;
    }

    pub async fn handle_speech_event(&self, event: SpeechEvent) {
        self.inner.handle_speech_event(event).await;
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.inner.cancel.cancel();
        self.inner.voice.stop();
        self.inner.speech.cancel();
    }
}

impl SessionInner {
    async fn submit_input(self: &Arc<Self>, raw: &str) -> Option<Submission> {
        let text = raw.trim();
        if text.is_empty() {
            tracing::debug!("blank input ignored");
            return None;
        }

        let interpretation = self.interpreter.interpret(text);
        let user_message = self
            .conversation
            .append(Message::user(text, interpretation.command.clone()))
            .await;

        if let Some(effect) = &interpretation.effect {
            self.apply_effect(effect).await;
        }

        // Greeting name is fixed at submission time.
        let reply_text = match &interpretation.response_text {
            Some(text) => text.clone(),
            None => render_greeting(
                &self.greeting_template,
                &self.settings.assistant_name().await,
            ),
        };

        let reply = self.schedule_reply(reply_text);
        Some(Submission {
            user_message,
            interpretation,
            reply,
        })
    }

    async fn apply_effect(&self, effect: &Effect) {
        match effect {
            Effect::CreateTask { title, priority } => {
                self.tasks.create(title.clone(), *priority).await;
            }
            Effect::OpenSettings => {
                self.set_panel(Panel::Settings, Some(true)).await;
            }
        }
    }

    fn schedule_reply(self: &Arc<Self>, text: String) -> ReplyHandle {
        let weak = Arc::downgrade(self);
        let cancel = self.cancel.clone();
        let delay = self.response_delay;

        let handle = tokio::spawn(async move {
            let fired = tokio::select! {
                _ = cancel.cancelled() => false,
                _ = tokio::time::sleep(delay) => true,
            };
            if !fired {
                tracing::debug!("session closed, pending reply dropped");
                return None;
            }
            let inner = weak.upgrade()?;
            Some(inner.conversation.append(Message::assistant(text)).await)
        });

        ReplyHandle { handle }
    }

    async fn set_panel(&self, panel: Panel, value: Option<bool>) -> bool {
        let visible = {
            let mut state = self.state.write().await;
            let flag = match panel {
                Panel::Tasks => &mut state.ui.show_tasks,
                Panel::Settings => &mut state.ui.show_settings,
            };
            *flag = value.unwrap_or(!*flag);
            *flag
        };
        self.publish(BusMessage::PanelChanged { panel, visible })
            .await;
        visible
    }

    async fn toggle_listening(&self) -> bool {
        let listening = if !self.voice_available {
            let mut state = self.state.write().await;
            state.ui.listening = false;
            tracing::debug!("listening toggle ignored, voice input unavailable");
            false
        } else {
            let mut state = self.state.write().await;
            if state.ui.listening {
                state.ui.listening = false;
                state.ui.interim_transcript.clear();
                self.voice.stop();
                false
            } else {
                state.listen_generation += 1;
                let sink = VoiceSink::new(state.listen_generation, self.voice_tx.clone());
                match self.voice.start(sink) {
                    Ok(()) => {
                        state.ui.listening = true;
                        true
                    }
                    Err(err) => {
                        tracing::warn!("failed to start voice capture: {err}");
                        false
                    }
                }
            }
        };

        self.publish(BusMessage::ListeningChanged { listening })
            .await;
        listening
    }

    fn is_current_generation(state: &SessionState, generation: u64) -> bool {
        state.ui.listening && state.listen_generation == generation
    }

    async fn handle_voice_event(self: &Arc<Self>, event: VoiceEvent) {
        let generation = event.generation();
        let mut state = self.state.write().await;
        if !Self::is_current_generation(&state, generation) {
            tracing::debug!(
                generation,
                current = state.listen_generation,
                "stale voice event discarded"
            );
            return;
        }

        match event {
            VoiceEvent::Interim { text, .. } => {
                state.ui.interim_transcript = text.clone();
                drop(state);
                self.publish(BusMessage::InterimTranscript { text }).await;
            }
            VoiceEvent::Final { text, .. } => {
                state.ui.interim_transcript.clear();
                drop(state);
                self.publish(BusMessage::InterimTranscript {
                    text: String::new(),
                })
                .await;
                // Listening may have been stopped while the event was published.
                if !Self::is_current_generation(&*self.state.read().await, generation) {
                    tracing::debug!(generation, "final transcript dropped, listening stopped");
                    return;
                }
                self.submit_input(&text).await;
            }
            VoiceEvent::Ended { .. } => {
                let sink = VoiceSink::new(generation, self.voice_tx.clone());
                if let Err(err) = self.voice.start(sink) {
                    tracing::warn!("failed to restart voice capture: {err}");
                    state.ui.listening = false;
                    state.ui.interim_transcript.clear();
                    drop(state);
                    self.publish(BusMessage::ListeningChanged { listening: false })
                        .await;
                }
            }
        }
    }

    async fn toggle_speech(&self, message_id: &MessageId) -> bool {
        let Some(message) = self.conversation.get(message_id).await else {
            tracing::debug!(%message_id, "speak ignored, message not found");
            return false;
        };
        if message.role != Role::Assistant {
            tracing::debug!(%message_id, "speak ignored, not an assistant message");
            return false;
        }

        let mut state = self.state.write().await;
        self.speech.cancel();

        if state.ui.speaking.as_ref() == Some(message_id) {
            state.ui.speaking = None;
            drop(state);
            self.publish(BusMessage::SpeakingChanged { message_id: None })
                .await;
            return false;
        }

        state.speech_seq += 1;
        let sink = SpeechSink::new(message_id.clone(), state.speech_seq, self.speech_tx.clone());
        let utterance = Utterance {
            message_id: message_id.clone(),
            text: message.text,
        };
        let speaking = match self.speech.speak(utterance, sink) {
            Ok(()) => {
                state.ui.speaking = Some(message_id.clone());
                true
            }
            Err(err) => {
                tracing::warn!("failed to start speech output: {err}");
                state.ui.speaking = None;
                false
            }
        };
        let current = state.ui.speaking.clone();
        drop(state);

        self.publish(BusMessage::SpeakingChanged {
            message_id: current,
        })
        .await;
        speaking
    }

    async fn stop_speech(&self) {
        self.speech.cancel();
        let cleared = self.state.write().await.ui.speaking.take();
        if cleared.is_some() {
            self.publish(BusMessage::SpeakingChanged { message_id: None })
                .await;
        }
    }

    async fn handle_speech_event(&self, event: SpeechEvent) {
        let SpeechEvent::Finished { message_id, seq } = event;
        {
            let mut state = self.state.write().await;
            let current = state.ui.speaking.as_ref() == Some(&message_id) && state.speech_seq == seq;
            if !current {
                tracing::debug!(%message_id, seq, "stale speech completion ignored");
                return;
            }
            state.ui.speaking = None;
        }
        self.publish(BusMessage::SpeakingChanged { message_id: None })
            .await;
    }

    async fn publish(&self, msg: BusMessage) {
        if let Err(err) = self.publisher.publish(msg).await {
            tracing::warn!("failed to publish session event: {err}");
        }
    }
}

fn spawn_adapter_pump(
    weak: Weak<SessionInner>,
    cancel: CancellationToken,
    mut voice_rx: mpsc::UnboundedReceiver<VoiceEvent>,
    mut speech_rx: mpsc::UnboundedReceiver<SpeechEvent>,
) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                Some(event) = voice_rx.recv() => {
                    let Some(inner) = weak.upgrade() else { break };
                    inner.handle_voice_event(event).await;
                }
                Some(event) = speech_rx.recv() => {
                    let Some(inner) = weak.upgrade() else { break };
                    inner.handle_speech_event(event).await;
                }
                else => break,
            }
        }
        tracing::debug!("adapter pump stopped");
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speech::SilentSpeechOutput;
    use crate::voice::UnavailableVoiceCapture;
    use hellolove_bus::EventBus;
    use hellolove_schema::Role;

    async fn controller(delay_ms: u64) -> SessionController {
        SessionController::start(
            SessionOptions {
                response_delay: Duration::from_millis(delay_ms),
                ..SessionOptions::default()
            },
            CommandInterpreter::with_builtins(),
            EventBus::new(64).publisher(),
            Arc::new(UnavailableVoiceCapture),
            Arc::new(SilentSpeechOutput),
        )
        .await
        .unwrap()
    }

    #[test]
    fn greeting_interpolates_name() {
        assert_eq!(
            render_greeting(DEFAULT_GREETING_TEMPLATE, "Love"),
            "Hello! I'm Love, how can I help you today?"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn blank_input_records_nothing() {
        let session = controller(1000).await;
        assert!(session.submit_input("   ").await.is_none());
        assert!(session.submit_input("").await.is_none());
        assert_eq!(session.conversation().len().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn user_message_is_immediate_and_reply_is_delayed() {
        let session = controller(1000).await;
        let submission = session.submit_input("  hi there ").await.unwrap();

        assert_eq!(submission.user_message.text, "hi there");
        assert_eq!(submission.user_message.role, Role::User);
        assert_eq!(session.conversation().len().await, 1);
        assert!(!submission.reply.is_finished());

        let reply = submission.reply.wait().await.unwrap();
        assert_eq!(reply.role, Role::Assistant);
        assert_eq!(reply.text, "Hello! I'm Love, how can I help you today?");
        assert_eq!(session.conversation().len().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn settings_command_opens_panel_idempotently() {
        let session = controller(10).await;
        session.open_settings().await;
        let submission = session.submit_input("/settings").await.unwrap();

        assert!(session.ui_state().await.show_settings);
        assert_eq!(submission.user_message.command.as_deref(), Some("settings"));
        let reply = submission.reply.wait().await.unwrap();
        assert_eq!(reply.text, "Opening settings...");
    }

    #[tokio::test(start_paused = true)]
    async fn panels_toggle() {
        let session = controller(10).await;
        assert!(session.toggle_tasks().await);
        assert!(!session.toggle_tasks().await);
        assert!(session.toggle_settings().await);
        let ui = session.ui_state().await;
        assert!(!ui.show_tasks);
        assert!(ui.show_settings);
    }

    #[tokio::test(start_paused = true)]
    async fn unavailable_voice_forces_listening_off() {
        let session = controller(10).await;
        let ui = session.ui_state().await;
        assert_eq!(ui.voice_error.as_deref(), Some(VOICE_UNSUPPORTED_MESSAGE));

        assert!(!session.toggle_listening().await);
        assert!(!session.toggle_listening().await);
        assert!(!session.ui_state().await.listening);
    }

    #[tokio::test(start_paused = true)]
    async fn only_assistant_messages_are_spoken() {
        let session = controller(10).await;
        let submission = session.submit_input("read this back").await.unwrap();

        assert!(!session.toggle_speech(&submission.user_message.id).await);
        assert_eq!(session.ui_state().await.speaking, None);

        let reply = submission.reply.wait().await.unwrap();
        assert!(session.toggle_speech(&reply.id).await);
    }

    #[tokio::test(start_paused = true)]
    async fn reply_after_teardown_is_noop() {
        let session = controller(1000).await;
        let submission = session.submit_input("hello").await.unwrap();
        drop(session);

        assert!(submission.reply.wait().await.is_none());
    }
}
