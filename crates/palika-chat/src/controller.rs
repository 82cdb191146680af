//! Chat session controller: the per-conversation state machine.
//!
//! Sequences user input -> bot call -> best-effort synthesis -> optional
//! autoplay, keeps the visible message list, and reconciles it with the
//! history store through the debounced saver. Exactly one exchange may be
//! in flight; sends are strictly sequential.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use palika_auth::CredentialStore;
use palika_bot::{BotClient, BotError};
use palika_core::config::{AuthFailurePolicy, PalikaConfig};
use palika_core::i18n::Translations;
use palika_core::types::{Chat, Language, Message};
use palika_history::{generate_chat_preview, generate_chat_title, HistoryStore};
use palika_speech::{AudioHandle, AudioSink, SpeechError, SpeechProvider, SpeechSessionManager};

use crate::error::ChatError;
use crate::events::{ChatEvent, NoticeSeverity};
use crate::saver::{DebouncedSaver, SaveRequest, SaveSink};

/// Identity of the conversation currently on screen, once it has been
/// assigned a persistent id.
struct CurrentChat {
    id: String,
    created_at: DateTime<Utc>,
}

/// Driver of one visible conversation.
pub struct ChatController<P, S> {
    bot: BotClient,
    speech: Arc<SpeechSessionManager<P, S>>,
    history: Arc<HistoryStore>,
    credentials: Arc<CredentialStore>,
    saver: DebouncedSaver,
    events: mpsc::UnboundedSender<ChatEvent>,

    language: Mutex<Language>,
    messages: Mutex<Vec<Message>>,
    current_chat: Mutex<Option<CurrentChat>>,
    speaking_message: Mutex<Option<String>>,
    last_keystroke: Mutex<Option<tokio::time::Instant>>,

    exchange_in_flight: AtomicBool,
    typing: AtomicBool,
    listening: AtomicBool,

    policy: AuthFailurePolicy,
    autoplay_delay: Duration,
    typing_quiet: Duration,
}

impl<P, S> ChatController<P, S>
where
    P: SpeechProvider + 'static,
    S: AudioSink + 'static,
{
    /// Wire up a controller and the event stream a view renders from.
    pub fn new(
        config: &PalikaConfig,
        bot: BotClient,
        speech: Arc<SpeechSessionManager<P, S>>,
        history: Arc<HistoryStore>,
        credentials: Arc<CredentialStore>,
        language: Language,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<ChatEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();

        let store = history.clone();
        let sink: SaveSink = Arc::new(move |request: SaveRequest| {
            if let Err(e) = store.save_chat(&request.user_id, &request.chat) {
                warn!("Failed to persist chat {}: {}", request.chat.id, e);
            }
        });
        let saver = DebouncedSaver::new(
            Duration::from_millis(config.chat.save_debounce_ms),
            sink,
        );

        let controller = Arc::new(Self {
            bot,
            speech,
            history,
            credentials,
            saver,
            events,
            language: Mutex::new(language),
            messages: Mutex::new(Vec::new()),
            current_chat: Mutex::new(None),
            speaking_message: Mutex::new(None),
            last_keystroke: Mutex::new(None),
            exchange_in_flight: AtomicBool::new(false),
            typing: AtomicBool::new(false),
            listening: AtomicBool::new(false),
            policy: config.bot.auth_failure_policy,
            autoplay_delay: Duration::from_millis(config.speech.autoplay_delay_ms),
            typing_quiet: Duration::from_millis(config.chat.typing_quiet_ms),
        });

        (controller, receiver)
    }

    // =========================================================================
    // Sending
    // =========================================================================

    /// Send one text query through the full exchange.
    ///
    /// Only one exchange may run at a time; a second call while one is
    /// pending fails with `ExchangeInFlight`.
    pub async fn send_message(
        self: &Arc<Self>,
        text: &str,
        is_voice_input: bool,
    ) -> Result<(), ChatError> {
        if self.exchange_in_flight.swap(true, Ordering::SeqCst) {
            return Err(ChatError::ExchangeInFlight);
        }
        let result = self.run_exchange(text, is_voice_input).await;
        self.exchange_in_flight.store(false, Ordering::SeqCst);
        result
    }

    async fn run_exchange(
        self: &Arc<Self>,
        text: &str,
        is_voice_input: bool,
    ) -> Result<(), ChatError> {
        let language = self.language();
        let t = Translations::get(language);

        // Sending always silences whatever is playing.
        self.speech.stop_current_audio();
        self.clear_speaking();

        self.append_message(Message::user(text, is_voice_input));
        self.set_typing(true);

        let token = self.credentials.access_token();
        match self.bot.send_query(text, token.as_deref()).await {
            Ok(answer) => {
                let mut reply = Message::bot(&answer);

                // Best effort: a failed synthesis never blocks the text.
                let audio = match self.speech.synthesize_to_audio(&answer, language).await {
                    Ok(handle) => {
                        reply.audio_id = Some(handle.id.to_string());
                        Some(handle)
                    }
                    Err(e) => {
                        debug!("Synthesis skipped: {}", e);
                        None
                    }
                };

                let reply_id = reply.id.clone();
                self.append_message(reply);
                self.set_typing(false);

                // Responses to voice input play automatically, after a short
                // delay to let the view settle.
                if is_voice_input {
                    if let Some(handle) = audio {
                        self.spawn_autoplay(reply_id, handle);
                    }
                }
                Ok(())
            }
            Err(BotError::AuthenticationFailed) => {
                self.append_message(Message::error_reply(t.bot_error_reply));
                self.set_typing(false);

                match self.policy {
                    AuthFailurePolicy::ForceLogout => {
                        if let Err(e) = self.credentials.clear() {
                            warn!("Failed to clear credentials: {}", e);
                        }
                        self.emit(ChatEvent::SessionExpired);
                        self.notice(
                            NoticeSeverity::Error,
                            t.session_expired_title,
                            t.session_expired_body,
                        );
                        Ok(())
                    }
                    AuthFailurePolicy::GuestTolerant => {
                        self.notice(
                            NoticeSeverity::Warning,
                            t.error_title,
                            &BotError::AuthenticationFailed.to_string(),
                        );
                        Ok(())
                    }
                    AuthFailurePolicy::Fatal => {
                        self.notice(
                            NoticeSeverity::Error,
                            t.error_title,
                            &BotError::AuthenticationFailed.to_string(),
                        );
                        Err(ChatError::Bot(BotError::AuthenticationFailed))
                    }
                }
            }
            Err(e) => {
                self.append_message(Message::error_reply(t.bot_error_reply));
                self.set_typing(false);
                self.notice(NoticeSeverity::Error, t.error_title, &e.to_string());
                Ok(())
            }
        }
    }

    fn spawn_autoplay(self: &Arc<Self>, message_id: String, handle: AudioHandle) {
        let controller = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(controller.autoplay_delay).await;
            controller.play_for_message(&message_id, &handle).await;
        });
    }

    // =========================================================================
    // Voice input
    // =========================================================================

    /// Toggle voice input.
    ///
    /// When already listening, the open recognition session is cancelled.
    /// Otherwise audio is stopped, one recognition session runs, and any
    /// recognized text is sent as a voice message.
    pub async fn voice_input(self: &Arc<Self>) -> Result<(), ChatError> {
        if self.listening.load(Ordering::SeqCst) {
            self.speech.stop_recognizing();
            self.listening.store(false, Ordering::SeqCst);
            self.emit(ChatEvent::ListeningChanged { listening: false });
            return Ok(());
        }

        self.speech.stop_current_audio();
        self.clear_speaking();

        self.listening.store(true, Ordering::SeqCst);
        self.emit(ChatEvent::ListeningChanged { listening: true });

        let language = self.language();
        let t = Translations::get(language);
        self.notice(NoticeSeverity::Info, t.listening_title, t.listening_body);

        let result = self.speech.recognize_speech(language).await;

        self.listening.store(false, Ordering::SeqCst);
        self.emit(ChatEvent::ListeningChanged { listening: false });

        match result {
            Ok(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    return Ok(());
                }
                self.send_message(trimmed, true).await
            }
            // A stopped session produced nothing to send.
            Err(SpeechError::Cancelled) => Ok(()),
            Err(e) => {
                self.notice(NoticeSeverity::Error, t.recognition_failed, &e.to_string());
                Ok(())
            }
        }
    }

    // =========================================================================
    // Replay
    // =========================================================================

    /// Play (or stop) the audio for one bot message.
    ///
    /// Invoked on the message currently playing, it stops that playback.
    /// A message without cached audio is synthesized first and has its
    /// `audio_id` attached.
    pub async fn speak_message(self: &Arc<Self>, message_id: &str) -> Result<(), ChatError> {
        let already_speaking = {
            let speaking = self
                .speaking_message
                .lock()
                .expect("speaking slot poisoned");
            speaking.as_deref() == Some(message_id)
        };
        if already_speaking {
            self.speech.stop_current_audio();
            self.clear_speaking();
            return Ok(());
        }

        let Some(message) = self
            .messages
            .lock()
            .expect("message list poisoned")
            .iter()
            .find(|m| m.id == message_id)
            .cloned()
        else {
            return Err(ChatError::MessageNotFound(message_id.to_string()));
        };
        if message.is_user {
            return Ok(());
        }

        self.speech.stop_current_audio();
        self.clear_speaking();

        let language = self.language();
        match self.speech.synthesize_to_audio(&message.text, language).await {
            Ok(handle) => {
                if message.audio_id.is_none() {
                    self.attach_audio(message_id, &handle);
                }
                self.play_for_message(message_id, &handle).await;
                Ok(())
            }
            Err(e) => {
                let t = Translations::get(language);
                self.notice(NoticeSeverity::Error, t.playback_failed, &e.to_string());
                Ok(())
            }
        }
    }

    async fn play_for_message(&self, message_id: &str, handle: &AudioHandle) {
        *self
            .speaking_message
            .lock()
            .expect("speaking slot poisoned") = Some(message_id.to_string());
        self.emit(ChatEvent::PlaybackStarted {
            message_id: message_id.to_string(),
        });

        let result = self.speech.play_audio(handle, true).await;

        {
            let mut speaking = self
                .speaking_message
                .lock()
                .expect("speaking slot poisoned");
            if speaking.as_deref() == Some(message_id) {
                *speaking = None;
            }
        }
        self.emit(ChatEvent::PlaybackStopped {
            message_id: message_id.to_string(),
        });

        if let Err(e) = result {
            let t = Translations::get(self.language());
            self.notice(NoticeSeverity::Error, t.playback_failed, &e.to_string());
        }
    }

    fn attach_audio(&self, message_id: &str, handle: &AudioHandle) {
        let updated = {
            let mut messages = self.messages.lock().expect("message list poisoned");
            messages.iter_mut().find(|m| m.id == message_id).map(|m| {
                m.audio_id = Some(handle.id.to_string());
                m.clone()
            })
        };
        if let Some(message) = updated {
            self.emit(ChatEvent::MessageUpdated { message });
            self.schedule_save();
        }
    }

    // =========================================================================
    // Typing detection
    // =========================================================================

    /// Record one keystroke in the input box.
    ///
    /// The first keystroke of a burst stops any playing audio. The
    /// user-typing flag decays `typing_quiet` after the last keystroke and
    /// affects nothing but itself.
    pub fn notify_typing(&self) {
        let now = tokio::time::Instant::now();
        let was_typing = {
            let mut last = self.last_keystroke.lock().expect("keystroke slot poisoned");
            let was = last
                .map(|at| now.duration_since(at) < self.typing_quiet)
                .unwrap_or(false);
            *last = Some(now);
            was
        };

        if !was_typing && self.speech.is_playing() {
            self.speech.stop_current_audio();
            self.clear_speaking();
        }
    }

    /// Whether a keystroke landed within the last quiet period.
    pub fn is_user_typing(&self) -> bool {
        self.last_keystroke
            .lock()
            .expect("keystroke slot poisoned")
            .map(|at| at.elapsed() < self.typing_quiet)
            .unwrap_or(false)
    }

    // =========================================================================
    // Chat management
    // =========================================================================

    /// Reset the visible conversation without touching history.
    pub fn new_chat(&self) {
        self.speech.stop_current_audio();
        self.clear_speaking();
        self.messages.lock().expect("message list poisoned").clear();
        *self.current_chat.lock().expect("current chat poisoned") = None;
        self.emit(ChatEvent::ChatCleared);
    }

    /// Load a saved chat; later sends update the same record.
    pub fn select_chat(&self, chat_id: &str) -> Result<(), ChatError> {
        let user = self.credentials.user().ok_or(ChatError::NotAuthenticated)?;
        let chat = self
            .history
            .get_chat_by_id(&user.user_id, chat_id)
            .ok_or_else(|| ChatError::ChatNotFound(chat_id.to_string()))?;

        self.speech.stop_current_audio();
        self.clear_speaking();

        *self.messages.lock().expect("message list poisoned") = chat.messages.clone();
        *self.current_chat.lock().expect("current chat poisoned") = Some(CurrentChat {
            id: chat.id.clone(),
            created_at: chat.created_at,
        });
        self.emit(ChatEvent::ChatLoaded { chat_id: chat.id });
        Ok(())
    }

    /// Delete a saved chat; deleting the visible one resets the view.
    pub fn delete_chat(&self, chat_id: &str) -> Result<(), ChatError> {
        let user = self.credentials.user().ok_or(ChatError::NotAuthenticated)?;
        self.history
            .delete_chat(&user.user_id, chat_id)
            .map_err(|e| ChatError::History(e.to_string()))?;

        let is_current = self
            .current_chat
            .lock()
            .expect("current chat poisoned")
            .as_ref()
            .is_some_and(|c| c.id == chat_id);
        if is_current {
            self.new_chat();
        }
        Ok(())
    }

    /// Remove the user's entire history and reset the view.
    pub fn clear_history(&self) -> Result<(), ChatError> {
        let user = self.credentials.user().ok_or(ChatError::NotAuthenticated)?;
        self.history
            .clear_history(&user.user_id)
            .map_err(|e| ChatError::History(e.to_string()))?;
        self.new_chat();
        Ok(())
    }

    /// Saved chats of the signed-in user, newest first.
    pub fn list_chats(&self) -> Vec<Chat> {
        self.credentials
            .user()
            .map(|user| self.history.get_history(&user.user_id))
            .unwrap_or_default()
    }

    // =========================================================================
    // State accessors
    // =========================================================================

    pub fn messages(&self) -> Vec<Message> {
        self.messages.lock().expect("message list poisoned").clone()
    }

    pub fn is_typing(&self) -> bool {
        self.typing.load(Ordering::SeqCst)
    }

    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    pub fn language(&self) -> Language {
        *self.language.lock().expect("language slot poisoned")
    }

    pub fn set_language(&self, language: Language) {
        *self.language.lock().expect("language slot poisoned") = language;
    }

    /// Force any pending debounced save to disk.
    pub async fn flush_saves(&self) {
        self.saver.flush().await;
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn emit(&self, event: ChatEvent) {
        let _ = self.events.send(event);
    }

    fn notice(&self, severity: NoticeSeverity, title: &str, body: &str) {
        self.emit(ChatEvent::Notice {
            severity,
            title: title.to_string(),
            body: body.to_string(),
        });
    }

    fn set_typing(&self, typing: bool) {
        self.typing.store(typing, Ordering::SeqCst);
        self.emit(ChatEvent::TypingChanged { typing });
    }

    fn clear_speaking(&self) {
        if let Some(message_id) = self
            .speaking_message
            .lock()
            .expect("speaking slot poisoned")
            .take()
        {
            self.emit(ChatEvent::PlaybackStopped { message_id });
        }
    }

    fn append_message(&self, message: Message) {
        self.messages
            .lock()
            .expect("message list poisoned")
            .push(message.clone());
        self.emit(ChatEvent::MessageAppended { message });
        self.schedule_save();
    }

    /// Queue a debounced save of the whole conversation, for authenticated
    /// users only. The chat id is generated on the first save of a new
    /// conversation and reused afterwards.
    fn schedule_save(&self) {
        if !self.credentials.is_authenticated() {
            return;
        }
        let Some(user) = self.credentials.user() else {
            return;
        };

        let messages = self.messages.lock().expect("message list poisoned").clone();
        if messages.is_empty() {
            return;
        }

        let (chat_id, created_at) = {
            let mut current = self.current_chat.lock().expect("current chat poisoned");
            match current.as_ref() {
                Some(chat) => (chat.id.clone(), chat.created_at),
                None => {
                    let chat = CurrentChat {
                        id: Uuid::new_v4().to_string(),
                        created_at: Utc::now(),
                    };
                    let pair = (chat.id.clone(), chat.created_at);
                    *current = Some(chat);
                    pair
                }
            }
        };

        let language = self.language();
        let first_user_text = messages
            .iter()
            .find(|m| m.is_user)
            .map(|m| m.text.clone())
            .unwrap_or_default();

        let chat = Chat {
            id: chat_id,
            title: generate_chat_title(&first_user_text, language),
            preview: generate_chat_preview(&messages),
            messages,
            created_at,
            updated_at: Utc::now(),
        };

        self.saver.schedule(user.user_id, chat);
    }
}
