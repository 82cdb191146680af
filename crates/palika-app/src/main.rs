//! Palika application binary - composition root.
//!
//! Ties the workspace crates together into a terminal front-end:
//! 1. Load configuration from TOML
//! 2. Initialize stores (credentials, chat history)
//! 3. Build the bot client and the speech session manager
//! 4. Drive the chat controller from a line-oriented input loop while a
//!    background task renders controller events.

use std::io::Write as _;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::info;

use palika_auth::{AuthClient, CredentialStore, LoginCredentials};
use palika_bot::BotClient;
use palika_chat::{ChatController, ChatEvent, NoticeSeverity};
use palika_core::config::PalikaConfig;
use palika_core::error::Result;
use palika_core::i18n::Translations;
use palika_core::types::Language;
use palika_history::HistoryStore;
use palika_speech::{
    AudioCapture, AzureSpeechProvider, MockSpeechProvider, NullAudioCapture, SpeechError,
    SpeechProvider, SpeechSessionManager, SynthesizedAudio, TimedAudioSink, WavFileCapture,
};

mod cli;

/// Recognition input source selected by configuration.
enum AppCapture {
    Wav(WavFileCapture),
    Null(NullAudioCapture),
}

impl AudioCapture for AppCapture {
    async fn record(&self) -> std::result::Result<Vec<u8>, SpeechError> {
        match self {
            AppCapture::Wav(capture) => capture.record().await,
            AppCapture::Null(capture) => capture.record().await,
        }
    }
}

/// Speech provider selected by configuration: the real service when a
/// subscription key is present, the mock otherwise.
enum AppSpeechProvider {
    Azure(AzureSpeechProvider<AppCapture>),
    Mock(MockSpeechProvider),
}

impl SpeechProvider for AppSpeechProvider {
    async fn synthesize(
        &self,
        text: &str,
        language: Language,
    ) -> std::result::Result<SynthesizedAudio, SpeechError> {
        match self {
            AppSpeechProvider::Azure(provider) => provider.synthesize(text, language).await,
            AppSpeechProvider::Mock(provider) => provider.synthesize(text, language).await,
        }
    }

    async fn recognize(
        &self,
        language: Language,
    ) -> std::result::Result<String, SpeechError> {
        match self {
            AppSpeechProvider::Azure(provider) => provider.recognize(language).await,
            AppSpeechProvider::Mock(provider) => provider.recognize(language).await,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::CliArgs::parse();
    let config = PalikaConfig::load_or_default(&args.resolve_config_path());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(args.resolve_log_level(&config.general.log_level))
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let data_dir = args.resolve_data_dir(&config.general.data_dir);
    let language = args.resolve_language();

    let credentials = Arc::new(CredentialStore::new(
        &data_dir,
        config.auth.access_token_ttl_days,
        config.auth.refresh_token_ttl_days,
    ));
    let auth = AuthClient::new(&config.auth, credentials.clone())?;
    let history = Arc::new(HistoryStore::new(&data_dir, config.chat.max_chats));
    let bot = BotClient::new(&config.bot)?;

    let capture = match &config.speech.capture_wav {
        Some(path) => AppCapture::Wav(WavFileCapture::new(path)),
        None => AppCapture::Null(NullAudioCapture),
    };
    let provider = if config.speech.subscription_key.is_empty() {
        info!("No speech subscription key configured; using the mock speech provider");
        AppSpeechProvider::Mock(MockSpeechProvider::new())
    } else {
        AppSpeechProvider::Azure(AzureSpeechProvider::new(&config.speech, capture))
    };
    let speech = Arc::new(SpeechSessionManager::new(provider, TimedAudioSink::new()));

    let (controller, events) = ChatController::new(
        &config,
        bot,
        speech.clone(),
        history,
        credentials.clone(),
        language,
    );

    tokio::spawn(render_events(events));

    // Restore an expired session from the refresh token where possible.
    if credentials.access_token().is_none() && credentials.refresh_token().is_some() {
        if auth.refresh_access_token().await.is_some() {
            info!("Session restored from refresh token");
        }
    }

    let t = Translations::get(language);
    println!("{} — {}", t.title, t.subtitle);
    if let Some(user) = credentials.user() {
        println!("signed in as {}", user.email_address);
    }
    println!("type a message, or /help for commands");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        let _ = std::io::stdout().flush();
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix('/') {
            let mut parts = rest.split_whitespace();
            match parts.next().unwrap_or("") {
                "quit" | "exit" => break,
                "help" => print_help(),
                "login" => {
                    let (Some(email), Some(password)) = (parts.next(), parts.next()) else {
                        println!("usage: /login <email> <password>");
                        continue;
                    };
                    match auth
                        .login(&LoginCredentials {
                            email_address: email.to_string(),
                            password: password.to_string(),
                        })
                        .await
                    {
                        Ok(user) => println!("signed in as {} {}", user.name, user.surname),
                        Err(e) => println!("login failed: {}", e),
                    }
                }
                "logout" => {
                    auth.logout();
                    println!("signed out");
                }
                "voice" => {
                    if let Err(e) = controller.voice_input().await {
                        println!("voice input failed: {}", e);
                    }
                }
                "stop" => speech.stop_current_audio(),
                "replay" => {
                    let id = parts.next().map(str::to_string).or_else(|| {
                        controller
                            .messages()
                            .iter()
                            .rev()
                            .find(|m| !m.is_user)
                            .map(|m| m.id.clone())
                    });
                    match id {
                        Some(id) => {
                            if let Err(e) = controller.speak_message(&id).await {
                                println!("replay failed: {}", e);
                            }
                        }
                        None => println!("nothing to replay"),
                    }
                }
                "new" => controller.new_chat(),
                "chats" => {
                    let chats = controller.list_chats();
                    if chats.is_empty() {
                        println!("no saved chats");
                    }
                    for chat in chats {
                        println!("{}  {}  ({})", chat.id, chat.title, chat.preview);
                    }
                }
                "open" => match parts.next() {
                    Some(id) => {
                        if let Err(e) = controller.select_chat(id) {
                            println!("open failed: {}", e);
                        }
                    }
                    None => println!("usage: /open <chat-id>"),
                },
                "delete" => match parts.next() {
                    Some(id) => {
                        if let Err(e) = controller.delete_chat(id) {
                            println!("delete failed: {}", e);
                        }
                    }
                    None => println!("usage: /delete <chat-id>"),
                },
                "clear-history" => {
                    if let Err(e) = controller.clear_history() {
                        println!("clear failed: {}", e);
                    }
                }
                "lang" => match parts.next().and_then(|l| l.parse().ok()) {
                    Some(lang) => controller.set_language(lang),
                    None => println!("usage: /lang <en|ne>"),
                },
                other => println!("unknown command: /{}", other),
            }
        } else if let Err(e) = controller.send_message(&line, false).await {
            println!("send failed: {}", e);
        }
    }

    controller.flush_saves().await;
    Ok(())
}

fn print_help() {
    println!("  /login <email> <password>   sign in");
    println!("  /logout                     sign out");
    println!("  /voice                      toggle voice input");
    println!("  /replay [message-id]        play a bot reply");
    println!("  /stop                       stop playing audio");
    println!("  /new                        start a new chat");
    println!("  /chats                      list saved chats");
    println!("  /open <chat-id>             load a saved chat");
    println!("  /delete <chat-id>           delete a saved chat");
    println!("  /clear-history              delete all saved chats");
    println!("  /lang <en|ne>               switch language");
    println!("  /quit                       exit");
}

/// Render controller events to the terminal.
async fn render_events(mut events: UnboundedReceiver<ChatEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            ChatEvent::MessageAppended { message } => {
                let speaker = if message.is_user { "you" } else { "bot" };
                println!("{}> {}", speaker, message.text);
            }
            ChatEvent::TypingChanged { typing } if typing => println!("..."),
            ChatEvent::ListeningChanged { listening } if listening => println!("(listening)"),
            ChatEvent::PlaybackStarted { .. } => println!("(playing audio)"),
            ChatEvent::Notice {
                severity,
                title,
                body,
            } => {
                let tag = match severity {
                    NoticeSeverity::Info => "info",
                    NoticeSeverity::Warning => "warn",
                    NoticeSeverity::Error => "error",
                };
                println!("[{}] {}: {}", tag, title, body);
            }
            ChatEvent::ChatLoaded { chat_id } => println!("(loaded chat {})", chat_id),
            ChatEvent::ChatCleared => println!("(new chat)"),
            _ => {}
        }
    }
}
