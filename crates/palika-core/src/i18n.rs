//! Localized interface strings for English and Nepali.

use crate::types::Language;

/// The full set of user-visible strings for one language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Translations {
    pub title: &'static str,
    pub subtitle: &'static str,
    pub placeholder: &'static str,
    pub send_button: &'static str,
    pub voice_button: &'static str,
    pub clear_chat: &'static str,
    /// Placeholder title for a chat whose first message is empty.
    pub new_chat: &'static str,
    /// Bot-side reply appended when the bot call fails.
    pub bot_error_reply: &'static str,
    pub error_title: &'static str,
    pub session_expired_title: &'static str,
    pub session_expired_body: &'static str,
    pub login_required_title: &'static str,
    pub login_required_body: &'static str,
    pub listening_title: &'static str,
    pub listening_body: &'static str,
    pub recognition_failed: &'static str,
    pub playback_failed: &'static str,
}

const EN: Translations = Translations {
    title: "Palika Agent",
    subtitle: "Your AI-powered municipal assistant",
    placeholder: "Type your message here...",
    send_button: "Send",
    voice_button: "Voice Input",
    clear_chat: "Clear Chat",
    new_chat: "New Chat",
    bot_error_reply: "Sorry, I couldn't process your request. Please try again.",
    error_title: "Error",
    session_expired_title: "Session Expired",
    session_expired_body: "Please login again to continue",
    login_required_title: "Login Required",
    login_required_body: "Please sign in to send messages",
    listening_title: "Listening...",
    listening_body: "Please speak now...",
    recognition_failed: "Voice recognition failed",
    playback_failed: "Voice playback failed",
};

const NE: Translations = Translations {
    title: "पालिका एजेन्ट",
    subtitle: "तपाईंको AI-संचालित नगरपालिका सहायक",
    placeholder: "यहाँ आफ्नो सन्देश टाइप गर्नुहोस्...",
    send_button: "पठाउनुहोस्",
    voice_button: "आवाज इनपुट",
    clear_chat: "च्याट सफा गर्नुहोस्",
    new_chat: "नयाँ कुराकानी",
    bot_error_reply: "माफ गर्नुहोस्, म अहिले जवाफ दिन सक्दिन। कृपया फेरि प्रयास गर्नुहोस्।",
    error_title: "त्रुटि",
    session_expired_title: "सत्र समाप्त भयो",
    session_expired_body: "कृपया फेरि लग इन गर्नुहोस्",
    login_required_title: "लग इन आवश्यक छ",
    login_required_body: "कृपया सन्देश पठाउन लग इन गर्नुहोस्",
    listening_title: "सुन्दै...",
    listening_body: "कृपया बोल्नुहोस्...",
    recognition_failed: "आवाज पहिचान असफल भयो",
    playback_failed: "आवाज प्लेब्याक असफल भयो",
};

impl Translations {
    /// Look up the string table for a language.
    pub fn get(language: Language) -> &'static Translations {
        match language {
            Language::English => &EN,
            Language::Nepali => &NE,
        }
    }
}
