//! Out-of-flow commands.
//!
//! Telegram users send slash commands; WhatsApp users type keywords. Both
//! parse into the same [`Command`]. Keywords are plain words, so the caller
//! only tries them outside the registration questions.

/// An out-of-flow command; never moves the conversation cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Restart registration (Telegram `/start`).
    Start,
    Info,
    Help,
    Faq(String),
    RemindersOn,
    RemindersOff,
    Feedback(String),
    DeleteMe,
}

/// Split off the first word; the remainder is trimmed.
fn head_and_rest(text: &str) -> (&str, &str) {
    text.split_once(char::is_whitespace)
        .map(|(h, r)| (h, r.trim()))
        .unwrap_or((text, ""))
}

impl Command {
    /// Parse a `/command`. Returns `None` for anything else.
    pub fn parse_slash(text: &str) -> Option<Self> {
        let (head, rest) = head_and_rest(text.trim());
        let name = head.strip_prefix('/')?;

        // Group chats address commands as `/cmd@BotName`.
        let name = name.split('@').next().unwrap_or(name).to_lowercase();
        match name.as_str() {
            "start" => Some(Self::Start),
            "info" => Some(Self::Info),
            "help" => Some(Self::Help),
            "faq" => Some(Self::Faq(rest.to_string())),
            "remind_on" => Some(Self::RemindersOn),
            "remind_off" => Some(Self::RemindersOff),
            "feedback" => Some(Self::Feedback(rest.to_string())),
            "delete_me" => Some(Self::DeleteMe),
            _ => None,
        }
    }

    /// Parse a WhatsApp keyword such as "инфо" or "отзыв <текст>".
    pub fn parse_keyword(text: &str) -> Option<Self> {
        let text = text.trim();
        let (head, rest) = head_and_rest(text);

        match head.to_lowercase().as_str() {
            "отзыв" | "feedback" => return Some(Self::Feedback(rest.to_string())),
            "faq" => return Some(Self::Faq(rest.to_string())),
            _ => {}
        }

        let normalized = text
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        match normalized.as_str() {
            "инфо" | "info" => Some(Self::Info),
            "help" => Some(Self::Help),
            "напоминания вкл" | "reminders on" => Some(Self::RemindersOn),
            "напоминания выкл" | "reminders off" => Some(Self::RemindersOff),
            "удалить меня" | "delete me" => Some(Self::DeleteMe),
            _ => None,
        }
    }
}
