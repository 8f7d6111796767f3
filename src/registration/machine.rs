//! RegistrationEngine — the single entry point for inbound text from any
//! channel.
//!
//! Commands are handled first and never move the conversation cursor.
//! Slash commands work in every state; bare WhatsApp keywords are ignored
//! while the user is answering a registration question, so a name like
//! "Info" is validated as a name. Everything else drives the registration
//! state machine, and once the user is registered, free text goes to the FAQ
//! responder.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::Error;
use crate::notify::{Dispatcher, NotificationKind};
use crate::registration::commands::Command;
use crate::registration::faq;
use crate::registration::messages::{self, Messages};
use crate::registration::state::ConversationState;
use crate::registration::validators::{validate_email, validate_name, validate_phone};
use crate::store::UserDirectory;
use crate::users::{Channel, ContactField, User};

/// Text to send back, plus whether to attach confirm/cancel buttons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    /// Only the Telegram adapter renders these; WhatsApp users type да/нет.
    pub buttons: bool,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            buttons: false,
        }
    }

    pub fn with_buttons(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            buttons: true,
        }
    }
}

/// A confirmation-step answer.
fn confirmation_answer(text: &str) -> Option<bool> {
    match text.to_lowercase().as_str() {
        "да" | "yes" | "y" | "confirm" => Some(true),
        "нет" | "no" | "n" | "cancel" => Some(false),
        _ => None,
    }
}

pub struct RegistrationEngine {
    directory: Arc<dyn UserDirectory>,
    dispatcher: Arc<Dispatcher>,
}

impl RegistrationEngine {
    pub fn new(directory: Arc<dyn UserDirectory>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            directory,
            dispatcher,
        }
    }

    fn messages(&self) -> &Messages {
        self.dispatcher.messages()
    }

    /// Handle one inbound message and produce the reply.
    ///
    /// Validation failures are replies, not errors; only storage failures
    /// surface as `Err`.
    pub async fn handle(
        &self,
        channel: Channel,
        external_id: &str,
        text: &str,
    ) -> Result<Reply, Error> {
        let text = text.trim();

        if let Some(command) = Command::parse_slash(text) {
            debug!(%channel, external_id, ?command, "Handling command");
            return self.run_command(channel, external_id, command).await;
        }

        let existing = self.directory.get_user(channel, external_id).await?;
        let collecting = existing
            .as_ref()
            .is_some_and(|u| u.conversation_state.is_collecting());
        if !collecting {
            if let Some(command) = Command::parse_keyword(text) {
                debug!(%channel, external_id, ?command, "Handling keyword command");
                return self.run_command(channel, external_id, command).await;
            }
        }

        let user = match existing {
            Some(user) => user,
            None => {
                self.directory
                    .get_or_create_user(channel, external_id)
                    .await?
            }
        };
        self.advance(user, text).await
    }

    // ── State machine ───────────────────────────────────────────────

    async fn advance(&self, mut user: User, text: &str) -> Result<Reply, Error> {
        use ConversationState::*;

        match user.conversation_state {
            Initial => {
                self.move_forward(&mut user).await?;
                Ok(Reply::text(self.messages().welcome()))
            }
            AskingName => {
                if let Err(e) = validate_name(text) {
                    return Ok(Reply::text(e.to_string()));
                }
                self.store_field(&mut user, ContactField::FullName, text)
                    .await?;
                self.move_forward(&mut user).await?;
                Ok(Reply::text(messages::EMAIL_PROMPT))
            }
            AskingEmail => {
                if let Err(e) = validate_email(text) {
                    return Ok(Reply::text(e.to_string()));
                }
                self.store_field(&mut user, ContactField::Email, text).await?;
                self.move_forward(&mut user).await?;
                Ok(Reply::text(messages::PHONE_PROMPT))
            }
            AskingPhone => {
                if let Err(e) = validate_phone(text) {
                    return Ok(Reply::text(e.to_string()));
                }
                self.store_field(&mut user, ContactField::Phone, text).await?;
                self.move_forward(&mut user).await?;
                Ok(Reply::with_buttons(
                    self.messages().confirmation_summary(&user),
                ))
            }
            Confirmation => match confirmation_answer(text) {
                Some(true) => self.complete(user).await,
                Some(false) => {
                    self.move_to(&mut user, Initial).await?;
                    info!(user_id = %user.id, "Registration cancelled at confirmation");
                    Ok(Reply::text(messages::REGISTRATION_CANCELLED))
                }
                None => Ok(Reply::with_buttons(messages::CONFIRM_REPROMPT)),
            },
            // A late button press or да/нет after registration.
            Completed if confirmation_answer(text).is_some() => {
                Ok(Reply::text(messages::ALREADY_REGISTERED))
            }
            Completed => Ok(Reply::text(faq::answer(self.messages(), text))),
        }
    }

    /// Persist registration and reply at once. The confirmation goes out in
    /// the background; a failed send is logged and the registration stands.
    async fn complete(&self, mut user: User) -> Result<Reply, Error> {
        self.directory.complete_registration(user.id).await?;
        user.is_registered = true;
        user.conversation_state = ConversationState::Completed;

        let reply = Reply::text(self.messages().registration_success(&user));

        let dispatcher = Arc::clone(&self.dispatcher);
        tokio::spawn(async move {
            let delivered = dispatcher
                .send(&user, NotificationKind::RegistrationConfirmation)
                .await;
            if !delivered {
                warn!(user_id = %user.id, "Registration confirmation was not delivered");
            }
        });

        Ok(reply)
    }

    /// Advance to the step after a successful answer.
    async fn move_forward(&self, user: &mut User) -> Result<(), Error> {
        match user.conversation_state.next() {
            Some(next) => self.move_to(user, next).await,
            None => Ok(()),
        }
    }

    async fn move_to(&self, user: &mut User, target: ConversationState) -> Result<(), Error> {
        debug_assert!(
            user.conversation_state.can_transition_to(target),
            "illegal transition {} -> {target}",
            user.conversation_state
        );
        self.directory
            .set_conversation_state(user.id, target)
            .await?;
        user.conversation_state = target;
        Ok(())
    }

    async fn store_field(
        &self,
        user: &mut User,
        field: ContactField,
        value: &str,
    ) -> Result<(), Error> {
        self.directory
            .set_contact_field(user.id, field, value)
            .await?;
        user.set_contact(field, value);
        Ok(())
    }

    // ── Commands ────────────────────────────────────────────────────

    async fn run_command(
        &self,
        channel: Channel,
        external_id: &str,
        command: Command,
    ) -> Result<Reply, Error> {
        match command {
            Command::Start => self.restart(channel, external_id).await,
            Command::Info => Ok(Reply::text(self.messages().event_info())),
            Command::Help => Ok(Reply::text(messages::HELP)),
            Command::Faq(question) => Ok(Reply::text(faq::answer(self.messages(), &question))),
            Command::RemindersOn => self.set_reminders(channel, external_id, true).await,
            Command::RemindersOff => self.set_reminders(channel, external_id, false).await,
            Command::Feedback(feedback) => {
                self.save_feedback(channel, external_id, &feedback).await
            }
            Command::DeleteMe => self.delete_me(channel, external_id).await,
        }
    }

    /// `/start`: reset an unfinished flow and greet again.
    async fn restart(&self, channel: Channel, external_id: &str) -> Result<Reply, Error> {
        let mut user = self
            .directory
            .get_or_create_user(channel, external_id)
            .await?;

        if user.conversation_state.is_terminal() {
            return Ok(Reply::text(messages::ALREADY_REGISTERED));
        }
        if user.conversation_state != ConversationState::Initial {
            // Explicit reset, not a flow transition.
            self.directory
                .set_conversation_state(user.id, ConversationState::Initial)
                .await?;
            user.conversation_state = ConversationState::Initial;
            info!(user_id = %user.id, "Registration restarted");
        }
        self.advance(user, "").await
    }

    /// Look up a registered user, or `None` if there is no completed registration.
    async fn registered_user(
        &self,
        channel: Channel,
        external_id: &str,
    ) -> Result<Option<User>, Error> {
        let user = self.directory.get_user(channel, external_id).await?;
        Ok(user.filter(|u| u.is_registered))
    }

    async fn set_reminders(
        &self,
        channel: Channel,
        external_id: &str,
        enabled: bool,
    ) -> Result<Reply, Error> {
        let Some(user) = self.registered_user(channel, external_id).await? else {
            return Ok(Reply::text(messages::REGISTER_FIRST));
        };
        self.directory
            .set_receive_reminders(user.id, enabled)
            .await?;
        info!(user_id = %user.id, enabled, "Reminder preference changed");
        Ok(Reply::text(if enabled {
            messages::REMINDERS_ON
        } else {
            messages::REMINDERS_OFF
        }))
    }

    async fn save_feedback(
        &self,
        channel: Channel,
        external_id: &str,
        feedback: &str,
    ) -> Result<Reply, Error> {
        let Some(user) = self.registered_user(channel, external_id).await? else {
            return Ok(Reply::text(messages::REGISTER_FIRST));
        };
        if feedback.is_empty() {
            return Ok(Reply::text(messages::FEEDBACK_USAGE));
        }
        self.directory.save_feedback(user.id, feedback).await?;
        Ok(Reply::text(messages::FEEDBACK_THANKS))
    }

    async fn delete_me(&self, channel: Channel, external_id: &str) -> Result<Reply, Error> {
        let Some(user) = self.directory.get_user(channel, external_id).await? else {
            return Ok(Reply::text(messages::NOT_REGISTERED));
        };
        self.directory.delete_user(user.id).await?;
        Ok(Reply::text(messages::USER_DELETED))
    }
}
