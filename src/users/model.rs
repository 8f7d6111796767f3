//! User data model — one record per (channel, external id).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::registration::state::ConversationState;

/// Messaging surface a user talks to us through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Telegram,
    #[serde(rename = "whatsapp")]
    WhatsApp,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Telegram => "telegram",
            Self::WhatsApp => "whatsapp",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "telegram" => Ok(Self::Telegram),
            "whatsapp" => Ok(Self::WhatsApp),
            other => Err(format!("unknown channel: {other}")),
        }
    }
}

/// Which contact field a registration step writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactField {
    FullName,
    Email,
    Phone,
}

impl ContactField {
    /// Column name in the `users` table.
    pub(crate) fn column(&self) -> &'static str {
        match self {
            Self::FullName => "full_name",
            Self::Email => "email",
            Self::Phone => "phone",
        }
    }
}

/// The three fixed reminder offsets before the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderOffset {
    Week,
    ThreeDays,
    OneDay,
}

impl ReminderOffset {
    /// All offsets in the order the scheduler evaluates them.
    pub const ALL: [ReminderOffset; 3] = [Self::Week, Self::ThreeDays, Self::OneDay];

    /// Days before the event this reminder is due.
    pub fn days_before(&self) -> i64 {
        match self {
            Self::Week => 7,
            Self::ThreeDays => 3,
            Self::OneDay => 1,
        }
    }

    /// Column holding the sent flag for this offset.
    pub(crate) fn flag_column(&self) -> &'static str {
        match self {
            Self::Week => "reminder_sent_week",
            Self::ThreeDays => "reminder_sent_3days",
            Self::OneDay => "reminder_sent_1day",
        }
    }
}

impl std::fmt::Display for ReminderOffset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Week => "week",
            Self::ThreeDays => "3days",
            Self::OneDay => "1day",
        };
        f.write_str(s)
    }
}

/// A registrant (or a user who has only started talking to the bot).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub channel: Channel,
    /// Channel-native identity: Telegram chat id or WhatsApp phone number.
    pub external_id: String,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub is_registered: bool,
    /// Explicit opt-in for event reminders.
    pub receive_reminders: bool,
    pub reminder_sent_week: bool,
    pub reminder_sent_3days: bool,
    pub reminder_sent_1day: bool,
    pub feedback_submitted: bool,
    /// Cursor into the registration flow; persisted so restarts don't lose it.
    pub conversation_state: ConversationState,
    pub registration_date: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// A fresh record as created on first contact.
    pub fn new(channel: Channel, external_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            channel,
            external_id: external_id.into(),
            full_name: String::new(),
            email: String::new(),
            phone: String::new(),
            is_registered: false,
            receive_reminders: false,
            reminder_sent_week: false,
            reminder_sent_3days: false,
            reminder_sent_1day: false,
            feedback_submitted: false,
            conversation_state: ConversationState::Initial,
            registration_date: now,
            updated_at: now,
        }
    }

    pub fn reminder_sent(&self, offset: ReminderOffset) -> bool {
        match offset {
            ReminderOffset::Week => self.reminder_sent_week,
            ReminderOffset::ThreeDays => self.reminder_sent_3days,
            ReminderOffset::OneDay => self.reminder_sent_1day,
        }
    }

    pub(crate) fn set_reminder_sent(&mut self, offset: ReminderOffset) {
        match offset {
            ReminderOffset::Week => self.reminder_sent_week = true,
            ReminderOffset::ThreeDays => self.reminder_sent_3days = true,
            ReminderOffset::OneDay => self.reminder_sent_1day = true,
        }
    }

    pub(crate) fn set_contact(&mut self, field: ContactField, value: &str) {
        let slot = match field {
            ContactField::FullName => &mut self.full_name,
            ContactField::Email => &mut self.email,
            ContactField::Phone => &mut self.phone,
        };
        *slot = value.to_string();
    }
}
