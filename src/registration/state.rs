//! Registration state machine — tracks where a user is in the flow.

use serde::{Deserialize, Serialize};

/// The steps of the registration conversation.
///
/// Progresses linearly: Initial → AskingName → AskingEmail → AskingPhone →
/// Confirmation → Completed. A rejected confirmation goes back to Initial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    #[default]
    Initial,
    AskingName,
    AskingEmail,
    AskingPhone,
    Confirmation,
    Completed,
}

impl ConversationState {
    /// Check if a transition from `self` to `target` is valid.
    ///
    /// Staying in place (re-prompt after bad input) is always allowed except
    /// from the terminal state.
    pub fn can_transition_to(&self, target: ConversationState) -> bool {
        use ConversationState::*;
        if *self == target {
            return !self.is_terminal();
        }
        matches!(
            (self, target),
            (Initial, AskingName)
                | (AskingName, AskingEmail)
                | (AskingEmail, AskingPhone)
                | (AskingPhone, Confirmation)
                | (Confirmation, Completed)
                | (Confirmation, Initial)
        )
    }

    /// Whether registration is finished for good.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Whether the user is answering a name/email/phone question.
    pub fn is_collecting(&self) -> bool {
        matches!(self, Self::AskingName | Self::AskingEmail | Self::AskingPhone)
    }

    /// The step that follows a successful answer, if any.
    pub fn next(&self) -> Option<ConversationState> {
        use ConversationState::*;
        match self {
            Initial => Some(AskingName),
            AskingName => Some(AskingEmail),
            AskingEmail => Some(AskingPhone),
            AskingPhone => Some(Confirmation),
            Confirmation => Some(Completed),
            Completed => None,
        }
    }

    /// Stored column value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::AskingName => "asking_name",
            Self::AskingEmail => "asking_email",
            Self::AskingPhone => "asking_phone",
            Self::Confirmation => "confirmation",
            Self::Completed => "completed",
        }
    }
}

impl std::fmt::Display for ConversationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ConversationState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initial" => Ok(Self::Initial),
            "asking_name" => Ok(Self::AskingName),
            "asking_email" => Ok(Self::AskingEmail),
            "asking_phone" => Ok(Self::AskingPhone),
            "confirmation" => Ok(Self::Confirmation),
            "completed" => Ok(Self::Completed),
            other => Err(format!("unknown conversation state: {other}")),
        }
    }
}
