//! `UserDirectory` trait — single async interface for all persistence.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::registration::state::ConversationState;
use crate::users::{Channel, ContactField, ReminderOffset, User};

/// Backend-agnostic store of registrants.
///
/// Every mutating call is a single committed statement; there are no batched
/// transactions.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Look up a user by channel identity.
    async fn get_user(
        &self,
        channel: Channel,
        external_id: &str,
    ) -> Result<Option<User>, DatabaseError>;

    /// Fetch the user for this identity, creating a blank record on first contact.
    async fn get_or_create_user(
        &self,
        channel: Channel,
        external_id: &str,
    ) -> Result<User, DatabaseError>;

    /// Store one validated contact field.
    async fn set_contact_field(
        &self,
        id: Uuid,
        field: ContactField,
        value: &str,
    ) -> Result<(), DatabaseError>;

    /// Move the user's registration cursor.
    async fn set_conversation_state(
        &self,
        id: Uuid,
        state: ConversationState,
    ) -> Result<(), DatabaseError>;

    /// Mark registration complete and move the cursor to `Completed`.
    ///
    /// Fails with `Constraint` if any contact field is still empty.
    async fn complete_registration(&self, id: Uuid) -> Result<(), DatabaseError>;

    /// Opt in to or out of reminders.
    async fn set_receive_reminders(&self, id: Uuid, enabled: bool) -> Result<(), DatabaseError>;

    /// Flip one reminder-sent flag to true. There is no way to clear it.
    async fn mark_reminder_sent(
        &self,
        id: Uuid,
        offset: ReminderOffset,
    ) -> Result<(), DatabaseError>;

    /// Registered, opted-in users with at least one reminder still unsent.
    async fn list_reminder_candidates(&self) -> Result<Vec<User>, DatabaseError>;

    /// Record free-text feedback and set `feedback_submitted`.
    async fn save_feedback(&self, id: Uuid, text: &str) -> Result<(), DatabaseError>;

    /// Erase the user and their feedback. Returns false if nothing was deleted.
    async fn delete_user(&self, id: Uuid) -> Result<bool, DatabaseError>;
}
