//! libSQL backend — async `UserDirectory` implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::registration::state::ConversationState;
use crate::store::migrations;
use crate::store::traits::UserDirectory;
use crate::users::{Channel, ContactField, ReminderOffset, User};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        Ok(backend)
    }

    async fn init_schema(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    async fn query_users(
        &self,
        op: &str,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<User>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(sql, params)
            .await
            .map_err(|e| DatabaseError::Query(format!("{op}: {e}")))?;

        let mut users = Vec::new();
        loop {
            match rows.next().await {
                Ok(Some(row)) => match row_to_user(&row) {
                    Ok(user) => users.push(user),
                    Err(e) => tracing::warn!("Skipping user row: {e}"),
                },
                Ok(None) => break,
                Err(e) => return Err(DatabaseError::Query(format!("{op}: {e}"))),
            }
        }
        Ok(users)
    }

    /// Run an UPDATE and fail with `NotFound` when no row matched.
    async fn update_one(
        &self,
        op: &str,
        id: Uuid,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<(), DatabaseError> {
        let count = self
            .conn()
            .execute(sql, params)
            .await
            .map_err(|e| DatabaseError::Query(format!("{op}: {e}")))?;
        if count == 0 {
            return Err(DatabaseError::NotFound {
                entity: "user".into(),
                id: id.to_string(),
            });
        }
        Ok(())
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

const USER_COLUMNS: &str = "id, channel, external_id, full_name, email, phone, is_registered, \
     receive_reminders, reminder_sent_week, reminder_sent_3days, reminder_sent_1day, \
     feedback_submitted, conversation_state, registration_date, updated_at";

/// Map a libsql Row to a User. Column order matches USER_COLUMNS.
fn row_to_user(row: &libsql::Row) -> Result<User, DatabaseError> {
    let flag = |idx: i32| -> Result<bool, DatabaseError> {
        row.get::<i64>(idx)
            .map(|v| v != 0)
            .map_err(|e| DatabaseError::Query(format!("row parse: {e}")))
    };
    let text = |idx: i32| -> Result<String, DatabaseError> {
        row.get::<String>(idx)
            .map_err(|e| DatabaseError::Query(format!("row parse: {e}")))
    };

    let id_str = text(0)?;
    let channel_str = text(1)?;
    let state_str = text(12)?;

    Ok(User {
        id: Uuid::parse_str(&id_str)
            .map_err(|e| DatabaseError::Query(format!("bad user id '{id_str}': {e}")))?,
        channel: channel_str.parse().map_err(DatabaseError::Query)?,
        external_id: text(2)?,
        full_name: text(3)?,
        email: text(4)?,
        phone: text(5)?,
        is_registered: flag(6)?,
        receive_reminders: flag(7)?,
        reminder_sent_week: flag(8)?,
        reminder_sent_3days: flag(9)?,
        reminder_sent_1day: flag(10)?,
        feedback_submitted: flag(11)?,
        conversation_state: state_str.parse().map_err(DatabaseError::Query)?,
        registration_date: parse_datetime(&text(13)?),
        updated_at: parse_datetime(&text(14)?),
    })
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl UserDirectory for LibSqlBackend {
    async fn get_user(
        &self,
        channel: Channel,
        external_id: &str,
    ) -> Result<Option<User>, DatabaseError> {
        let users = self
            .query_users(
                "get_user",
                &format!("SELECT {USER_COLUMNS} FROM users WHERE channel = ?1 AND external_id = ?2"),
                params![channel.as_str(), external_id],
            )
            .await?;
        Ok(users.into_iter().next())
    }

    async fn get_or_create_user(
        &self,
        channel: Channel,
        external_id: &str,
    ) -> Result<User, DatabaseError> {
        let fresh = User::new(channel, external_id);
        let now = fresh.registration_date.to_rfc3339();
        let inserted = self
            .conn()
            .execute(
                "INSERT INTO users (id, channel, external_id, conversation_state, registration_date, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                 ON CONFLICT (channel, external_id) DO NOTHING",
                params![
                    fresh.id.to_string(),
                    channel.as_str(),
                    external_id,
                    fresh.conversation_state.as_str(),
                    now,
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_or_create_user: {e}")))?;

        if inserted > 0 {
            info!(channel = %channel, external_id, "New user created");
        }

        self.get_user(channel, external_id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound {
                entity: "user".into(),
                id: format!("{channel}:{external_id}"),
            })
    }

    async fn set_contact_field(
        &self,
        id: Uuid,
        field: ContactField,
        value: &str,
    ) -> Result<(), DatabaseError> {
        let sql = format!(
            "UPDATE users SET {} = ?1, updated_at = ?2 WHERE id = ?3",
            field.column()
        );
        self.update_one(
            "set_contact_field",
            id,
            &sql,
            params![value, Utc::now().to_rfc3339(), id.to_string()],
        )
        .await?;
        debug!(user_id = %id, field = field.column(), "Contact field updated");
        Ok(())
    }

    async fn set_conversation_state(
        &self,
        id: Uuid,
        state: ConversationState,
    ) -> Result<(), DatabaseError> {
        self.update_one(
            "set_conversation_state",
            id,
            "UPDATE users SET conversation_state = ?1, updated_at = ?2 WHERE id = ?3",
            params![state.as_str(), Utc::now().to_rfc3339(), id.to_string()],
        )
        .await?;
        debug!(user_id = %id, state = %state, "Conversation state updated");
        Ok(())
    }

    async fn complete_registration(&self, id: Uuid) -> Result<(), DatabaseError> {
        let count = self
            .conn()
            .execute(
                "UPDATE users SET is_registered = 1, conversation_state = 'completed', updated_at = ?1
                 WHERE id = ?2 AND full_name != '' AND email != '' AND phone != ''",
                params![Utc::now().to_rfc3339(), id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("complete_registration: {e}")))?;

        if count == 0 {
            return Err(DatabaseError::Constraint(format!(
                "user {id} is missing or has incomplete contact details"
            )));
        }
        info!(user_id = %id, "Registration completed");
        Ok(())
    }

    async fn set_receive_reminders(&self, id: Uuid, enabled: bool) -> Result<(), DatabaseError> {
        self.update_one(
            "set_receive_reminders",
            id,
            "UPDATE users SET receive_reminders = ?1, updated_at = ?2 WHERE id = ?3",
            params![enabled as i64, Utc::now().to_rfc3339(), id.to_string()],
        )
        .await
    }

    async fn mark_reminder_sent(
        &self,
        id: Uuid,
        offset: ReminderOffset,
    ) -> Result<(), DatabaseError> {
        let sql = format!(
            "UPDATE users SET {} = 1, updated_at = ?1 WHERE id = ?2",
            offset.flag_column()
        );
        self.update_one(
            "mark_reminder_sent",
            id,
            &sql,
            params![Utc::now().to_rfc3339(), id.to_string()],
        )
        .await?;
        debug!(user_id = %id, offset = %offset, "Reminder flag set");
        Ok(())
    }

    async fn list_reminder_candidates(&self) -> Result<Vec<User>, DatabaseError> {
        self.query_users(
            "list_reminder_candidates",
            &format!(
                "SELECT {USER_COLUMNS} FROM users
                 WHERE is_registered = 1 AND receive_reminders = 1
                   AND (reminder_sent_week = 0 OR reminder_sent_3days = 0 OR reminder_sent_1day = 0)
                 ORDER BY registration_date ASC"
            ),
            (),
        )
        .await
    }

    async fn save_feedback(&self, id: Uuid, text: &str) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO feedback (id, user_id, text, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    Uuid::new_v4().to_string(),
                    id.to_string(),
                    text,
                    Utc::now().to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("save_feedback: {e}")))?;

        self.update_one(
            "save_feedback",
            id,
            "UPDATE users SET feedback_submitted = 1, updated_at = ?1 WHERE id = ?2",
            params![Utc::now().to_rfc3339(), id.to_string()],
        )
        .await?;
        info!(user_id = %id, "Feedback saved");
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let conn = self.conn();
        conn.execute(
            "DELETE FROM feedback WHERE user_id = ?1",
            params![id.to_string()],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("delete_user: {e}")))?;

        let count = conn
            .execute("DELETE FROM users WHERE id = ?1", params![id.to_string()])
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_user: {e}")))?;

        if count > 0 {
            info!(user_id = %id, "User erased on request");
        }
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> LibSqlBackend {
        LibSqlBackend::new_memory().await.unwrap()
    }

    async fn registered_user(db: &LibSqlBackend, external_id: &str) -> User {
        let user = db
            .get_or_create_user(Channel::Telegram, external_id)
            .await
            .unwrap();
        db.set_contact_field(user.id, ContactField::FullName, "Иван Петров")
            .await
            .unwrap();
        db.set_contact_field(user.id, ContactField::Email, "ivan@example.com")
            .await
            .unwrap();
        db.set_contact_field(user.id, ContactField::Phone, "+7 999 822-12-77")
            .await
            .unwrap();
        db.complete_registration(user.id).await.unwrap();
        db.get_user(Channel::Telegram, external_id)
            .await
            .unwrap()
            .unwrap()
    }

    // ── Identity ────────────────────────────────────────────────────

    #[tokio::test]
    async fn get_or_create_is_idempotent() {
        let db = test_db().await;
        let first = db.get_or_create_user(Channel::Telegram, "42").await.unwrap();
        let second = db.get_or_create_user(Channel::Telegram, "42").await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.conversation_state, ConversationState::Initial);
        assert!(first.full_name.is_empty());
    }

    #[tokio::test]
    async fn same_external_id_on_other_channel_is_a_different_user() {
        let db = test_db().await;
        let tg = db.get_or_create_user(Channel::Telegram, "79990001122").await.unwrap();
        let wa = db.get_or_create_user(Channel::WhatsApp, "79990001122").await.unwrap();
        assert_ne!(tg.id, wa.id);
        assert_eq!(wa.channel, Channel::WhatsApp);
    }

    #[tokio::test]
    async fn get_user_not_found() {
        let db = test_db().await;
        assert!(db.get_user(Channel::Telegram, "nobody").await.unwrap().is_none());
    }

    // ── Mutations ───────────────────────────────────────────────────

    #[tokio::test]
    async fn contact_fields_and_state_persist() {
        let db = test_db().await;
        let user = db.get_or_create_user(Channel::WhatsApp, "+7999").await.unwrap();

        db.set_contact_field(user.id, ContactField::Email, "a@b.co")
            .await
            .unwrap();
        db.set_conversation_state(user.id, ConversationState::AskingPhone)
            .await
            .unwrap();

        let loaded = db.get_user(Channel::WhatsApp, "+7999").await.unwrap().unwrap();
        assert_eq!(loaded.email, "a@b.co");
        assert_eq!(loaded.conversation_state, ConversationState::AskingPhone);
        assert!(loaded.full_name.is_empty());
    }

    #[tokio::test]
    async fn update_missing_user_is_not_found() {
        let db = test_db().await;
        let err = db
            .set_conversation_state(Uuid::new_v4(), ConversationState::AskingName)
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[tokio::test]
    async fn complete_registration_requires_all_fields() {
        let db = test_db().await;
        let user = db.get_or_create_user(Channel::Telegram, "7").await.unwrap();
        db.set_contact_field(user.id, ContactField::FullName, "Ann Lee")
            .await
            .unwrap();

        let err = db.complete_registration(user.id).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Constraint(_)));

        let loaded = db.get_user(Channel::Telegram, "7").await.unwrap().unwrap();
        assert!(!loaded.is_registered);
    }

    #[tokio::test]
    async fn complete_registration_sets_terminal_state() {
        let db = test_db().await;
        let user = registered_user(&db, "100").await;
        assert!(user.is_registered);
        assert_eq!(user.conversation_state, ConversationState::Completed);
    }

    // ── Reminders ───────────────────────────────────────────────────

    #[tokio::test]
    async fn reminder_candidates_require_registration_and_opt_in() {
        let db = test_db().await;
        let opted_in = registered_user(&db, "1").await;
        let _not_opted = registered_user(&db, "2").await;
        let unregistered = db.get_or_create_user(Channel::Telegram, "3").await.unwrap();

        db.set_receive_reminders(opted_in.id, true).await.unwrap();
        db.set_receive_reminders(unregistered.id, true).await.unwrap();

        let candidates = db.list_reminder_candidates().await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, opted_in.id);
    }

    #[tokio::test]
    async fn fully_reminded_user_drops_out_of_candidates() {
        let db = test_db().await;
        let user = registered_user(&db, "1").await;
        db.set_receive_reminders(user.id, true).await.unwrap();

        for offset in ReminderOffset::ALL {
            db.mark_reminder_sent(user.id, offset).await.unwrap();
        }
        assert!(db.list_reminder_candidates().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn mark_reminder_sent_sets_only_that_flag() {
        let db = test_db().await;
        let user = registered_user(&db, "1").await;
        db.mark_reminder_sent(user.id, ReminderOffset::OneDay)
            .await
            .unwrap();
        // Marking twice is harmless.
        db.mark_reminder_sent(user.id, ReminderOffset::OneDay)
            .await
            .unwrap();

        let loaded = db.get_user(Channel::Telegram, "1").await.unwrap().unwrap();
        assert!(!loaded.reminder_sent_week);
        assert!(!loaded.reminder_sent_3days);
        assert!(loaded.reminder_sent_1day);
    }

    // ── Feedback and erasure ────────────────────────────────────────

    #[tokio::test]
    async fn save_feedback_sets_flag() {
        let db = test_db().await;
        let user = registered_user(&db, "1").await;
        db.save_feedback(user.id, "Отличный форум").await.unwrap();

        let loaded = db.get_user(Channel::Telegram, "1").await.unwrap().unwrap();
        assert!(loaded.feedback_submitted);
    }

    #[tokio::test]
    async fn delete_then_recreate_gives_fresh_record() {
        let db = test_db().await;
        let user = registered_user(&db, "55").await;
        db.save_feedback(user.id, "ok").await.unwrap();

        assert!(db.delete_user(user.id).await.unwrap());
        assert!(db.get_user(Channel::Telegram, "55").await.unwrap().is_none());
        assert!(!db.delete_user(user.id).await.unwrap());

        let fresh = db.get_or_create_user(Channel::Telegram, "55").await.unwrap();
        assert_ne!(fresh.id, user.id);
        assert!(fresh.full_name.is_empty());
        assert!(fresh.email.is_empty());
        assert!(fresh.phone.is_empty());
        assert!(!fresh.is_registered);
        assert_eq!(fresh.conversation_state, ConversationState::Initial);
    }

    // ── On-disk ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn conversation_state_survives_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("registrar.db");

        {
            let db = LibSqlBackend::new_local(&path).await.unwrap();
            let user = db.get_or_create_user(Channel::WhatsApp, "+7000").await.unwrap();
            db.set_conversation_state(user.id, ConversationState::AskingEmail)
                .await
                .unwrap();
        }

        let db = LibSqlBackend::new_local(&path).await.unwrap();
        let user = db.get_user(Channel::WhatsApp, "+7000").await.unwrap().unwrap();
        assert_eq!(user.conversation_state, ConversationState::AskingEmail);
    }
}
