//! Error types for the registrar.

use std::time::Duration;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Cannot parse event date '{value}': expected \"DD Month YYYY\"")]
    EventDate { value: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),
}

/// Transport errors raised while delivering a message.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Failed to send message on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("Channel {name} timed out after {timeout:?}")]
    Timeout { name: String, timeout: Duration },

    #[error("Channel {name} is not configured")]
    NotConfigured { name: String },
}

/// A user-correctable input error.
///
/// The `Display` output is sent back to the user verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Имя должно содержать минимум 3 символа")]
    NameTooShort,

    #[error("Имя должно содержать только буквы, пробелы и дефисы")]
    NameInvalidChars,

    #[error("Email не может быть пустым")]
    EmailEmpty,

    #[error("Неверный формат email")]
    EmailInvalid,

    #[error("Номер телефона не может быть пустым")]
    PhoneEmpty,

    #[error("Неверный формат номера телефона. Используйте формат: +7XXXXXXXXXX")]
    PhoneInvalid,
}
