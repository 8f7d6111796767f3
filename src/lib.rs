//! Event Registrar — multi-channel event registration assistant.

pub mod channels;
pub mod config;
pub mod error;
pub mod notify;
pub mod registration;
pub mod reminders;
pub mod server;
pub mod store;
pub mod users;
