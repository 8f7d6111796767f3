//! Registrant records.

pub mod model;

pub use model::{Channel, ContactField, ReminderOffset, User};
