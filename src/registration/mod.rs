//! Registration flow — validators, state machine, commands and FAQ.
//!
//! Both channel adapters feed inbound text into [`RegistrationEngine`] and
//! send back the [`Reply`] it returns.

pub mod commands;
pub mod faq;
pub mod machine;
pub mod messages;
pub mod state;
pub mod validators;

pub use machine::{RegistrationEngine, Reply};
pub use messages::Messages;
pub use state::ConversationState;
