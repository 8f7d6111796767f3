//! In-memory transports for unit tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::channels::{Mailer, MessageSender};
use crate::error::ChannelError;

/// Records every message it is asked to send.
pub(crate) struct RecordingSender {
    name: &'static str,
    fail: bool,
    delay: Option<Duration>,
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingSender {
    pub(crate) fn new(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            fail: false,
            delay: None,
            sent: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn failing(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            fail: true,
            delay: None,
            sent: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn slow(name: &'static str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            name,
            fail: false,
            delay: Some(delay),
            sent: Mutex::new(Vec::new()),
        })
    }

    /// (recipient, text) pairs in send order.
    pub(crate) fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// Wait for background sends to land, giving up after a second.
    pub(crate) async fn wait_for(&self, count: usize) -> Vec<(String, String)> {
        for _ in 0..100 {
            if self.sent.lock().unwrap().len() >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.sent()
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    fn name(&self) -> &str {
        self.name
    }

    async fn send_text(&self, recipient: &str, text: &str) -> Result<(), ChannelError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(ChannelError::SendFailed {
                name: self.name.into(),
                reason: "stub failure".into(),
            });
        }
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), text.to_string()));
        Ok(())
    }
}

/// Records (to, subject, body) for every email.
pub(crate) struct RecordingMailer {
    fail: bool,
    sent: Mutex<Vec<(String, String, String)>>,
}

impl RecordingMailer {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            fail: false,
            sent: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            sent: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn sent(&self) -> Vec<(String, String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<(), ChannelError> {
        if self.fail {
            return Err(ChannelError::SendFailed {
                name: "email".into(),
                reason: "stub failure".into(),
            });
        }
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), subject.to_string(), body.to_string()));
        Ok(())
    }
}
