//! Run notifications through `mail`.

use super::command::{self, Echo};
use crate::utils::errors::ToolError;
use async_trait::async_trait;

/// Adapter for sending notifications
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn probe(&self) -> Result<(), ToolError>;

    /// Send a notification with a subject and message body
    async fn notify(&self, subject: &str, body: &str) -> Result<(), ToolError>;
}

pub struct MailNotifier {
    program: String,
    recipient: String,
}

impl MailNotifier {
    pub fn new(program: impl Into<String>, recipient: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            recipient: recipient.into(),
        }
    }
}

#[async_trait]
impl Notifier for MailNotifier {
    async fn probe(&self) -> Result<(), ToolError> {
        command::require_executable(&self.program).map(|_| ())
    }

    async fn notify(&self, subject: &str, body: &str) -> Result<(), ToolError> {
        tracing::info!(recipient = %self.recipient, %subject, "Sending notification");
        command::run(
            &self.program,
            ["-s", subject, self.recipient.as_str()],
            Some(body),
            Echo::Debug,
        )
        .await?;
        Ok(())
    }
}
