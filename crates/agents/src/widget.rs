use std::sync::Arc;

use anyhow::Result;
use hakach_core::{ChatSession, Message, WidgetConfig};
use hakach_storage::SessionRepository;

use crate::{SupportAssistant, TurnOutcome};

/// An embedded chat window bound to one assistant. Each handle owns at most
/// one session; creating several handles gives independent conversations.
pub struct ChatWidget<S>
where
    S: SessionRepository,
{
    assistant: Arc<SupportAssistant<S>>,
    config: WidgetConfig,
    session: Option<ChatSession>,
}

impl<S> ChatWidget<S>
where
    S: SessionRepository,
{
    pub fn create(assistant: Arc<SupportAssistant<S>>, config: WidgetConfig) -> Self {
        Self {
            assistant,
            config,
            session: None,
        }
    }

    pub fn config(&self) -> &WidgetConfig {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session.as_ref().map(|session| session.session_id.as_str())
    }

    pub fn messages(&self) -> &[Message] {
        self.session
            .as_ref()
            .map(|session| session.messages.as_slice())
            .unwrap_or_default()
    }

    /// Opens the window with a welcome message. Opening an open window changes nothing.
    pub async fn open(&mut self) -> Result<&[Message]> {
        if self.session.is_none() {
            let language = self.config.language_set().default_language();
            let session = self.assistant.open_session(Some(language)).await?;
            self.session = Some(session);
        }
        Ok(self.messages())
    }

    pub async fn send(&mut self, text: &str) -> Result<TurnOutcome> {
        self.open().await?;
        let session_id = self.session_id().map(str::to_string);

        let outcome = self
            .assistant
            .handle_message(session_id.as_deref(), text)
            .await?;

        if let (TurnOutcome::Replied(reply), Some(session)) = (&outcome, self.session.as_mut()) {
            session.messages.extend(reply.messages.iter().cloned());
            session.language = reply.language;
        }
        Ok(outcome)
    }

    /// Closes the window; the conversation and any unfinished rate lookup are discarded.
    pub async fn close(&mut self) -> Result<()> {
        if let Some(session) = self.session.take() {
            self.assistant.close_session(&session.session_id).await?;
        }
        Ok(())
    }
}
