//! Conversation action: keeps inbound messages for staff follow-up.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::actions::{ProcessCheck, SmsAction, parse_settings, render_template};
use crate::error::ActionError;
use crate::pipeline::types::{ActionDefinition, IncomingMessage, SmsResponse};
use crate::store::{ConversationMessage, Database};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConversationSettings {
    /// Optional acknowledgement; supports `{from}`, `{to}`, `{body}`.
    #[serde(default)]
    pub response: Option<String>,
}

pub struct ConversationAction {
    store: Arc<dyn Database>,
}

impl ConversationAction {
    pub fn new(store: Arc<dyn Database>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SmsAction for ConversationAction {
    fn component(&self) -> &str {
        "conversation"
    }

    async fn should_process(
        &self,
        _definition: &ActionDefinition,
        message: &IncomingMessage,
    ) -> ProcessCheck {
        if message.text().trim().is_empty() && message.attachments.is_empty() {
            ProcessCheck::no()
        } else {
            ProcessCheck::yes()
        }
    }

    async fn process(
        &self,
        definition: &ActionDefinition,
        message: &IncomingMessage,
    ) -> Result<Option<SmsResponse>, ActionError> {
        let settings: ConversationSettings = parse_settings(definition)?;

        self.store
            .add_conversation_message(&ConversationMessage {
                id: Uuid::new_v4().to_string(),
                from_number: message.from_number.clone(),
                to_number: message.to_number.clone(),
                person_alias_id: message.from_person_alias_id,
                body: message.text().to_string(),
                attachments: message.attachments.clone(),
                received_at: Utc::now(),
            })
            .await?;
        info!(from = %message.from_number, action = %definition.name, "Conversation message recorded");

        Ok(settings
            .response
            .filter(|r| !r.trim().is_empty())
            .map(|r| SmsResponse::text(render_template(&r, message))))
    }
}
