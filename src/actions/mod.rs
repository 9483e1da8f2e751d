//! SMS action components.
//!
//! An action definition names a component key; the registry maps that key to
//! an [`SmsAction`] implementation. The dispatcher asks each action whether
//! it wants the message, then asks it to process.

pub mod conversation;
pub mod registry;
pub mod reply;

use async_trait::async_trait;

use crate::error::ActionError;
use crate::pipeline::types::{ActionDefinition, IncomingMessage, SmsResponse};

pub use conversation::ConversationAction;
pub use registry::ActionRegistry;
pub use reply::ReplyAction;

/// Answer to "should this action process the message?".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessCheck {
    pub should_process: bool,
    /// Problem the action wants surfaced even when declining.
    pub error_message: Option<String>,
}

impl ProcessCheck {
    pub fn yes() -> Self {
        Self {
            should_process: true,
            error_message: None,
        }
    }

    pub fn no() -> Self {
        Self::default()
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            should_process: false,
            error_message: Some(message.into()),
        }
    }
}

/// A pipeline step implementation.
#[async_trait]
pub trait SmsAction: Send + Sync {
    /// Registry key, e.g. "reply".
    fn component(&self) -> &str;

    async fn should_process(
        &self,
        definition: &ActionDefinition,
        message: &IncomingMessage,
    ) -> ProcessCheck;

    /// Handle the message, optionally producing a reply. Addressing of the
    /// reply is filled in by the dispatcher.
    async fn process(
        &self,
        definition: &ActionDefinition,
        message: &IncomingMessage,
    ) -> Result<Option<SmsResponse>, ActionError>;
}

/// Deserialize an action's settings into its typed form.
pub(crate) fn parse_settings<T: serde::de::DeserializeOwned>(
    definition: &ActionDefinition,
) -> Result<T, ActionError> {
    let value = if definition.settings.is_null() {
        serde_json::json!({})
    } else {
        definition.settings.clone()
    };
    serde_json::from_value(value).map_err(|e| ActionError::InvalidSettings {
        action: definition.name.clone(),
        reason: e.to_string(),
    })
}

/// Fill `{from}`, `{to}` and `{body}` into a response template.
pub(crate) fn render_template(template: &str, message: &IncomingMessage) -> String {
    template
        .replace("{from}", &message.from_number)
        .replace("{to}", &message.to_number)
        .replace("{body}", message.text().trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_placeholders() {
        let msg = IncomingMessage::new("+15550001111", "+15559990000", " hours ");
        assert_eq!(
            render_template("Hi {from}, you said '{body}' to {to}", &msg),
            "Hi +15550001111, you said 'hours' to +15559990000"
        );
    }

    #[test]
    fn process_check_constructors() {
        assert!(ProcessCheck::yes().should_process);
        assert!(!ProcessCheck::no().should_process);
        let err = ProcessCheck::error("bad");
        assert!(!err.should_process);
        assert_eq!(err.error_message.as_deref(), Some("bad"));
    }
}
