//! Shared types for the SMS pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Inbound message ─────────────────────────────────────────────────

/// An inbound SMS, built once per webhook call and mutated in place while
/// the pipeline runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncomingMessage {
    /// Sender's number as delivered by the gateway (e.g. "+16235553322").
    pub from_number: String,
    /// The system number the message was sent to.
    pub to_number: String,
    /// Message body. The gateway may omit it for media-only messages.
    pub body: Option<String>,
    /// Media URLs attached to the message.
    #[serde(default)]
    pub attachments: Vec<String>,
    /// Person alias of the sender, when a stored phone number matches.
    #[serde(default)]
    pub from_person_alias_id: Option<i64>,
    /// Set once consent tracking has run for this message instance.
    #[serde(default)]
    pub was_opt_in_out_tracking_processed: bool,
    /// Consent tracking is turned off for the receiving system number.
    #[serde(default)]
    pub disable_sms_opt_in_out_tracking: bool,
    /// Consent confirmations must not be sent for the receiving system number.
    #[serde(default)]
    pub suppress_sms_opt_in_out_auto_replies: bool,
}

impl IncomingMessage {
    pub fn new(from_number: impl Into<String>, to_number: impl Into<String>, body: &str) -> Self {
        Self {
            from_number: from_number.into(),
            to_number: to_number.into(),
            body: Some(body.to_string()),
            ..Default::default()
        }
    }

    /// Copy the consent switches of the receiving system number onto the message.
    pub fn with_system_number(mut self, system: &SystemPhoneNumber) -> Self {
        self.disable_sms_opt_in_out_tracking = system.is_sms_opt_in_out_tracking_disabled;
        self.suppress_sms_opt_in_out_auto_replies = system.is_sms_opt_in_out_auto_reply_suppressed;
        self
    }

    pub fn with_attachments(mut self, attachments: Vec<String>) -> Self {
        self.attachments = attachments;
        self
    }

    /// Body text, empty when the gateway sent none.
    pub fn text(&self) -> &str {
        self.body.as_deref().unwrap_or("")
    }
}

// ── Outbound response ───────────────────────────────────────────────

/// A reply produced by an action or by the consent step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmsResponse {
    /// Filled in by the dispatcher from the inbound `to_number`.
    #[serde(default)]
    pub from_number: String,
    /// Filled in by the dispatcher from the inbound `from_number`.
    #[serde(default)]
    pub to_number: String,
    pub message: String,
    #[serde(default)]
    pub attachments: Vec<String>,
}

impl SmsResponse {
    pub fn text(message: impl Into<String>) -> Self {
        Self {
            from_number: String::new(),
            to_number: String::new(),
            message: message.into(),
            attachments: Vec::new(),
        }
    }

    /// Address the response back to the sender of `message`.
    pub fn addressed_to(mut self, message: &IncomingMessage) -> Self {
        self.from_number = message.to_number.clone();
        self.to_number = message.from_number.clone();
        self
    }
}

// ── Pipeline configuration ──────────────────────────────────────────

/// A configured step of a pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionDefinition {
    pub id: i64,
    /// Owning pipeline; seed files may leave it out.
    #[serde(default)]
    pub pipeline_id: i64,
    pub name: String,
    /// Registry key of the component implementing this action.
    pub component: String,
    pub order: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub continue_after_processing: bool,
    #[serde(default)]
    pub is_interaction_logged_after_processing: bool,
    /// Component-specific settings.
    #[serde(default)]
    pub settings: serde_json::Value,
}

/// An ordered, named set of actions applied to every message routed to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDefinition {
    pub id: i64,
    pub name: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub actions: Vec<ActionDefinition>,
}

impl PipelineDefinition {
    /// Active actions ordered by `order`, ties broken by `id`.
    pub fn active_actions(&self) -> Vec<&ActionDefinition> {
        let mut actions: Vec<&ActionDefinition> =
            self.actions.iter().filter(|a| a.is_active).collect();
        actions.sort_by_key(|a| (a.order, a.id));
        actions
    }

    /// Component label used for interaction records.
    pub fn component_label(&self) -> String {
        format!("{} ({})", self.name, self.id)
    }
}

fn default_true() -> bool {
    true
}

// ── Outcome ─────────────────────────────────────────────────────────

/// What happened when one action (or a synthetic step) saw the message.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ActionOutcome {
    pub action_name: String,
    pub should_process: bool,
    pub response: Option<SmsResponse>,
    pub error_message: Option<String>,
    /// Text of an unexpected failure inside the action.
    pub exception: Option<String>,
}

impl ActionOutcome {
    pub fn new(action_name: impl Into<String>) -> Self {
        Self {
            action_name: action_name.into(),
            ..Default::default()
        }
    }

    pub fn error(action_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            action_name: action_name.into(),
            error_message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn has_error(&self) -> bool {
        self.error_message.as_deref().is_some_and(|m| !m.trim().is_empty())
            || self.exception.is_some()
    }
}

/// The reply to send: the last outcome carrying a response.
pub fn last_response(outcomes: &[ActionOutcome]) -> Option<&SmsResponse> {
    outcomes.iter().rev().find_map(|o| o.response.as_ref())
}

// ── Consent records ─────────────────────────────────────────────────

/// A stored contact phone number with its messaging consent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneNumberRecord {
    pub id: i64,
    #[serde(default)]
    pub person_alias_id: Option<i64>,
    /// Digits only, without country code.
    pub number: String,
    /// Country code followed by `number`, digits only.
    pub full_number: String,
    #[serde(default = "default_true")]
    pub is_messaging_enabled: bool,
    #[serde(default)]
    pub is_messaging_opted_out: bool,
    #[serde(default)]
    pub messaging_opted_out_at: Option<DateTime<Utc>>,
}

/// A number owned by the organization that receives inbound SMS.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemPhoneNumber {
    /// Digits only, as cleaned by [`clean_number`].
    pub number: String,
    pub name: String,
    #[serde(default)]
    pub pipeline_id: Option<i64>,
    #[serde(default)]
    pub is_sms_opt_in_out_tracking_disabled: bool,
    #[serde(default)]
    pub is_sms_opt_in_out_auto_reply_suppressed: bool,
}

/// Strip everything but ASCII digits.
pub fn clean_number(number: &str) -> String {
    number.chars().filter(|c| c.is_ascii_digit()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(id: i64, order: i32, active: bool) -> ActionDefinition {
        ActionDefinition {
            id,
            pipeline_id: 1,
            name: format!("action-{id}"),
            component: "reply".into(),
            order,
            is_active: active,
            continue_after_processing: true,
            is_interaction_logged_after_processing: false,
            settings: serde_json::json!({}),
        }
    }

    #[test]
    fn active_actions_sorted_by_order_then_id() {
        let pipeline = PipelineDefinition {
            id: 1,
            name: "Main".into(),
            is_active: true,
            actions: vec![action(5, 2, true), action(3, 1, true), action(2, 2, true), action(1, 0, false)],
        };
        let ids: Vec<i64> = pipeline.active_actions().iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![3, 2, 5]);
    }

    #[test]
    fn clean_number_strips_formatting() {
        assert_eq!(clean_number("+1 (623) 555-3322"), "16235553322");
        assert_eq!(clean_number(""), "");
    }

    #[test]
    fn last_response_prefers_latest() {
        let mut first = ActionOutcome::new("a");
        first.response = Some(SmsResponse::text("one"));
        let middle = ActionOutcome::new("b");
        let mut last = ActionOutcome::new("c");
        last.response = Some(SmsResponse::text("three"));

        let outcomes = vec![first, middle, last];
        assert_eq!(last_response(&outcomes).unwrap().message, "three");
        assert!(last_response(&outcomes[1..2]).is_none());
    }

    #[test]
    fn response_addressed_back_to_sender() {
        let msg = IncomingMessage::new("+15550001111", "+15559990000", "hi");
        let resp = SmsResponse::text("hello").addressed_to(&msg);
        assert_eq!(resp.from_number, "+15559990000");
        assert_eq!(resp.to_number, "+15550001111");
    }

    #[test]
    fn outcome_error_detection() {
        assert!(!ActionOutcome::new("x").has_error());
        assert!(!ActionOutcome::error("x", "  ").has_error());
        assert!(ActionOutcome::error("x", "boom").has_error());
    }

    #[test]
    fn definitions_deserialize_with_defaults() {
        let json = r#"{"id": 1, "name": "Main", "actions": [
            {"id": 1, "pipeline_id": 1, "name": "Hello", "component": "reply", "order": 0}
        ]}"#;
        let pipeline: PipelineDefinition = serde_json::from_str(json).unwrap();
        assert!(pipeline.is_active);
        assert!(pipeline.actions[0].is_active);
        assert!(!pipeline.actions[0].continue_after_processing);
    }
}
