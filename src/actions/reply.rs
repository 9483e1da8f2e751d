//! Reply action: answers messages that match configured phrases.

use std::collections::HashMap;

use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::actions::{ProcessCheck, SmsAction, parse_settings, render_template};
use crate::error::ActionError;
use crate::pipeline::types::{ActionDefinition, IncomingMessage, SmsResponse};

/// How a phrase is compared with the message body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    #[default]
    Exact,
    Contains,
    StartsWith,
    Regex,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplySettings {
    #[serde(default)]
    pub phrases: Vec<String>,
    #[serde(default)]
    pub match_type: MatchType,
    #[serde(default)]
    pub case_sensitive: bool,
    /// Template for the reply; supports `{from}`, `{to}`, `{body}`.
    #[serde(default)]
    pub response: String,
}

impl ReplySettings {
    /// Whether any phrase matches the trimmed body. For `regex` matching the
    /// compiled phrases are passed in as `patterns`.
    pub fn matches(&self, body: &str, patterns: &[Regex]) -> Result<bool, String> {
        if self.phrases.iter().all(|p| p.trim().is_empty()) {
            return Err("no phrases configured".into());
        }
        let body = body.trim();

        if self.match_type == MatchType::Regex {
            return Ok(patterns.iter().any(|regex| regex.is_match(body)));
        }

        let fold = |s: &str| {
            if self.case_sensitive {
                s.to_string()
            } else {
                s.to_lowercase()
            }
        };
        let body = fold(body);
        Ok(self
            .phrases
            .iter()
            .map(|p| fold(p.trim()))
            .filter(|p| !p.is_empty())
            .any(|phrase| match self.match_type {
                MatchType::Exact => body == phrase,
                MatchType::Contains => body.contains(&phrase),
                MatchType::StartsWith => body.starts_with(&phrase),
                MatchType::Regex => false,
            }))
    }

    /// Compile every non-blank phrase as a regex.
    pub fn compile_patterns(&self) -> Result<Vec<Regex>, String> {
        self.phrases
            .iter()
            .filter(|p| !p.trim().is_empty())
            .map(|p| compile(p, self.case_sensitive))
            .collect()
    }
}

fn compile(pattern: &str, case_sensitive: bool) -> Result<Regex, String> {
    RegexBuilder::new(pattern)
        .case_insensitive(!case_sensitive)
        .build()
        .map_err(|e| format!("invalid pattern '{pattern}': {e}"))
}

/// Keyword/phrase auto-reply.
///
/// Compiled regex phrases are cached by pattern and case mode, so a pipeline
/// compiles each pattern once for the life of the process.
#[derive(Default)]
pub struct ReplyAction {
    patterns: RwLock<HashMap<(String, bool), Regex>>,
}

impl ReplyAction {
    pub fn new() -> Self {
        Self::default()
    }

    async fn compiled(&self, settings: &ReplySettings) -> Result<Vec<Regex>, String> {
        if settings.match_type != MatchType::Regex {
            return Ok(Vec::new());
        }

        let mut compiled = Vec::new();
        for phrase in settings.phrases.iter().filter(|p| !p.trim().is_empty()) {
            let key = (phrase.clone(), settings.case_sensitive);
            if let Some(regex) = self.patterns.read().await.get(&key) {
                compiled.push(regex.clone());
                continue;
            }
            let regex = compile(phrase, settings.case_sensitive)?;
            self.patterns.write().await.insert(key, regex.clone());
            compiled.push(regex);
        }
        Ok(compiled)
    }
}

#[async_trait]
impl SmsAction for ReplyAction {
    fn component(&self) -> &str {
        "reply"
    }

    async fn should_process(
        &self,
        definition: &ActionDefinition,
        message: &IncomingMessage,
    ) -> ProcessCheck {
        let settings: ReplySettings = match parse_settings(definition) {
            Ok(s) => s,
            Err(e) => return ProcessCheck::error(e.to_string()),
        };
        let patterns = match self.compiled(&settings).await {
            Ok(patterns) => patterns,
            Err(reason) => return ProcessCheck::error(format!("{}: {reason}", definition.name)),
        };
        match settings.matches(message.text(), &patterns) {
            Ok(true) => ProcessCheck::yes(),
            Ok(false) => ProcessCheck::no(),
            Err(reason) => ProcessCheck::error(format!("{}: {reason}", definition.name)),
        }
    }

    async fn process(
        &self,
        definition: &ActionDefinition,
        message: &IncomingMessage,
    ) -> Result<Option<SmsResponse>, ActionError> {
        let settings: ReplySettings = parse_settings(definition)?;
        if settings.response.trim().is_empty() {
            return Err(ActionError::Reported(format!(
                "{}: no response configured",
                definition.name
            )));
        }
        let text = render_template(&settings.response, message);
        debug!(action = %definition.name, "Reply action matched");
        Ok(Some(SmsResponse::text(text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(settings: serde_json::Value) -> ActionDefinition {
        ActionDefinition {
            id: 1,
            pipeline_id: 1,
            name: "Hours".into(),
            component: "reply".into(),
            order: 0,
            is_active: true,
            continue_after_processing: false,
            is_interaction_logged_after_processing: false,
            settings,
        }
    }

    fn settings(match_type: MatchType, phrases: &[&str]) -> ReplySettings {
        ReplySettings {
            phrases: phrases.iter().map(|p| p.to_string()).collect(),
            match_type,
            case_sensitive: false,
            response: "ok".into(),
        }
    }

    #[test]
    fn exact_match_ignores_case_and_whitespace() {
        let s = settings(MatchType::Exact, &["Hours"]);
        assert!(s.matches("  hours ", &[]).unwrap());
        assert!(!s.matches("hours please", &[]).unwrap());
    }

    #[test]
    fn contains_and_starts_with() {
        assert!(settings(MatchType::Contains, &["service"]).matches("When is SERVICE?", &[]).unwrap());
        assert!(
            settings(MatchType::StartsWith, &["pray"])
                .matches("Prayer request: Bob", &[])
                .unwrap()
        );
        assert!(!settings(MatchType::StartsWith, &["pray"]).matches("please pray", &[]).unwrap());
    }

    #[test]
    fn case_sensitive_exact() {
        let mut s = settings(MatchType::Exact, &["HELP"]);
        s.case_sensitive = true;
        assert!(s.matches("HELP", &[]).unwrap());
        assert!(!s.matches("help", &[]).unwrap());
    }

    #[test]
    fn regex_match() {
        let s = settings(MatchType::Regex, &[r"^give\s+\d+$"]);
        let patterns = s.compile_patterns().unwrap();
        assert!(s.matches("GIVE 25", &patterns).unwrap());
        assert!(!s.matches("give money", &patterns).unwrap());
    }

    #[test]
    fn invalid_regex_is_an_error() {
        assert!(settings(MatchType::Regex, &["(unclosed"]).compile_patterns().is_err());
    }

    #[test]
    fn no_phrases_is_an_error() {
        assert!(settings(MatchType::Exact, &[]).matches("x", &[]).is_err());
        assert!(settings(MatchType::Exact, &["  "]).matches("x", &[]).is_err());
    }

    #[tokio::test]
    async fn should_process_and_reply() {
        let def = definition(serde_json::json!({
            "phrases": ["hours"],
            "response": "Hi {from}, we are open 9-5."
        }));
        let msg = IncomingMessage::new("+15550001111", "+15559990000", "HOURS");

        assert_eq!(ReplyAction::new().should_process(&def, &msg).await, ProcessCheck::yes());
        let reply = ReplyAction::new().process(&def, &msg).await.unwrap().unwrap();
        assert_eq!(reply.message, "Hi +15550001111, we are open 9-5.");
    }

    #[tokio::test]
    async fn should_process_reports_bad_settings() {
        let def = definition(serde_json::json!({"phrases": "not a list"}));
        let msg = IncomingMessage::new("a", "b", "hours");
        let check = ReplyAction::new().should_process(&def, &msg).await;
        assert!(!check.should_process);
        assert!(check.error_message.unwrap().contains("Invalid settings"));
    }

    #[tokio::test]
    async fn regex_phrases_compile_once() {
        let action = ReplyAction::new();
        let def = definition(serde_json::json!({
            "phrases": [r"^give\s+\d+$", "  "],
            "match_type": "regex",
            "response": "Thank you!"
        }));

        for body in ["give 10", "GIVE 25", "give money"] {
            action.should_process(&def, &IncomingMessage::new("a", "b", body)).await;
        }
        assert_eq!(action.patterns.read().await.len(), 1);

        let check = action
            .should_process(&def, &IncomingMessage::new("a", "b", "give 5"))
            .await;
        assert!(check.should_process);
    }

    #[tokio::test]
    async fn invalid_regex_is_reported_by_should_process() {
        let def = definition(serde_json::json!({
            "phrases": ["(unclosed"],
            "match_type": "regex",
            "response": "x"
        }));
        let check = ReplyAction::new()
            .should_process(&def, &IncomingMessage::new("a", "b", "x"))
            .await;
        assert!(!check.should_process);
        assert!(check.error_message.unwrap().contains("invalid pattern"));
    }

    #[tokio::test]
    async fn process_without_response_is_reported() {
        let def = definition(serde_json::json!({"phrases": ["hours"]}));
        let msg = IncomingMessage::new("a", "b", "hours");
        let err = ReplyAction::new().process(&def, &msg).await.unwrap_err();
        assert!(matches!(err, ActionError::Reported(_)));
    }
}
