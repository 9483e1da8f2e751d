//! HTTP surface for the SMS gateway.
//!
//! The gateway posts each inbound message as a form to `/sms/inbound` and
//! expects TwiML back. The body of the last response produced by the
//! pipeline becomes the reply; no response yields an empty `<Response/>`.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Form, Json, Router,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use subtle::ConstantTimeEq;
use tracing::{error, info, warn};

use crate::pipeline::SmsPipelineDispatcher;
use crate::pipeline::types::{IncomingMessage, SmsResponse, clean_number, last_response};
use crate::store::Database;

struct WebhookInner {
    dispatcher: Arc<SmsPipelineDispatcher>,
    store: Arc<dyn Database>,
    /// Shared secret expected in the `token` query parameter.
    token: Option<SecretString>,
}

/// Axum handler state (cloneable).
#[derive(Clone)]
pub struct WebhookState {
    inner: Arc<WebhookInner>,
}

impl WebhookState {
    pub fn new(
        dispatcher: Arc<SmsPipelineDispatcher>,
        store: Arc<dyn Database>,
        token: Option<SecretString>,
    ) -> Self {
        Self {
            inner: Arc::new(WebhookInner {
                dispatcher,
                store,
                token,
            }),
        }
    }

    fn authorized(&self, supplied: Option<&str>) -> bool {
        match (&self.inner.token, supplied) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(expected), Some(supplied)) => {
                bool::from(expected.expose_secret().as_bytes().ct_eq(supplied.as_bytes()))
            }
        }
    }
}

/// Build the Axum router with the SMS webhook routes.
pub fn sms_routes(state: WebhookState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/sms/inbound", post(inbound_sms))
        .route("/sms/pipelines/refresh", post(refresh_pipelines))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
struct InboundQuery {
    pipeline: Option<i64>,
    token: Option<String>,
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health(State(state): State<WebhookState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "sms-responder",
        "pipelines": state.inner.dispatcher.catalog().len().await,
    }))
}

// ── Inbound ─────────────────────────────────────────────────────────────

async fn inbound_sms(
    State(state): State<WebhookState>,
    Query(query): Query<InboundQuery>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    if !state.authorized(query.token.as_deref()) {
        warn!("Rejected inbound SMS with a bad webhook token");
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let mut message = match message_from_form(&form) {
        Some(message) => message,
        None => {
            return (StatusCode::BAD_REQUEST, "missing From or To").into_response();
        }
    };

    let mut pipeline_id = query.pipeline;
    match state
        .inner
        .store
        .get_system_phone_number(&clean_number(&message.to_number))
        .await
    {
        Ok(Some(system)) => {
            pipeline_id = pipeline_id.or(system.pipeline_id);
            message = message.with_system_number(&system);
        }
        Ok(None) => {
            info!(to = %message.to_number, "Inbound SMS to an unregistered system number");
        }
        Err(e) => {
            error!(to = %message.to_number, error = %e, "System phone number lookup failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }

    let outcomes = match state
        .inner
        .dispatcher
        .process_incoming_message(&mut message, pipeline_id)
        .await
    {
        Ok(outcomes) => outcomes,
        Err(e) => {
            error!(from = %message.from_number, error = %e, "Inbound SMS processing failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    for outcome in outcomes.iter().filter(|o| o.has_error()) {
        warn!(
            action = %outcome.action_name,
            error = outcome.error_message.as_deref().unwrap_or_default(),
            exception = outcome.exception.as_deref().unwrap_or_default(),
            "SMS action outcome has an error"
        );
    }

    twiml_response(last_response(&outcomes))
}

/// Build an [`IncomingMessage`] from the gateway's form fields.
fn message_from_form(form: &HashMap<String, String>) -> Option<IncomingMessage> {
    let from = form.get("From").filter(|v| !v.trim().is_empty())?;
    let to = form.get("To").filter(|v| !v.trim().is_empty())?;

    let media_count = form
        .get("NumMedia")
        .and_then(|n| n.trim().parse::<usize>().ok())
        .unwrap_or(0);
    let attachments = (0..media_count)
        .filter_map(|i| form.get(&format!("MediaUrl{i}")).cloned())
        .collect();

    Some(IncomingMessage {
        from_number: from.trim().to_string(),
        to_number: to.trim().to_string(),
        body: form.get("Body").cloned(),
        attachments,
        ..Default::default()
    })
}

fn twiml_response(response: Option<&SmsResponse>) -> Response {
    ([(header::CONTENT_TYPE, "application/xml")], render_twiml(response)).into_response()
}

/// Render a TwiML document for an optional reply.
pub fn render_twiml(response: Option<&SmsResponse>) -> String {
    let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    let Some(response) = response else {
        xml.push_str("<Response/>");
        return xml;
    };

    xml.push_str("<Response><Message>");
    if response.attachments.is_empty() {
        xml.push_str(&xml_escape(&response.message));
    } else {
        xml.push_str("<Body>");
        xml.push_str(&xml_escape(&response.message));
        xml.push_str("</Body>");
        for url in &response.attachments {
            xml.push_str("<Media>");
            xml.push_str(&xml_escape(url));
            xml.push_str("</Media>");
        }
    }
    xml.push_str("</Message></Response>");
    xml
}

fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

// ── Catalog ─────────────────────────────────────────────────────────────

async fn refresh_pipelines(
    State(state): State<WebhookState>,
    Query(query): Query<InboundQuery>,
) -> impl IntoResponse {
    if !state.authorized(query.token.as_deref()) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"error": "Invalid token"})),
        );
    }

    let catalog = state.inner.dispatcher.catalog();
    match catalog.refresh(state.inner.store.as_ref()).await {
        Ok(()) => {
            let count = catalog.len().await;
            (
                StatusCode::OK,
                Json(serde_json::json!({"status": "refreshed", "pipelines": count})),
            )
        }
        Err(e) => {
            error!(error = %e, "Pipeline catalog refresh failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "Failed to reload pipelines"})),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn form_with_media() {
        let msg = message_from_form(&form(&[
            ("From", "+16235553322"),
            ("To", "+16235550100"),
            ("Body", "see photo"),
            ("NumMedia", "2"),
            ("MediaUrl0", "https://media.example/0"),
            ("MediaUrl1", "https://media.example/1"),
        ]))
        .unwrap();

        assert_eq!(msg.from_number, "+16235553322");
        assert_eq!(msg.body.as_deref(), Some("see photo"));
        assert_eq!(msg.attachments.len(), 2);
        assert!(!msg.was_opt_in_out_tracking_processed);
    }

    #[test]
    fn form_without_body_or_sender() {
        let msg = message_from_form(&form(&[("From", "+1"), ("To", "+2")])).unwrap();
        assert!(msg.body.is_none());
        assert!(msg.attachments.is_empty());

        assert!(message_from_form(&form(&[("To", "+2"), ("Body", "hi")])).is_none());
        assert!(message_from_form(&form(&[("From", " "), ("To", "+2")])).is_none());
    }

    #[tokio::test]
    async fn token_check() {
        use crate::actions::ActionRegistry;
        use crate::config::OrganizationConfig;
        use crate::pipeline::{InteractionLogger, PipelineCatalog};
        use crate::store::LibSqlBackend;

        let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let dispatcher = Arc::new(SmsPipelineDispatcher::new(
            Arc::clone(&db),
            Arc::new(PipelineCatalog::from_definitions(Vec::new())),
            Arc::new(ActionRegistry::new()),
            InteractionLogger::disabled(),
            OrganizationConfig::default(),
        ));

        let open = WebhookState::new(Arc::clone(&dispatcher), Arc::clone(&db), None);
        assert!(open.authorized(None));
        assert!(open.authorized(Some("anything")));

        let guarded = WebhookState::new(dispatcher, db, Some(SecretString::from("s3cret".to_string())));
        assert!(guarded.authorized(Some("s3cret")));
        assert!(!guarded.authorized(Some("s3cre")));
        assert!(!guarded.authorized(Some("s3cret!")));
        assert!(!guarded.authorized(Some("S3CRET")));
        assert!(!guarded.authorized(Some("")));
        assert!(!guarded.authorized(None));
    }

    #[test]
    fn empty_twiml() {
        assert_eq!(
            render_twiml(None),
            r#"<?xml version="1.0" encoding="UTF-8"?><Response/>"#
        );
    }

    #[test]
    fn twiml_escapes_message() {
        let xml = render_twiml(Some(&SmsResponse::text("Tom & Jerry <3")));
        assert!(xml.ends_with("<Response><Message>Tom &amp; Jerry &lt;3</Message></Response>"));
    }

    #[test]
    fn twiml_with_media() {
        let mut response = SmsResponse::text("map");
        response.attachments = vec!["https://x.example/m?a=1&b=2".into()];
        let xml = render_twiml(Some(&response));
        assert!(xml.contains("<Body>map</Body><Media>https://x.example/m?a=1&amp;b=2</Media>"));
    }
}
