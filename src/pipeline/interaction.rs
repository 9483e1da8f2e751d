//! Interaction logger: fire-and-forget records of what pipeline actions did.
//!
//! `log()` never blocks the inbound request: records go onto an unbounded
//! channel drained by a background task. A missing interaction channel or a
//! failed write is reported with `tracing::error!` and the record is dropped.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};
use uuid::Uuid;

use crate::pipeline::types::{ActionDefinition, IncomingMessage, PipelineDefinition};
use crate::store::{Database, InteractionRecord};

/// An interaction waiting for its channel to be resolved.
#[derive(Debug, Clone)]
pub struct PendingInteraction {
    pub component: String,
    pub operation: String,
    pub data: serde_json::Value,
    pub person_alias_id: Option<i64>,
}

impl PendingInteraction {
    /// Describe an action run against a message.
    pub fn for_action(
        pipeline: &PipelineDefinition,
        action: &ActionDefinition,
        message: &IncomingMessage,
    ) -> Self {
        Self {
            component: pipeline.component_label(),
            operation: action.name.clone(),
            data: serde_json::json!({
                "from_number": message.from_number,
                "to_number": message.to_number,
                "body": message.body,
                "attachment_count": message.attachments.len(),
                "pipeline_id": pipeline.id,
                "action_id": action.id,
                "action_name": action.name,
            }),
            person_alias_id: message.from_person_alias_id,
        }
    }
}

/// Handle used by the dispatcher to enqueue interaction records.
#[derive(Clone)]
pub struct InteractionLogger {
    tx: mpsc::UnboundedSender<PendingInteraction>,
}

impl InteractionLogger {
    /// Start the writer task. Records are written to the channel named
    /// `channel_name`, which must already exist in the store.
    pub fn spawn(store: Arc<dyn Database>, channel_name: impl Into<String>) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_writer(store, channel_name.into(), rx));
        (Self { tx }, handle)
    }

    /// Logger that discards everything (for tests and disabled logging).
    pub fn disabled() -> Self {
        let (tx, _rx) = mpsc::unbounded_channel();
        Self { tx }
    }

    /// Queue a record. Never blocks and never fails the caller.
    pub fn log(&self, interaction: PendingInteraction) {
        if self.tx.send(interaction).is_err() {
            debug!("Interaction writer not running, record dropped");
        }
    }
}

async fn run_writer(
    store: Arc<dyn Database>,
    channel_name: String,
    mut rx: mpsc::UnboundedReceiver<PendingInteraction>,
) {
    while let Some(pending) = rx.recv().await {
        let channel_id = match store.find_interaction_channel(&channel_name).await {
            Ok(Some(id)) => id,
            Ok(None) => {
                error!(
                    channel = %channel_name,
                    operation = %pending.operation,
                    "Interaction channel not configured, skipping interaction"
                );
                continue;
            }
            Err(e) => {
                error!(channel = %channel_name, error = %e, "Failed to resolve interaction channel");
                continue;
            }
        };

        let record = InteractionRecord {
            id: Uuid::new_v4().to_string(),
            channel_id,
            component: pending.component,
            operation: pending.operation,
            data: pending.data,
            person_alias_id: pending.person_alias_id,
            created_at: Utc::now(),
        };
        if let Err(e) = store.insert_interaction(&record).await {
            error!(operation = %record.operation, error = %e, "Failed to write interaction");
        } else {
            debug!(operation = %record.operation, component = %record.component, "Interaction logged");
        }
    }
}
