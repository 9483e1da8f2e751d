//! SMS pipeline dispatcher: runs an inbound message through its pipeline.
//!
//! Flow:
//! 1. Sender lookup and consent tracking (storage errors fail the request)
//! 2. Pipeline resolution (missing/inactive → single error outcome)
//! 3. Ordered action loop with per-action error capture
//! 4. Consent confirmation, always last when present

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::actions::ActionRegistry;
use crate::actions::registry::ResolvedAction;
use crate::config::OrganizationConfig;
use crate::error::{ActionError, PipelineError};
use crate::pipeline::catalog::PipelineCatalog;
use crate::pipeline::consent::ConsentTracker;
use crate::pipeline::interaction::{InteractionLogger, PendingInteraction};
use crate::pipeline::keywords::classify;
use crate::pipeline::replies::consent_confirmation;
use crate::pipeline::types::{
    ActionOutcome, IncomingMessage, PipelineDefinition, SmsResponse, clean_number,
};
use crate::store::Database;

/// Outcome name used when the pipeline itself cannot be resolved.
pub const PIPELINE_LOOKUP_ACTION: &str = "Lookup SMS Pipeline";

/// Runs inbound messages through configured pipelines.
pub struct SmsPipelineDispatcher {
    store: Arc<dyn Database>,
    catalog: Arc<PipelineCatalog>,
    registry: Arc<ActionRegistry>,
    consent: ConsentTracker,
    interactions: InteractionLogger,
    organization: OrganizationConfig,
}

impl SmsPipelineDispatcher {
    pub fn new(
        store: Arc<dyn Database>,
        catalog: Arc<PipelineCatalog>,
        registry: Arc<ActionRegistry>,
        interactions: InteractionLogger,
        organization: OrganizationConfig,
    ) -> Self {
        Self {
            consent: ConsentTracker::new(Arc::clone(&store)),
            store,
            catalog,
            registry,
            interactions,
            organization,
        }
    }

    pub fn catalog(&self) -> &Arc<PipelineCatalog> {
        &self.catalog
    }

    /// Process one inbound message.
    ///
    /// `pipeline_id` selects the pipeline; `None` means the lowest-id active
    /// one. The returned outcomes are in execution order; use
    /// [`crate::pipeline::types::last_response`] to pick the reply.
    pub async fn process_incoming_message(
        &self,
        message: &mut IncomingMessage,
        pipeline_id: Option<i64>,
    ) -> Result<Vec<ActionOutcome>, PipelineError> {
        info!(
            from = %message.from_number,
            to = %message.to_number,
            pipeline_id = ?pipeline_id,
            "Processing inbound SMS"
        );

        self.identify_sender(message).await?;
        self.consent
            .track(message)
            .await
            .map_err(PipelineError::ConsentTracking)?;

        let mut outcomes = Vec::new();
        match self.resolve_pipeline(pipeline_id).await {
            Ok(pipeline) => self.run_actions(&pipeline, message, &mut outcomes).await,
            Err(outcome) => {
                error!(
                    error = outcome.error_message.as_deref().unwrap_or_default(),
                    "SMS pipeline lookup failed"
                );
                outcomes.push(outcome);
            }
        }

        if let Some(outcome) = self.consent_outcome(message) {
            outcomes.push(outcome);
        }

        debug!(outcomes = outcomes.len(), "Inbound SMS processed");
        Ok(outcomes)
    }

    /// Attach the sender's person alias from the first stored phone record
    /// that has one.
    async fn identify_sender(&self, message: &mut IncomingMessage) -> Result<(), PipelineError> {
        if message.from_person_alias_id.is_some() {
            return Ok(());
        }
        let cleaned = clean_number(&message.from_number);
        if cleaned.is_empty() {
            return Ok(());
        }
        let records = self
            .store
            .find_phone_numbers(&cleaned)
            .await
            .map_err(PipelineError::SenderLookup)?;
        message.from_person_alias_id = records.iter().find_map(|r| r.person_alias_id);
        Ok(())
    }

    async fn resolve_pipeline(
        &self,
        pipeline_id: Option<i64>,
    ) -> Result<PipelineDefinition, ActionOutcome> {
        let id = match pipeline_id {
            Some(id) => id,
            None => self.catalog.default_pipeline_id().await.ok_or_else(|| {
                ActionOutcome::error(PIPELINE_LOOKUP_ACTION, "No active SMS pipeline is configured.")
            })?,
        };

        let pipeline = self.catalog.get(id).await.ok_or_else(|| {
            ActionOutcome::error(
                PIPELINE_LOOKUP_ACTION,
                format!("The SMS pipeline with id {id} was not found."),
            )
        })?;

        if !pipeline.is_active {
            return Err(ActionOutcome::error(
                PIPELINE_LOOKUP_ACTION,
                format!("The SMS pipeline with id {id} is not active."),
            ));
        }
        Ok(pipeline)
    }

    async fn run_actions(
        &self,
        pipeline: &PipelineDefinition,
        message: &IncomingMessage,
        outcomes: &mut Vec<ActionOutcome>,
    ) {
        for ResolvedAction {
            definition,
            component,
        } in self.registry.resolve(pipeline)
        {
            let Some(component) = component else {
                error!(
                    action = %definition.name,
                    component = %definition.component,
                    "SMS action component is not registered, skipping"
                );
                outcomes.push(ActionOutcome::error(
                    &definition.name,
                    format!("SMS action component '{}' is not registered.", definition.component),
                ));
                continue;
            };

            let mut outcome = ActionOutcome::new(&definition.name);
            let check = component.should_process(&definition, message).await;
            outcome.should_process = check.should_process;
            outcome.error_message = check.error_message;

            if outcome.should_process {
                match component.process(&definition, message).await {
                    Ok(response) => {
                        outcome.error_message = None;
                        outcome.response = response.map(|r| r.addressed_to(message));
                    }
                    Err(ActionError::Reported(reason)) => {
                        outcome.error_message = Some(reason);
                    }
                    Err(e) => {
                        error!(action = %definition.name, error = %e, "SMS action failed");
                        outcome.exception = Some(e.to_string());
                    }
                }

                if definition.is_interaction_logged_after_processing && !outcome.has_error() {
                    self.interactions
                        .log(PendingInteraction::for_action(pipeline, &definition, message));
                }
            }

            if let Some(reason) = outcome.error_message.as_deref().filter(|r| !r.trim().is_empty()) {
                warn!(action = %definition.name, error = %reason, "SMS action reported an error");
            }

            let stop = outcome.should_process && !definition.continue_after_processing;
            debug!(
                action = %definition.name,
                should_process = outcome.should_process,
                responded = outcome.response.is_some(),
                "SMS action evaluated"
            );
            outcomes.push(outcome);
            if stop {
                break;
            }
        }
    }

    /// Confirmation (or misconfiguration error) for a consent keyword.
    fn consent_outcome(&self, message: &IncomingMessage) -> Option<ActionOutcome> {
        let keyword = classify(message.body.as_deref())?;
        if message.suppress_sms_opt_in_out_auto_replies {
            return None;
        }

        if !message.was_opt_in_out_tracking_processed {
            error!(
                to = %message.to_number,
                keyword = keyword.action_name(),
                "Consent keyword received but opt-in/opt-out tracking did not run"
            );
            return Some(ActionOutcome::error(
                keyword.action_name(),
                "SMS opt-in/opt-out tracking was not processed for this message. \
                 Enable tracking for the receiving number or suppress opt-in/opt-out auto replies.",
            ));
        }

        let mut outcome = ActionOutcome::new(keyword.action_name());
        outcome.should_process = true;
        outcome.response = Some(
            SmsResponse::text(consent_confirmation(keyword, &self.organization))
                .addressed_to(message),
        );
        Some(outcome)
    }
}
