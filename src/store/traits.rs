//! Unified `Database` trait: single async interface for all persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::DatabaseError;
use crate::pipeline::types::{
    ActionDefinition, PhoneNumberRecord, PipelineDefinition, SystemPhoneNumber,
};

/// A structured record of something an action did.
#[derive(Debug, Clone)]
pub struct InteractionRecord {
    pub id: String,
    pub channel_id: i64,
    /// Pipeline name and id, e.g. "Main (1)".
    pub component: String,
    /// Action name.
    pub operation: String,
    pub data: serde_json::Value,
    pub person_alias_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// An inbound SMS kept as part of a conversation.
#[derive(Debug, Clone)]
pub struct ConversationMessage {
    pub id: String,
    pub from_number: String,
    pub to_number: String,
    pub person_alias_id: Option<i64>,
    pub body: String,
    pub attachments: Vec<String>,
    pub received_at: DateTime<Utc>,
}

/// Backend-agnostic database trait covering pipelines, consent, and logging.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn init_schema(&self) -> Result<(), DatabaseError>;

    // ── Pipelines ───────────────────────────────────────────────────

    /// Insert or replace a pipeline row (actions are stored separately).
    async fn upsert_pipeline(&self, pipeline: &PipelineDefinition) -> Result<(), DatabaseError>;

    /// Insert or replace an action row.
    async fn upsert_action(&self, action: &ActionDefinition) -> Result<(), DatabaseError>;

    /// All pipelines with their actions, ordered by id.
    async fn list_pipelines(&self) -> Result<Vec<PipelineDefinition>, DatabaseError>;

    // ── Phone numbers ───────────────────────────────────────────────

    /// Insert a phone record. Returns the generated id.
    async fn insert_phone_number(
        &self,
        person_alias_id: Option<i64>,
        number: &str,
        country_code: &str,
    ) -> Result<i64, DatabaseError>;

    /// Records whose `number` or `full_number` equals the cleaned number.
    async fn find_phone_numbers(
        &self,
        cleaned_number: &str,
    ) -> Result<Vec<PhoneNumberRecord>, DatabaseError>;

    async fn get_phone_number(&self, id: i64) -> Result<Option<PhoneNumberRecord>, DatabaseError>;

    /// Persist the consent flags of a phone record.
    async fn update_phone_consent(&self, record: &PhoneNumberRecord) -> Result<(), DatabaseError>;

    // ── System phone numbers ────────────────────────────────────────

    async fn upsert_system_phone_number(
        &self,
        number: &SystemPhoneNumber,
    ) -> Result<(), DatabaseError>;

    async fn get_system_phone_number(
        &self,
        cleaned_number: &str,
    ) -> Result<Option<SystemPhoneNumber>, DatabaseError>;

    // ── Interactions ────────────────────────────────────────────────

    /// Create an interaction channel, returning its id. Existing names are reused.
    async fn ensure_interaction_channel(&self, name: &str) -> Result<i64, DatabaseError>;

    async fn find_interaction_channel(&self, name: &str) -> Result<Option<i64>, DatabaseError>;

    async fn insert_interaction(&self, record: &InteractionRecord) -> Result<(), DatabaseError>;

    async fn list_interactions(
        &self,
        channel_id: i64,
    ) -> Result<Vec<InteractionRecord>, DatabaseError>;

    // ── Conversations ───────────────────────────────────────────────

    async fn add_conversation_message(
        &self,
        message: &ConversationMessage,
    ) -> Result<(), DatabaseError>;

    /// Messages exchanged with a number, oldest first.
    async fn list_conversation_messages(
        &self,
        from_number: &str,
    ) -> Result<Vec<ConversationMessage>, DatabaseError>;
}
