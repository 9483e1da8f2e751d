//! libSQL backend: async `Database` trait implementation.
//!
//! Supports local file and in-memory databases.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::pipeline::types::{
    ActionDefinition, PhoneNumberRecord, PipelineDefinition, SystemPhoneNumber, clean_number,
};
use crate::store::migrations;
use crate::store::traits::{ConversationMessage, Database, InteractionRecord};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db)?;
        backend.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let backend = Self::from_database(db)?;
        backend.init_schema().await?;
        Ok(backend)
    }

    fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn query_err(e: libsql::Error) -> DatabaseError {
    DatabaseError::Query(e.to_string())
}

fn opt_int(v: Option<i64>) -> libsql::Value {
    match v {
        Some(v) => libsql::Value::Integer(v),
        None => libsql::Value::Null,
    }
}

fn opt_text(s: Option<String>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s),
        None => libsql::Value::Null,
    }
}

fn flag(row: &libsql::Row, idx: i32) -> Result<bool, libsql::Error> {
    Ok(row.get::<i64>(idx)? != 0)
}

const PHONE_COLUMNS: &str = "id, person_alias_id, number, full_number, is_messaging_enabled, is_messaging_opted_out, messaging_opted_out_at";

const ACTION_COLUMNS: &str = "id, pipeline_id, name, component, sort_order, is_active, continue_after_processing, is_interaction_logged, settings";

/// Map a libsql Row to a PhoneNumberRecord (column order: PHONE_COLUMNS).
fn row_to_phone(row: &libsql::Row) -> Result<PhoneNumberRecord, libsql::Error> {
    let opted_out_at: Option<String> = row.get(6).ok();
    Ok(PhoneNumberRecord {
        id: row.get(0)?,
        person_alias_id: row.get(1).ok(),
        number: row.get(2)?,
        full_number: row.get(3)?,
        is_messaging_enabled: flag(row, 4)?,
        is_messaging_opted_out: flag(row, 5)?,
        messaging_opted_out_at: opted_out_at.as_deref().map(parse_datetime),
    })
}

/// Map a libsql Row to an ActionDefinition (column order: ACTION_COLUMNS).
fn row_to_action(row: &libsql::Row) -> Result<ActionDefinition, DatabaseError> {
    let settings_str: String = row.get(8).map_err(query_err)?;
    let settings = serde_json::from_str(&settings_str)
        .map_err(|e| DatabaseError::Serialization(format!("action settings: {e}")))?;
    Ok(ActionDefinition {
        id: row.get(0).map_err(query_err)?,
        pipeline_id: row.get(1).map_err(query_err)?,
        name: row.get(2).map_err(query_err)?,
        component: row.get(3).map_err(query_err)?,
        order: row.get::<i64>(4).map_err(query_err)? as i32,
        is_active: flag(row, 5).map_err(query_err)?,
        continue_after_processing: flag(row, 6).map_err(query_err)?,
        is_interaction_logged_after_processing: flag(row, 7).map_err(query_err)?,
        settings,
    })
}

fn row_to_conversation(row: &libsql::Row) -> Result<ConversationMessage, DatabaseError> {
    let attachments_str: String = row.get(5).map_err(query_err)?;
    let received_str: String = row.get(6).map_err(query_err)?;
    Ok(ConversationMessage {
        id: row.get(0).map_err(query_err)?,
        from_number: row.get(1).map_err(query_err)?,
        to_number: row.get(2).map_err(query_err)?,
        person_alias_id: row.get(3).ok(),
        body: row.get(4).map_err(query_err)?,
        attachments: serde_json::from_str(&attachments_str).unwrap_or_default(),
        received_at: parse_datetime(&received_str),
    })
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl Database for LibSqlBackend {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Pipelines ───────────────────────────────────────────────────

    async fn upsert_pipeline(&self, pipeline: &PipelineDefinition) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO sms_pipelines (id, name, is_active) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET name = excluded.name, is_active = excluded.is_active",
                params![pipeline.id, pipeline.name.clone(), pipeline.is_active as i64],
            )
            .await
            .map_err(query_err)?;
        debug!(pipeline_id = pipeline.id, name = %pipeline.name, "Pipeline saved");
        Ok(())
    }

    async fn upsert_action(&self, action: &ActionDefinition) -> Result<(), DatabaseError> {
        let settings = serde_json::to_string(&action.settings)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        self.conn()
            .execute(
                "INSERT INTO sms_actions (id, pipeline_id, name, component, sort_order, is_active, continue_after_processing, is_interaction_logged, settings)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(id) DO UPDATE SET
                    pipeline_id = excluded.pipeline_id,
                    name = excluded.name,
                    component = excluded.component,
                    sort_order = excluded.sort_order,
                    is_active = excluded.is_active,
                    continue_after_processing = excluded.continue_after_processing,
                    is_interaction_logged = excluded.is_interaction_logged,
                    settings = excluded.settings",
                params![
                    action.id,
                    action.pipeline_id,
                    action.name.clone(),
                    action.component.clone(),
                    action.order as i64,
                    action.is_active as i64,
                    action.continue_after_processing as i64,
                    action.is_interaction_logged_after_processing as i64,
                    settings,
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn list_pipelines(&self) -> Result<Vec<PipelineDefinition>, DatabaseError> {
        let conn = self.conn();

        let mut actions_by_pipeline: HashMap<i64, Vec<ActionDefinition>> = HashMap::new();
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {ACTION_COLUMNS} FROM sms_actions ORDER BY pipeline_id, sort_order, id"
                ),
                (),
            )
            .await
            .map_err(query_err)?;
        while let Some(row) = rows.next().await.map_err(query_err)? {
            let action = row_to_action(&row)?;
            actions_by_pipeline
                .entry(action.pipeline_id)
                .or_default()
                .push(action);
        }

        let mut pipelines = Vec::new();
        let mut rows = conn
            .query("SELECT id, name, is_active FROM sms_pipelines ORDER BY id", ())
            .await
            .map_err(query_err)?;
        while let Some(row) = rows.next().await.map_err(query_err)? {
            let id: i64 = row.get(0).map_err(query_err)?;
            pipelines.push(PipelineDefinition {
                id,
                name: row.get(1).map_err(query_err)?,
                is_active: flag(&row, 2).map_err(query_err)?,
                actions: actions_by_pipeline.remove(&id).unwrap_or_default(),
            });
        }
        Ok(pipelines)
    }

    // ── Phone numbers ───────────────────────────────────────────────

    async fn insert_phone_number(
        &self,
        person_alias_id: Option<i64>,
        number: &str,
        country_code: &str,
    ) -> Result<i64, DatabaseError> {
        let number = clean_number(number);
        let full_number = format!("{}{}", clean_number(country_code), number);
        let mut rows = self
            .conn()
            .query(
                "INSERT INTO phone_numbers (person_alias_id, number, full_number) VALUES (?1, ?2, ?3) RETURNING id",
                params![opt_int(person_alias_id), number, full_number],
            )
            .await
            .map_err(query_err)?;
        let row = rows
            .next()
            .await
            .map_err(query_err)?
            .ok_or_else(|| DatabaseError::Query("INSERT returned no id".into()))?;
        row.get(0).map_err(query_err)
    }

    async fn find_phone_numbers(
        &self,
        cleaned_number: &str,
    ) -> Result<Vec<PhoneNumberRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {PHONE_COLUMNS} FROM phone_numbers WHERE number = ?1 OR full_number = ?1 ORDER BY id"
                ),
                params![cleaned_number],
            )
            .await
            .map_err(query_err)?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().await.map_err(query_err)? {
            records.push(row_to_phone(&row).map_err(query_err)?);
        }
        Ok(records)
    }

    async fn get_phone_number(&self, id: i64) -> Result<Option<PhoneNumberRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {PHONE_COLUMNS} FROM phone_numbers WHERE id = ?1"),
                params![id],
            )
            .await
            .map_err(query_err)?;
        match rows.next().await.map_err(query_err)? {
            Some(row) => Ok(Some(row_to_phone(&row).map_err(query_err)?)),
            None => Ok(None),
        }
    }

    async fn update_phone_consent(&self, record: &PhoneNumberRecord) -> Result<(), DatabaseError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE phone_numbers SET is_messaging_enabled = ?1, is_messaging_opted_out = ?2, messaging_opted_out_at = ?3 WHERE id = ?4",
                params![
                    record.is_messaging_enabled as i64,
                    record.is_messaging_opted_out as i64,
                    opt_text(record.messaging_opted_out_at.map(|t| t.to_rfc3339())),
                    record.id,
                ],
            )
            .await
            .map_err(query_err)?;
        if affected == 0 {
            return Err(DatabaseError::NotFound {
                entity: "phone_number".into(),
                id: record.id.to_string(),
            });
        }
        Ok(())
    }

    // ── System phone numbers ────────────────────────────────────────

    async fn upsert_system_phone_number(
        &self,
        number: &SystemPhoneNumber,
    ) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO system_phone_numbers (number, name, pipeline_id, tracking_disabled, auto_reply_suppressed)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(number) DO UPDATE SET
                    name = excluded.name,
                    pipeline_id = excluded.pipeline_id,
                    tracking_disabled = excluded.tracking_disabled,
                    auto_reply_suppressed = excluded.auto_reply_suppressed",
                params![
                    clean_number(&number.number),
                    number.name.clone(),
                    opt_int(number.pipeline_id),
                    number.is_sms_opt_in_out_tracking_disabled as i64,
                    number.is_sms_opt_in_out_auto_reply_suppressed as i64,
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn get_system_phone_number(
        &self,
        cleaned_number: &str,
    ) -> Result<Option<SystemPhoneNumber>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT number, name, pipeline_id, tracking_disabled, auto_reply_suppressed FROM system_phone_numbers WHERE number = ?1",
                params![cleaned_number],
            )
            .await
            .map_err(query_err)?;
        let Some(row) = rows.next().await.map_err(query_err)? else {
            return Ok(None);
        };
        Ok(Some(SystemPhoneNumber {
            number: row.get(0).map_err(query_err)?,
            name: row.get(1).map_err(query_err)?,
            pipeline_id: row.get(2).ok(),
            is_sms_opt_in_out_tracking_disabled: flag(&row, 3).map_err(query_err)?,
            is_sms_opt_in_out_auto_reply_suppressed: flag(&row, 4).map_err(query_err)?,
        }))
    }

    // ── Interactions ────────────────────────────────────────────────

    async fn ensure_interaction_channel(&self, name: &str) -> Result<i64, DatabaseError> {
        self.conn()
            .execute(
                "INSERT OR IGNORE INTO interaction_channels (name) VALUES (?1)",
                params![name],
            )
            .await
            .map_err(query_err)?;
        self.find_interaction_channel(name)
            .await?
            .ok_or_else(|| DatabaseError::NotFound {
                entity: "interaction_channel".into(),
                id: name.to_string(),
            })
    }

    async fn find_interaction_channel(&self, name: &str) -> Result<Option<i64>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id FROM interaction_channels WHERE name = ?1",
                params![name],
            )
            .await
            .map_err(query_err)?;
        match rows.next().await.map_err(query_err)? {
            Some(row) => Ok(Some(row.get(0).map_err(query_err)?)),
            None => Ok(None),
        }
    }

    async fn insert_interaction(&self, record: &InteractionRecord) -> Result<(), DatabaseError> {
        let data = serde_json::to_string(&record.data)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        self.conn()
            .execute(
                "INSERT INTO interactions (id, channel_id, component, operation, data, person_alias_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.id.clone(),
                    record.channel_id,
                    record.component.clone(),
                    record.operation.clone(),
                    data,
                    opt_int(record.person_alias_id),
                    record.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn list_interactions(
        &self,
        channel_id: i64,
    ) -> Result<Vec<InteractionRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, channel_id, component, operation, data, person_alias_id, created_at
                 FROM interactions WHERE channel_id = ?1 ORDER BY created_at, rowid",
                params![channel_id],
            )
            .await
            .map_err(query_err)?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().await.map_err(query_err)? {
            let data_str: String = row.get(4).map_err(query_err)?;
            let created_str: String = row.get(6).map_err(query_err)?;
            records.push(InteractionRecord {
                id: row.get(0).map_err(query_err)?,
                channel_id: row.get(1).map_err(query_err)?,
                component: row.get(2).map_err(query_err)?,
                operation: row.get(3).map_err(query_err)?,
                data: serde_json::from_str(&data_str)
                    .map_err(|e| DatabaseError::Serialization(e.to_string()))?,
                person_alias_id: row.get(5).ok(),
                created_at: parse_datetime(&created_str),
            });
        }
        Ok(records)
    }

    // ── Conversations ───────────────────────────────────────────────

    async fn add_conversation_message(
        &self,
        message: &ConversationMessage,
    ) -> Result<(), DatabaseError> {
        let attachments = serde_json::to_string(&message.attachments)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        self.conn()
            .execute(
                "INSERT INTO sms_conversation_messages (id, from_number, to_number, person_alias_id, body, attachments, received_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    message.id.clone(),
                    message.from_number.clone(),
                    message.to_number.clone(),
                    opt_int(message.person_alias_id),
                    message.body.clone(),
                    attachments,
                    message.received_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn list_conversation_messages(
        &self,
        from_number: &str,
    ) -> Result<Vec<ConversationMessage>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, from_number, to_number, person_alias_id, body, attachments, received_at
                 FROM sms_conversation_messages WHERE from_number = ?1 ORDER BY received_at, rowid",
                params![from_number],
            )
            .await
            .map_err(query_err)?;

        let mut messages = Vec::new();
        while let Some(row) = rows.next().await.map_err(query_err)? {
            messages.push(row_to_conversation(&row)?);
        }
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    async fn test_db() -> LibSqlBackend {
        LibSqlBackend::new_memory().await.unwrap()
    }

    fn pipeline(id: i64, active: bool) -> PipelineDefinition {
        PipelineDefinition {
            id,
            name: format!("Pipeline {id}"),
            is_active: active,
            actions: Vec::new(),
        }
    }

    fn action(id: i64, pipeline_id: i64, order: i32) -> ActionDefinition {
        ActionDefinition {
            id,
            pipeline_id,
            name: format!("Action {id}"),
            component: "reply".into(),
            order,
            is_active: true,
            continue_after_processing: false,
            is_interaction_logged_after_processing: true,
            settings: serde_json::json!({"phrases": ["hi"], "response": "hello"}),
        }
    }

    #[tokio::test]
    async fn pipelines_round_trip_with_ordered_actions() {
        let db = test_db().await;
        db.upsert_pipeline(&pipeline(2, false)).await.unwrap();
        db.upsert_pipeline(&pipeline(1, true)).await.unwrap();
        db.upsert_action(&action(10, 1, 5)).await.unwrap();
        db.upsert_action(&action(11, 1, 1)).await.unwrap();
        db.upsert_action(&action(12, 2, 0)).await.unwrap();

        let pipelines = db.list_pipelines().await.unwrap();
        assert_eq!(pipelines.len(), 2);
        assert_eq!(pipelines[0].id, 1);
        assert!(pipelines[0].is_active);
        let ids: Vec<i64> = pipelines[0].actions.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![11, 10]);
        assert!(!pipelines[1].is_active);
        assert_eq!(pipelines[1].actions.len(), 1);
        assert_eq!(pipelines[0].actions[0].settings["response"], "hello");
        assert!(pipelines[0].actions[0].is_interaction_logged_after_processing);
    }

    #[tokio::test]
    async fn upsert_pipeline_updates_in_place() {
        let db = test_db().await;
        db.upsert_pipeline(&pipeline(1, true)).await.unwrap();
        let mut renamed = pipeline(1, false);
        renamed.name = "Renamed".into();
        db.upsert_pipeline(&renamed).await.unwrap();

        let pipelines = db.list_pipelines().await.unwrap();
        assert_eq!(pipelines.len(), 1);
        assert_eq!(pipelines[0].name, "Renamed");
        assert!(!pipelines[0].is_active);
    }

    #[tokio::test]
    async fn phone_numbers_match_number_or_full_number() {
        let db = test_db().await;
        let local = db.insert_phone_number(Some(7), "(623) 555-3322", "1").await.unwrap();
        let other = db.insert_phone_number(None, "623-555-9999", "1").await.unwrap();

        let by_full = db.find_phone_numbers("16235553322").await.unwrap();
        assert_eq!(by_full.len(), 1);
        assert_eq!(by_full[0].id, local);
        assert_eq!(by_full[0].person_alias_id, Some(7));
        assert!(by_full[0].is_messaging_enabled);

        let by_number = db.find_phone_numbers("6235559999").await.unwrap();
        assert_eq!(by_number[0].id, other);
        assert!(by_number[0].person_alias_id.is_none());

        assert!(db.find_phone_numbers("15550000000").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn consent_update_persists() {
        let db = test_db().await;
        let id = db.insert_phone_number(None, "6235553322", "1").await.unwrap();
        let mut record = db.get_phone_number(id).await.unwrap().unwrap();
        record.is_messaging_enabled = false;
        record.is_messaging_opted_out = true;
        record.messaging_opted_out_at = Some(Utc::now());
        db.update_phone_consent(&record).await.unwrap();

        let fetched = db.get_phone_number(id).await.unwrap().unwrap();
        assert!(!fetched.is_messaging_enabled);
        assert!(fetched.is_messaging_opted_out);
        assert!(fetched.messaging_opted_out_at.is_some());
    }

    #[tokio::test]
    async fn consent_update_of_missing_record_fails() {
        let db = test_db().await;
        let record = PhoneNumberRecord {
            id: 999,
            person_alias_id: None,
            number: "1".into(),
            full_number: "11".into(),
            is_messaging_enabled: true,
            is_messaging_opted_out: false,
            messaging_opted_out_at: None,
        };
        let err = db.update_phone_consent(&record).await.unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[tokio::test]
    async fn system_phone_number_round_trip() {
        let db = test_db().await;
        db.upsert_system_phone_number(&SystemPhoneNumber {
            number: "+1 (623) 555-0100".into(),
            name: "Main line".into(),
            pipeline_id: Some(3),
            is_sms_opt_in_out_tracking_disabled: true,
            is_sms_opt_in_out_auto_reply_suppressed: false,
        })
        .await
        .unwrap();

        let found = db.get_system_phone_number("16235550100").await.unwrap().unwrap();
        assert_eq!(found.name, "Main line");
        assert_eq!(found.pipeline_id, Some(3));
        assert!(found.is_sms_opt_in_out_tracking_disabled);
        assert!(!found.is_sms_opt_in_out_auto_reply_suppressed);
        assert!(db.get_system_phone_number("1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn interaction_channel_is_reused() {
        let db = test_db().await;
        assert!(db.find_interaction_channel("SMS Pipeline").await.unwrap().is_none());
        let first = db.ensure_interaction_channel("SMS Pipeline").await.unwrap();
        let second = db.ensure_interaction_channel("SMS Pipeline").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(db.find_interaction_channel("SMS Pipeline").await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn interactions_round_trip() {
        let db = test_db().await;
        let channel_id = db.ensure_interaction_channel("SMS Pipeline").await.unwrap();
        db.insert_interaction(&InteractionRecord {
            id: Uuid::new_v4().to_string(),
            channel_id,
            component: "Main (1)".into(),
            operation: "Say hello".into(),
            data: serde_json::json!({"from": "+15550001111"}),
            person_alias_id: Some(4),
            created_at: Utc::now(),
        })
        .await
        .unwrap();

        let records = db.list_interactions(channel_id).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].operation, "Say hello");
        assert_eq!(records[0].data["from"], "+15550001111");
        assert_eq!(records[0].person_alias_id, Some(4));
    }

    #[tokio::test]
    async fn conversation_messages_round_trip() {
        let db = test_db().await;
        db.add_conversation_message(&ConversationMessage {
            id: Uuid::new_v4().to_string(),
            from_number: "+15550001111".into(),
            to_number: "+15559990000".into(),
            person_alias_id: None,
            body: "hello there".into(),
            attachments: vec!["https://media.example/1.jpg".into()],
            received_at: Utc::now(),
        })
        .await
        .unwrap();

        let messages = db.list_conversation_messages("+15550001111").await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].body, "hello there");
        assert_eq!(messages[0].attachments.len(), 1);
        assert!(db.list_conversation_messages("+1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn local_file_database_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sms.db");
        {
            let db = LibSqlBackend::new_local(&path).await.unwrap();
            db.upsert_pipeline(&pipeline(1, true)).await.unwrap();
        }
        let db = LibSqlBackend::new_local(&path).await.unwrap();
        assert_eq!(db.list_pipelines().await.unwrap().len(), 1);
    }
}
