//! Startup seed data: pipelines and numbers loaded from a JSON file.

use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::error::{ConfigError, DatabaseError, Error};
use crate::pipeline::types::{PipelineDefinition, SystemPhoneNumber, clean_number};
use crate::store::Database;

/// A contact phone number to create.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedPhoneNumber {
    #[serde(default)]
    pub person_alias_id: Option<i64>,
    pub number: String,
    #[serde(default = "default_country_code")]
    pub country_code: String,
}

impl SeedPhoneNumber {
    async fn exists_in(&self, db: &dyn Database) -> Result<bool, DatabaseError> {
        let number = clean_number(&self.number);
        let full_number = format!("{}{number}", clean_number(&self.country_code));
        let existing = db.find_phone_numbers(&full_number).await?;
        Ok(existing.iter().any(|r| {
            r.number == number
                && r.full_number == full_number
                && r.person_alias_id == self.person_alias_id
        }))
    }
}

fn default_country_code() -> String {
    "1".to_string()
}

/// Contents of a seed file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub pipelines: Vec<PipelineDefinition>,
    #[serde(default)]
    pub system_phone_numbers: Vec<SystemPhoneNumber>,
    #[serde(default)]
    pub phone_numbers: Vec<SeedPhoneNumber>,
}

impl SeedData {
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(raw).map_err(|e| ConfigError::ParseError(format!("seed file: {e}")))
    }

    pub async fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = tokio::fs::read_to_string(path).await?;
        Self::from_json(&raw)
    }

    /// Write everything to the store. Pipelines and system numbers are
    /// upserted; a phone number is inserted only when no record with the
    /// same digits and person alias exists.
    pub async fn apply(&self, db: &dyn Database) -> Result<(), Error> {
        for pipeline in &self.pipelines {
            db.upsert_pipeline(pipeline).await?;
            for action in &pipeline.actions {
                let mut action = action.clone();
                action.pipeline_id = pipeline.id;
                db.upsert_action(&action).await?;
            }
        }
        for number in &self.system_phone_numbers {
            db.upsert_system_phone_number(number).await?;
        }
        let mut inserted = 0;
        for phone in &self.phone_numbers {
            if phone.exists_in(db).await? {
                continue;
            }
            db.insert_phone_number(phone.person_alias_id, &phone.number, &phone.country_code)
                .await?;
            inserted += 1;
        }
        info!(
            pipelines = self.pipelines.len(),
            system_numbers = self.system_phone_numbers.len(),
            phone_numbers = inserted,
            "Seed data applied"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LibSqlBackend;

    const SEED: &str = r#"{
        "pipelines": [
            {"id": 1, "name": "Main", "actions": [
                {"id": 1, "pipeline_id": 0, "name": "Hours", "component": "reply", "order": 0,
                 "settings": {"phrases": ["hours"], "response": "We are open 9-5."}}
            ]}
        ],
        "system_phone_numbers": [
            {"number": "16235550100", "name": "Main line", "pipeline_id": 1}
        ],
        "phone_numbers": [
            {"person_alias_id": 12, "number": "623-555-3322"}
        ]
    }"#;

    #[tokio::test]
    async fn apply_writes_everything() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        SeedData::from_json(SEED).unwrap().apply(&db).await.unwrap();

        let pipelines = db.list_pipelines().await.unwrap();
        assert_eq!(pipelines.len(), 1);
        assert_eq!(pipelines[0].actions.len(), 1);
        assert_eq!(pipelines[0].actions[0].pipeline_id, 1);

        let system = db.get_system_phone_number("16235550100").await.unwrap().unwrap();
        assert_eq!(system.pipeline_id, Some(1));

        let phones = db.find_phone_numbers("16235553322").await.unwrap();
        assert_eq!(phones.len(), 1);
        assert_eq!(phones[0].person_alias_id, Some(12));
    }

    #[tokio::test]
    async fn reapplying_seed_does_not_duplicate_phone_numbers() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        let seed = SeedData::from_json(SEED).unwrap();
        for _ in 0..3 {
            seed.apply(&db).await.unwrap();
        }

        let phones = db.find_phone_numbers("16235553322").await.unwrap();
        assert_eq!(phones.len(), 1);
        assert_eq!(db.list_pipelines().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn same_number_for_another_person_is_kept() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        SeedData::from_json(SEED).unwrap().apply(&db).await.unwrap();
        let other = SeedData::from_json(
            r#"{"phone_numbers": [{"person_alias_id": 13, "number": "(623) 555-3322"}]}"#,
        )
        .unwrap();
        other.apply(&db).await.unwrap();
        other.apply(&db).await.unwrap();

        let phones = db.find_phone_numbers("16235553322").await.unwrap();
        let aliases: Vec<Option<i64>> = phones.iter().map(|p| p.person_alias_id).collect();
        assert_eq!(aliases, vec![Some(12), Some(13)]);
    }

    #[test]
    fn malformed_seed_is_a_parse_error() {
        let err = SeedData::from_json("{\"pipelines\": 3}").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SeedData::from_file(&dir.path().join("absent.json")).await.unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
