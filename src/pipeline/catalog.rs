//! Pipeline catalog: the in-memory view of configured pipelines.
//!
//! Built explicitly at startup (from the store or from definitions) and
//! handed to the dispatcher. Refresh after editing pipelines in storage.

use std::collections::BTreeMap;

use tokio::sync::RwLock;
use tracing::info;

use crate::error::DatabaseError;
use crate::pipeline::types::PipelineDefinition;
use crate::store::Database;

pub struct PipelineCatalog {
    pipelines: RwLock<BTreeMap<i64, PipelineDefinition>>,
}

impl PipelineCatalog {
    pub fn from_definitions(definitions: Vec<PipelineDefinition>) -> Self {
        Self {
            pipelines: RwLock::new(definitions.into_iter().map(|p| (p.id, p)).collect()),
        }
    }

    /// Load every pipeline from the store.
    pub async fn load(store: &dyn Database) -> Result<Self, DatabaseError> {
        let catalog = Self::from_definitions(Vec::new());
        catalog.refresh(store).await?;
        Ok(catalog)
    }

    /// Replace the cached pipelines with the store's current contents.
    pub async fn refresh(&self, store: &dyn Database) -> Result<(), DatabaseError> {
        let definitions = store.list_pipelines().await?;
        let count = definitions.len();
        *self.pipelines.write().await = definitions.into_iter().map(|p| (p.id, p)).collect();
        info!(pipelines = count, "Pipeline catalog refreshed");
        Ok(())
    }

    pub async fn get(&self, id: i64) -> Option<PipelineDefinition> {
        self.pipelines.read().await.get(&id).cloned()
    }

    /// Id of the lowest-id active pipeline.
    pub async fn default_pipeline_id(&self) -> Option<i64> {
        self.pipelines
            .read()
            .await
            .values()
            .find(|p| p.is_active)
            .map(|p| p.id)
    }

    pub async fn len(&self) -> usize {
        self.pipelines.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.pipelines.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LibSqlBackend;

    fn pipeline(id: i64, active: bool) -> PipelineDefinition {
        PipelineDefinition {
            id,
            name: format!("p{id}"),
            is_active: active,
            actions: Vec::new(),
        }
    }

    #[tokio::test]
    async fn default_is_lowest_active_id() {
        let catalog = PipelineCatalog::from_definitions(vec![
            pipeline(7, true),
            pipeline(2, false),
            pipeline(4, true),
        ]);
        assert_eq!(catalog.default_pipeline_id().await, Some(4));
    }

    #[tokio::test]
    async fn no_active_pipeline_means_no_default() {
        let catalog = PipelineCatalog::from_definitions(vec![pipeline(1, false)]);
        assert_eq!(catalog.default_pipeline_id().await, None);
        assert!(PipelineCatalog::from_definitions(vec![]).is_empty().await);
    }

    #[tokio::test]
    async fn refresh_picks_up_store_changes() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        db.upsert_pipeline(&pipeline(1, true)).await.unwrap();
        let catalog = PipelineCatalog::load(&db).await.unwrap();
        assert_eq!(catalog.len().await, 1);

        db.upsert_pipeline(&pipeline(2, true)).await.unwrap();
        assert!(catalog.get(2).await.is_none());
        catalog.refresh(&db).await.unwrap();
        assert_eq!(catalog.get(2).await.unwrap().name, "p2");
    }
}
