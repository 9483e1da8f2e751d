//! Action registry: component key to implementation.

use std::collections::HashMap;
use std::sync::Arc;

use crate::actions::{ConversationAction, ReplyAction, SmsAction};
use crate::pipeline::types::{ActionDefinition, PipelineDefinition};
use crate::store::Database;

/// An action definition paired with its implementation, if registered.
pub struct ResolvedAction {
    pub definition: ActionDefinition,
    pub component: Option<Arc<dyn SmsAction>>,
}

/// Registry of available action components.
#[derive(Default)]
pub struct ActionRegistry {
    actions: HashMap<String, Arc<dyn SmsAction>>,
}

impl ActionRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in `reply` and `conversation` components.
    pub fn with_builtins(store: Arc<dyn Database>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ReplyAction::new()));
        registry.register(Arc::new(ConversationAction::new(store)));
        registry
    }

    /// Register a component. A later registration replaces an earlier one
    /// with the same key.
    pub fn register(&mut self, action: Arc<dyn SmsAction>) {
        let key = action.component().to_string();
        if self.actions.insert(key.clone(), action).is_some() {
            tracing::warn!(component = %key, "Replaced existing action component");
        } else {
            tracing::debug!("Registered action component: {}", key);
        }
    }

    pub fn get(&self, component: &str) -> Option<Arc<dyn SmsAction>> {
        self.actions.get(component).cloned()
    }

    /// List all component keys, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.actions.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// The pipeline's active actions in run order, each with its component.
    pub fn resolve(&self, pipeline: &PipelineDefinition) -> Vec<ResolvedAction> {
        pipeline
            .active_actions()
            .into_iter()
            .map(|definition| ResolvedAction {
                component: self.get(&definition.component),
                definition: definition.clone(),
            })
            .collect()
    }
}
