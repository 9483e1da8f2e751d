//! Persistence layer: libSQL-backed storage for pipelines, consent, and interactions.

pub mod libsql_backend;
pub mod migrations;
pub mod seed;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::{ConversationMessage, Database, InteractionRecord};
