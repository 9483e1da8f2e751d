//! Inbound SMS pipeline.
//!
//! Every inbound message flows through:
//! 1. `ConsentTracker::track()`: STOP/START keywords update phone consent
//! 2. `SmsPipelineDispatcher`: ordered actions from the selected pipeline
//! 3. Consent confirmation: appended last, unless suppressed
//!
//! Interactions for logged actions are written in the background by
//! `InteractionLogger` and never delay the reply.

pub mod catalog;
pub mod consent;
pub mod dispatcher;
pub mod interaction;
pub mod keywords;
pub mod replies;
pub mod types;

pub use catalog::PipelineCatalog;
pub use consent::ConsentTracker;
pub use dispatcher::SmsPipelineDispatcher;
pub use interaction::InteractionLogger;
