//! SMS Responder: inbound SMS pipelines with opt-in/opt-out consent tracking.

pub mod actions;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod store;
pub mod webhook;
