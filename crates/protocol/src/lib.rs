//! Shared data model and configuration for the video request pipeline.
//!
//! This crate holds the types that cross component boundaries:
//! - the request status machine and persisted request record
//! - the queue message envelopes exchanged through the broker
//! - the manifest outcome status
//! - the process-wide configuration, loaded once from the environment and
//!   passed explicitly to every component

pub mod config;
pub mod message;
pub mod request;

pub use config::{ApiConfig, AppConfig, BrokerConfig, ConfigError, PollConfig, StoreConfig};
pub use message::{peek_uid, CompletionMessage, MessageError, SubmissionMessage};
pub use request::{OutcomeStatus, RequestRecord, RequestStatus};
