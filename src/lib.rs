//! Lead Conversion Event Relay
//!
//! Receives change notifications about lead records from the
//! source-of-record database, decides via a deterministic policy whether
//! each change is a billable conversion event, and forwards it at most once
//! to the Meta Conversions API with all PII hashed.
//!
//! # Modules
//!
//! - `change`: Change detection and loop prevention.
//! - `config`: Configuration management.
//! - `db`: Database connection and pool management.
//! - `errors`: Error handling types.
//! - `events`: Status label -> conversion event classification.
//! - `handlers`: HTTP request handlers and shared state.
//! - `meta_client`: Conversions API client.
//! - `meta_models`: Conversions API payload types.
//! - `models`: Core data models.
//! - `normalize`: PII normalization and hashing.
//! - `pipeline`: The decision-and-dispatch pipeline.
//! - `storage`: Dedup index and diagnostic write-back.
//! - `webhook_handler`: Change-notification webhook handler.

pub mod change;
pub mod config;
pub mod db;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod meta_client;
pub mod meta_models;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod storage;
pub mod webhook_handler;
