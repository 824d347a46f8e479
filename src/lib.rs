//! Knock sensor event aggregation and pattern matching.
//!
//! Sensors publish knock events (timed tap sequences) over a pub/sub feed.
//! The ingestion loop folds them into a concurrent per-sensor store, which
//! the query surface exposes alongside knock comparison, stored patterns,
//! and runtime sensor configuration. The broker client and HTTP routing
//! live outside this crate; `source::EventSource` and `service::KnockService`
//! are the seams they plug into.

pub mod comparator;
pub mod config;
pub mod ingest;
pub mod patterns;
pub mod service;
pub mod settings;
pub mod source;
pub mod store;
