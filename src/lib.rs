//! # repair-queue
//!
//! Walk-in customer queue for a device-repair counter.
//!
//! Provides the queue store (check-in, call, remove, clear, with derived
//! stats persisted to durable slots), announcement helpers, export, and
//! OpenTelemetry observability.

pub mod announce;
pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod export;
pub mod model;
pub mod storage;
pub mod store;
pub mod telemetry;
