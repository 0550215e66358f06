//! Inventory snapshotter library
//!
//! This crate provides the core functionality for:
//! - Reading node, pod and service lists from the control-plane API
//! - Flattening them into summary records and appending them to a store
//! - Running the three collectors concurrently on a schedule
//! - The control API that switches collection on and off
//! - Health checks and observability

pub mod api;
pub mod client;
pub mod collector;
pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod store;
pub mod toggle;

pub use client::ResourceClient;
pub use collector::{
    CollectionCycle, CollectionLoop, CollectionLoopBuilder, CollectorContext, CollectorReport,
    CycleReport,
};
pub use error::{FetchError, StoreError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{SnapshotMetrics, StructuredLogger};
pub use store::{MemoryStore, RecordStore, SqliteStore};
pub use toggle::AvailabilityToggle;
