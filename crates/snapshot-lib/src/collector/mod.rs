//! Inventory collection from the control plane
//!
//! Each resource kind has its own fetch → transform → write pipeline. A
//! [`CollectionCycle`] runs the three pipelines concurrently and joins them,
//! and the [`CollectionLoop`] drives cycles on an interval while the
//! availability toggle is on.
//!
//! Failures never abort a pipeline: fetch errors yield an empty list, write
//! errors skip the row. Both are logged and counted in the pipeline's
//! [`CollectorReport`].

mod cycle;
mod r#loop;
mod nodes;
mod pods;
mod services;

#[cfg(test)]
mod tests;

pub use cycle::{CollectionCycle, CycleReport};
pub use nodes::{collect_nodes, node_record};
pub use pods::{collect_pods, container_count, pod_record, PodTotals};
pub use r#loop::{CollectionConfig, CollectionLoop, CollectionLoopBuilder};
pub use services::{collect_services, service_record};

use crate::client::ResourceClient;
use crate::models::{BatchTag, InventoryRecord, RecordClock, ResourceKind};
use crate::store::RecordStore;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, warn};

/// Dependencies shared by the three pipelines
#[derive(Clone)]
pub struct CollectorContext {
    pub client: Arc<ResourceClient>,
    pub store: Arc<dyn RecordStore>,
    pub clock: RecordClock,
}

impl CollectorContext {
    pub fn new(client: Arc<ResourceClient>, store: Arc<dyn RecordStore>, clock: RecordClock) -> Self {
        Self {
            client,
            store,
            clock,
        }
    }
}

/// Why a pipeline produced fewer rows than expected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectorFailure {
    /// The list request or its decoding failed; nothing was written
    Fetch(String),
    /// The pipeline task panicked or was cancelled before reporting
    Aborted(String),
}

/// Outcome of one pipeline run
#[derive(Debug, Clone)]
pub struct CollectorReport {
    pub kind: ResourceKind,
    /// `None` only when the pipeline aborted before generating a tag
    pub tag: Option<BatchTag>,
    pub fetched: usize,
    pub written: usize,
    pub failed_writes: usize,
    pub failure: Option<CollectorFailure>,
}

impl CollectorReport {
    fn new(kind: ResourceKind, tag: BatchTag) -> Self {
        Self {
            kind,
            tag: Some(tag),
            fetched: 0,
            written: 0,
            failed_writes: 0,
            failure: None,
        }
    }

    pub fn aborted(kind: ResourceKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            tag: None,
            fetched: 0,
            written: 0,
            failed_writes: 0,
            failure: Some(CollectorFailure::Aborted(reason.into())),
        }
    }

    pub fn fetch_failed(&self) -> bool {
        matches!(self.failure, Some(CollectorFailure::Fetch(_)))
    }

    pub fn is_clean(&self) -> bool {
        self.failure.is_none() && self.failed_writes == 0
    }
}

/// Fetch a list, logging and swallowing any error as an empty list
async fn fetch_or_empty<T: DeserializeOwned>(
    ctx: &CollectorContext,
    kind: ResourceKind,
) -> (Vec<T>, Option<CollectorFailure>) {
    match ctx.client.list::<T>(kind).await {
        Ok(items) => (items, None),
        Err(e) => {
            warn!(kind = %kind, error = %e, "Failed to fetch resource list");
            (Vec::new(), Some(CollectorFailure::Fetch(e.to_string())))
        }
    }
}

/// Write records one at a time in order, counting successes and failures
async fn write_all<I>(ctx: &CollectorContext, records: I, report: &mut CollectorReport)
where
    I: IntoIterator<Item = InventoryRecord>,
{
    for record in records {
        match ctx.store.insert(record).await {
            Ok(id) => {
                report.written += 1;
                debug!(kind = %report.kind, id = id, "Inserted record");
            }
            Err(e) => {
                report.failed_writes += 1;
                warn!(kind = %report.kind, error = %e, "Failed to insert record");
            }
        }
    }
}
