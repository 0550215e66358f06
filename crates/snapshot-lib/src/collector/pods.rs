//! Pod inventory pipeline
//!
//! Every pod row carries the list-wide totals: the number of pods and the
//! sum of per-pod container counts. Totals are computed from the complete
//! list before the first row is written and are scoped to this run only.

use super::{fetch_or_empty, write_all, CollectorContext, CollectorReport};
use crate::models::{
    format_creation_time, BatchTag, HasMetadata, InventoryRecord, Pod, PodRecord, ResourceKind,
};
use tracing::info;

/// List-wide totals repeated on each row of a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PodTotals {
    pub pods: usize,
    pub containers: usize,
}

impl PodTotals {
    /// Totals over a complete listing
    pub fn from_pods(pods: &[Pod]) -> Self {
        Self {
            pods: pods.len(),
            containers: pods.iter().map(container_count).sum(),
        }
    }
}

/// Container count proxy: the length of the pod's condition list
pub fn container_count(pod: &Pod) -> usize {
    pod.conditions().len()
}

/// Flatten one pod, repeating the list-wide totals on the row
pub fn pod_record(pod: &Pod, totals: PodTotals, record_time: String, tag: &BatchTag) -> PodRecord {
    PodRecord {
        pod_name: pod.name().to_string(),
        host_ip: pod.host_ip().to_string(),
        container_count: container_count(pod).to_string(),
        total_pods: totals.pods.to_string(),
        total_containers: totals.containers.to_string(),
        create_time: format_creation_time(pod.creation_timestamp()),
        record_time,
        tag: tag.clone(),
    }
}

/// Fetch all pods and write one summary row per pod
pub async fn collect_pods(ctx: &CollectorContext) -> CollectorReport {
    let (pods, failure) = fetch_or_empty::<Pod>(ctx, ResourceKind::Pods).await;

    let tag = BatchTag::generate();
    let mut report = CollectorReport::new(ResourceKind::Pods, tag.clone());
    report.fetched = pods.len();
    report.failure = failure;

    let totals = PodTotals::from_pods(&pods);
    let records: Vec<InventoryRecord> = pods
        .iter()
        .map(|pod| InventoryRecord::from(pod_record(pod, totals, ctx.clock.stamp(), &tag)))
        .collect();
    write_all(ctx, records, &mut report).await;

    info!(
        tag = %tag,
        fetched = report.fetched,
        written = report.written,
        containers = totals.containers,
        "Pods inserted"
    );
    report
}
