//! Node inventory pipeline

use super::{fetch_or_empty, write_all, CollectorContext, CollectorReport};
use crate::models::{
    format_creation_time, BatchTag, HasMetadata, InventoryRecord, Node, NodeRecord, ResourceKind,
};
use tracing::info;

/// Capacity keys read from `status.capacity`
pub mod capacity_keys {
    pub const CPU: &str = "cpu";
    pub const MEMORY: &str = "memory";
    pub const PODS: &str = "pods";
    pub const GPU_LEGACY: &str = "alpha.kubernetes.io/nvidia-gpu";
    pub const GPU: &str = "nvidia.com/gpu";
}

/// Flatten one node. Quantities are copied as the source strings; missing
/// keys become empty strings.
pub fn node_record(node: &Node, record_time: String, tag: &BatchTag) -> NodeRecord {
    let quantity = |key: &str| node.capacity(key).map(str::to_string);

    NodeRecord {
        node_name: node.name().to_string(),
        cpu_cores: quantity(capacity_keys::CPU).unwrap_or_default(),
        gpu_cores: quantity(capacity_keys::GPU_LEGACY)
            .or_else(|| quantity(capacity_keys::GPU))
            .unwrap_or_default(),
        memory_size: quantity(capacity_keys::MEMORY).unwrap_or_default(),
        pod_limit: quantity(capacity_keys::PODS).unwrap_or_default(),
        create_time: format_creation_time(node.creation_timestamp()),
        record_time,
        tag: tag.clone(),
    }
}

/// Fetch all nodes and write one summary row per node
pub async fn collect_nodes(ctx: &CollectorContext) -> CollectorReport {
    let (nodes, failure) = fetch_or_empty::<Node>(ctx, ResourceKind::Nodes).await;

    let tag = BatchTag::generate();
    let mut report = CollectorReport::new(ResourceKind::Nodes, tag.clone());
    report.fetched = nodes.len();
    report.failure = failure;

    let records: Vec<InventoryRecord> = nodes
        .iter()
        .map(|node| InventoryRecord::from(node_record(node, ctx.clock.stamp(), &tag)))
        .collect();
    write_all(ctx, records, &mut report).await;

    info!(
        tag = %tag,
        fetched = report.fetched,
        written = report.written,
        "Nodes inserted"
    );
    report
}
