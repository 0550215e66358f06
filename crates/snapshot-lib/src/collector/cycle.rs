//! One collection round across all resource kinds
//!
//! The three pipelines run as separate tasks and are joined before the cycle
//! returns. A pipeline that panics surfaces as an aborted report; the cycle
//! itself never fails.

use super::{collect_nodes, collect_pods, collect_services, CollectorContext, CollectorReport};
use crate::models::ResourceKind;
use std::time::Duration;
use tokio::task::JoinError;
use tokio::time::Instant;
use tracing::error;

/// Aggregated outcome of a cycle
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// Reports in nodes, pods, services order
    pub collectors: Vec<CollectorReport>,
    pub elapsed: Duration,
}

impl CycleReport {
    /// Report of one kind, if its collector ran
    pub fn get(&self, kind: ResourceKind) -> Option<&CollectorReport> {
        self.collectors.iter().find(|r| r.kind == kind)
    }

    /// Items listed across all kinds
    pub fn fetched(&self) -> usize {
        self.collectors.iter().map(|r| r.fetched).sum()
    }

    /// Rows written across all kinds
    pub fn written(&self) -> usize {
        self.collectors.iter().map(|r| r.written).sum()
    }

    pub fn failed_writes(&self) -> usize {
        self.collectors.iter().map(|r| r.failed_writes).sum()
    }

    /// Pipelines whose list request failed or which aborted
    pub fn failed_collectors(&self) -> usize {
        self.collectors.iter().filter(|r| r.failure.is_some()).count()
    }

    /// No fetch failure, abort or write failure in this cycle
    pub fn is_clean(&self) -> bool {
        self.collectors.iter().all(CollectorReport::is_clean)
    }
}

/// Runs the node, pod and service pipelines concurrently
#[derive(Clone)]
pub struct CollectionCycle {
    ctx: CollectorContext,
}

impl CollectionCycle {
    pub fn new(ctx: CollectorContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &CollectorContext {
        &self.ctx
    }

    /// Launch all three pipelines and wait for every one of them
    pub async fn run(&self) -> CycleReport {
        let start = Instant::now();

        let nodes = tokio::spawn({
            let ctx = self.ctx.clone();
            async move { collect_nodes(&ctx).await }
        });
        let pods = tokio::spawn({
            let ctx = self.ctx.clone();
            async move { collect_pods(&ctx).await }
        });
        let services = tokio::spawn({
            let ctx = self.ctx.clone();
            async move { collect_services(&ctx).await }
        });

        let (nodes, pods, services) = tokio::join!(nodes, pods, services);

        CycleReport {
            collectors: vec![
                settle(ResourceKind::Nodes, nodes),
                settle(ResourceKind::Pods, pods),
                settle(ResourceKind::Services, services),
            ],
            elapsed: start.elapsed(),
        }
    }
}

fn settle(kind: ResourceKind, joined: Result<CollectorReport, JoinError>) -> CollectorReport {
    joined.unwrap_or_else(|e| {
        error!(kind = %kind, error = %e, "Collector task did not complete");
        CollectorReport::aborted(kind, e.to_string())
    })
}
