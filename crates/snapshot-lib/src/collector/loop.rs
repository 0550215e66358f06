//! Collection scheduling loop
//!
//! Runs a collection cycle on a fixed interval with random jitter, skipping
//! ticks while the availability toggle is off. Cycles are awaited inline so
//! two cycles never overlap.

use super::{CollectionCycle, CollectorContext, CycleReport};
use crate::client::ResourceClient;
use crate::health::{components, HealthRegistry};
use crate::models::RecordClock;
use crate::observability::{SnapshotMetrics, StructuredLogger};
use crate::store::RecordStore;
use crate::toggle::AvailabilityToggle;
use anyhow::Result;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Configuration for the collection loop
#[derive(Debug, Clone)]
pub struct CollectionConfig {
    /// Time between cycles (default: 60 seconds)
    pub interval: Duration,
    /// Maximum jitter added to each interval (default: 1 second)
    pub jitter: Duration,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            jitter: Duration::from_secs(1),
        }
    }
}

/// Periodically drives [`CollectionCycle`] while the toggle is active
pub struct CollectionLoop {
    cycle: CollectionCycle,
    toggle: AvailabilityToggle,
    config: CollectionConfig,
    health: HealthRegistry,
    metrics: SnapshotMetrics,
    logger: StructuredLogger,
}

impl CollectionLoop {
    pub fn new(
        cycle: CollectionCycle,
        toggle: AvailabilityToggle,
        config: CollectionConfig,
        health: HealthRegistry,
        metrics: SnapshotMetrics,
    ) -> Self {
        let logger = StructuredLogger::new(cycle.context().client.base_url().as_str());
        Self {
            cycle,
            toggle,
            config,
            health,
            metrics,
            logger,
        }
    }

    /// Run until a shutdown signal arrives. The first cycle starts immediately.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            "Starting collection loop"
        );

        let mut delay = Duration::ZERO;

        loop {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    self.run_once().await;
                    delay = self.next_delay();
                }
                _ = shutdown.recv() => {
                    info!("Shutting down collection loop");
                    break;
                }
            }
        }
    }

    /// Run a single cycle if the toggle allows it
    pub async fn run_once(&self) -> Option<CycleReport> {
        let active = self.toggle.is_active();
        self.metrics.set_collection_active(active);

        if !active {
            debug!("Collection paused, skipping cycle");
            self.metrics.inc_cycles_skipped();
            return None;
        }

        let report = self.cycle.run().await;
        self.record(&report).await;
        Some(report)
    }

    async fn record(&self, report: &CycleReport) {
        self.metrics.observe_cycle(report);
        self.logger.log_cycle(report);

        if report.failed_writes() > 0 {
            self.health
                .set_degraded(
                    components::STORE,
                    format!("{} write(s) failed in last cycle", report.failed_writes()),
                )
                .await;
        } else {
            self.health.set_healthy(components::STORE).await;
        }

        if report.is_clean() {
            self.health.set_healthy(components::COLLECTOR).await;
        } else {
            self.health
                .set_degraded(
                    components::COLLECTOR,
                    format!(
                        "{} of {} collector(s) failed in last cycle",
                        report.failed_collectors(),
                        report.collectors.len()
                    ),
                )
                .await;
        }
    }

    fn next_delay(&self) -> Duration {
        let jitter_ms = rand_jitter(self.config.jitter.as_millis() as u64);
        self.config.interval + Duration::from_millis(jitter_ms)
    }
}

/// Random jitter in `[0, max_ms)`
fn rand_jitter(max_ms: u64) -> u64 {
    if max_ms == 0 {
        return 0;
    }
    rand::thread_rng().gen_range(0..max_ms)
}

/// Builder for creating the collection loop
pub struct CollectionLoopBuilder {
    client: Option<Arc<ResourceClient>>,
    store: Option<Arc<dyn RecordStore>>,
    toggle: AvailabilityToggle,
    clock: RecordClock,
    health: HealthRegistry,
    config: CollectionConfig,
}

impl CollectionLoopBuilder {
    pub fn new() -> Self {
        Self {
            client: None,
            store: None,
            toggle: AvailabilityToggle::default(),
            clock: RecordClock::default(),
            health: HealthRegistry::new(),
            config: CollectionConfig::default(),
        }
    }

    pub fn client(mut self, client: Arc<ResourceClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Share a toggle with the control API
    pub fn toggle(mut self, toggle: AvailabilityToggle) -> Self {
        self.toggle = toggle;
        self
    }

    pub fn clock(mut self, clock: RecordClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = health;
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    pub fn jitter(mut self, jitter: Duration) -> Self {
        self.config.jitter = jitter;
        self
    }

    pub fn build(self) -> Result<CollectionLoop> {
        let client = self
            .client
            .ok_or_else(|| anyhow::anyhow!("Resource client is required"))?;
        let store = self
            .store
            .ok_or_else(|| anyhow::anyhow!("Record store is required"))?;

        let cycle = CollectionCycle::new(CollectorContext::new(client, store, self.clock));

        Ok(CollectionLoop::new(
            cycle,
            self.toggle,
            self.config,
            self.health,
            SnapshotMetrics::new(),
        ))
    }
}

impl Default for CollectionLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}
