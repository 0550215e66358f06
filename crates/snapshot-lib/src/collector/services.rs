//! Service inventory pipeline

use super::{fetch_or_empty, write_all, CollectorContext, CollectorReport};
use crate::models::{
    format_creation_time, BatchTag, HasMetadata, InventoryRecord, ResourceKind, Service,
    ServiceRecord,
};
use tracing::{debug, info};

/// Flatten one service; `total_services` is the length of its listing
pub fn service_record(
    service: &Service,
    total_services: usize,
    record_time: String,
    tag: &BatchTag,
) -> ServiceRecord {
    ServiceRecord {
        service_name: service.name().to_string(),
        total_services: total_services.to_string(),
        create_time: format_creation_time(service.creation_timestamp()),
        record_time,
        tag: tag.clone(),
    }
}

/// Fetch all services and write one summary row per service
pub async fn collect_services(ctx: &CollectorContext) -> CollectorReport {
    let (services, failure) = fetch_or_empty::<Service>(ctx, ResourceKind::Services).await;

    let tag = BatchTag::generate();
    let mut report = CollectorReport::new(ResourceKind::Services, tag.clone());
    report.fetched = services.len();
    report.failure = failure;

    let total = services.len();
    let mut records = Vec::with_capacity(total);
    for service in &services {
        // Labels are surfaced in debug logs only; they are not stored
        if let Some(labels) = service.labels() {
            for (key, value) in labels {
                debug!(service = %service.name(), label = %key, value = %value, "Service label");
            }
        }
        records.push(InventoryRecord::from(service_record(
            service,
            total,
            ctx.clock.stamp(),
            &tag,
        )));
    }
    write_all(ctx, records, &mut report).await;

    info!(
        tag = %tag,
        fetched = report.fetched,
        written = report.written,
        "Services inserted"
    );
    report
}
