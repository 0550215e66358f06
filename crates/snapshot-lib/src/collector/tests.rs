//! Collection cycle scenarios
//!
//! These tests stand up a stub control-plane server with mockito and run
//! whole cycles against an in-memory store.

#[cfg(test)]
mod stub_api_tests {
    use crate::client::ResourceClient;
    use crate::collector::{
        collect_nodes, collect_pods, collect_services, CollectionCycle, CollectorContext,
        CollectorFailure, CycleReport,
    };
    use crate::error::StoreError;
    use crate::models::{
        InventoryRecord, RecordClock, ResourceKind, TIME_FORMAT,
    };
    use crate::store::{MemoryStore, RecordStore, SqliteStore};
    use async_trait::async_trait;
    use chrono::{NaiveDateTime, Timelike};
    use mockito::{Mock, ServerGuard};
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn node_list(names: &[&str]) -> String {
        let items: Vec<_> = names
            .iter()
            .map(|name| {
                json!({
                    "metadata": {"name": name, "creationTimestamp": "2024-01-10T02:00:00Z"},
                    "status": {"capacity": {"cpu": "4", "memory": "16Gi", "pods": "110"}}
                })
            })
            .collect();
        json!({"kind": "NodeList", "items": items}).to_string()
    }

    /// Pods with the given number of status conditions each
    fn pod_list(condition_counts: &[usize]) -> String {
        let items: Vec<_> = condition_counts
            .iter()
            .enumerate()
            .map(|(i, count)| {
                let conditions: Vec<_> = (0..*count)
                    .map(|c| json!({"type": format!("Cond{}", c), "status": "True"}))
                    .collect();
                json!({
                    "metadata": {"name": format!("pod-{}", i)},
                    "status": {"hostIP": format!("10.0.0.{}", i + 1), "conditions": conditions}
                })
            })
            .collect();
        json!({"kind": "PodList", "items": items}).to_string()
    }

    fn service_list(names: &[&str]) -> String {
        let items: Vec<_> = names
            .iter()
            .map(|name| json!({"metadata": {"name": name, "labels": {"app": name}}}))
            .collect();
        json!({"kind": "ServiceList", "items": items}).to_string()
    }

    async fn mock_list(server: &mut ServerGuard, kind: ResourceKind, body: String) -> Mock {
        server
            .mock("GET", kind.list_path())
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await
    }

    async fn mock_failure(server: &mut ServerGuard, kind: ResourceKind) -> Mock {
        server
            .mock("GET", kind.list_path())
            .with_status(500)
            .with_body("internal error")
            .create_async()
            .await
    }

    fn context(server: &ServerGuard, store: Arc<dyn RecordStore>) -> CollectorContext {
        let client = ResourceClient::new(&server.url(), None).unwrap();
        CollectorContext::new(Arc::new(client), store, RecordClock::default())
    }

    fn tags(records: &[InventoryRecord]) -> HashSet<String> {
        records.iter().map(|r| r.tag().to_string()).collect()
    }

    /// Store that rejects every second insert
    struct FlakyStore {
        inner: MemoryStore,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RecordStore for FlakyStore {
        async fn insert(&self, record: InventoryRecord) -> Result<i64, StoreError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) % 2 == 1 {
                return Err(StoreError::Internal("disk full".to_string()));
            }
            self.inner.insert(record).await
        }
    }

    #[tokio::test]
    async fn test_cycle_writes_one_record_per_item() {
        let mut server = mockito::Server::new_async().await;
        let _nodes = mock_list(&mut server, ResourceKind::Nodes, node_list(&["n1", "n2"])).await;
        let _pods = mock_list(&mut server, ResourceKind::Pods, pod_list(&[1, 2, 3])).await;
        let _services =
            mock_list(&mut server, ResourceKind::Services, service_list(&["kubernetes"])).await;

        let store = Arc::new(MemoryStore::new());
        let cycle = CollectionCycle::new(context(&server, store.clone()));

        let report = cycle.run().await;

        assert!(report.is_clean());
        assert_eq!(report.written(), 6);
        assert_eq!(store.records_of(ResourceKind::Nodes).await.len(), 2);
        assert_eq!(store.records_of(ResourceKind::Pods).await.len(), 3);
        assert_eq!(store.records_of(ResourceKind::Services).await.len(), 1);
    }

    #[tokio::test]
    async fn test_batch_tags_shared_within_kind_and_distinct_across_kinds() {
        let mut server = mockito::Server::new_async().await;
        let _nodes = mock_list(&mut server, ResourceKind::Nodes, node_list(&["n1", "n2"])).await;
        let _pods = mock_list(&mut server, ResourceKind::Pods, pod_list(&[1, 1])).await;
        let _services =
            mock_list(&mut server, ResourceKind::Services, service_list(&["a", "b"])).await;

        let store = Arc::new(MemoryStore::new());
        let report = CollectionCycle::new(context(&server, store.clone())).run().await;

        let mut per_kind = Vec::new();
        for kind in ResourceKind::ALL {
            let kind_tags = tags(&store.records_of(kind).await);
            assert_eq!(kind_tags.len(), 1, "{} rows must share one tag", kind);

            let reported = report.get(kind).unwrap().tag.as_ref().unwrap().to_string();
            assert!(kind_tags.contains(&reported));
            per_kind.push(reported);
        }

        let distinct: HashSet<_> = per_kind.iter().collect();
        assert_eq!(distinct.len(), 3);
    }

    #[tokio::test]
    async fn test_repeated_cycles_duplicate_records() {
        let mut server = mockito::Server::new_async().await;
        let _nodes = mock_list(&mut server, ResourceKind::Nodes, node_list(&["n1"])).await;
        let _pods = mock_list(&mut server, ResourceKind::Pods, pod_list(&[2])).await;
        let _services = mock_list(&mut server, ResourceKind::Services, service_list(&["s"])).await;

        let store = Arc::new(MemoryStore::new());
        let cycle = CollectionCycle::new(context(&server, store.clone()));

        cycle.run().await;
        cycle.run().await;

        let nodes = store.records_of(ResourceKind::Nodes).await;
        assert_eq!(nodes.len(), 2);
        assert_eq!(store.len().await, 6);
        // Each run generates its own tag
        assert_eq!(tags(&nodes).len(), 2);
    }

    #[tokio::test]
    async fn test_record_time_tracks_shifted_wall_clock() {
        let mut server = mockito::Server::new_async().await;
        let _nodes = mock_list(&mut server, ResourceKind::Nodes, node_list(&["n1", "n2"])).await;
        let _pods = mock_list(&mut server, ResourceKind::Pods, pod_list(&[1, 2])).await;
        let _services = mock_list(&mut server, ResourceKind::Services, service_list(&["s"])).await;

        let store = Arc::new(MemoryStore::new());
        let ctx = context(&server, store.clone());
        let clock = ctx.clock;

        let before = clock.now().naive_local().with_nanosecond(0).unwrap();
        CollectionCycle::new(ctx).run().await;
        let after = clock.now().naive_local();

        let records = store.records().await;
        assert_eq!(records.len(), 5);
        for record in records {
            let stamped = NaiveDateTime::parse_from_str(record.record_time(), TIME_FORMAT).unwrap();
            assert!(stamped >= before && stamped <= after, "{} out of range", stamped);
        }
    }

    #[tokio::test]
    async fn test_fetch_failure_does_not_abort_cycle() {
        let mut server = mockito::Server::new_async().await;
        let _nodes = mock_failure(&mut server, ResourceKind::Nodes).await;
        let _pods = mock_list(&mut server, ResourceKind::Pods, pod_list(&[1])).await;
        let _services =
            mock_list(&mut server, ResourceKind::Services, service_list(&["a", "b"])).await;

        let store = Arc::new(MemoryStore::new());
        let report: CycleReport = CollectionCycle::new(context(&server, store.clone())).run().await;

        assert_eq!(report.failed_collectors(), 1);
        let nodes = report.get(ResourceKind::Nodes).unwrap();
        assert!(nodes.fetch_failed());
        assert_eq!(nodes.written, 0);

        assert!(store.records_of(ResourceKind::Nodes).await.is_empty());
        assert_eq!(store.records_of(ResourceKind::Pods).await.len(), 1);
        assert_eq!(store.records_of(ResourceKind::Services).await.len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _nodes = mock_list(&mut server, ResourceKind::Nodes, "{not json".to_string()).await;
        let _pods = mock_list(&mut server, ResourceKind::Pods, pod_list(&[])).await;
        let _services = mock_list(&mut server, ResourceKind::Services, service_list(&[])).await;

        let store = Arc::new(MemoryStore::new());
        let report = CollectionCycle::new(context(&server, store.clone())).run().await;

        match &report.get(ResourceKind::Nodes).unwrap().failure {
            Some(CollectorFailure::Fetch(reason)) => assert!(reason.contains("decode")),
            other => panic!("unexpected failure: {:?}", other),
        }
        assert!(report.get(ResourceKind::Pods).unwrap().is_clean());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_unreachable_control_plane_still_completes() {
        let store = Arc::new(MemoryStore::new());
        let client = ResourceClient::new("http://127.0.0.1:9", None).unwrap();
        let ctx = CollectorContext::new(Arc::new(client), store.clone(), RecordClock::default());

        let report = CollectionCycle::new(ctx).run().await;

        assert_eq!(report.collectors.len(), 3);
        assert_eq!(report.failed_collectors(), 3);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_pod_container_totals() {
        let mut server = mockito::Server::new_async().await;
        let _pods = mock_list(&mut server, ResourceKind::Pods, pod_list(&[1, 3])).await;

        let store = Arc::new(MemoryStore::new());
        let report = collect_pods(&context(&server, store.clone())).await;

        assert_eq!(report.written, 2);
        let pods: Vec<_> = store
            .records_of(ResourceKind::Pods)
            .await
            .into_iter()
            .map(|r| match r {
                InventoryRecord::Pod(p) => p,
                other => panic!("unexpected record {:?}", other),
            })
            .collect();

        // API order is preserved
        assert_eq!(pods[0].pod_name, "pod-0");
        assert_eq!(pods[1].pod_name, "pod-1");

        assert_eq!(pods[0].container_count, "1");
        assert_eq!(pods[1].container_count, "3");

        // Totals cover the whole list on every row
        assert!(pods.iter().all(|p| p.total_containers == "4"));
        assert!(pods.iter().all(|p| p.total_pods == "2"));
        assert_eq!(pods[1].host_ip, "10.0.0.2");
    }

    #[tokio::test]
    async fn test_write_failures_are_counted_not_fatal() {
        let mut server = mockito::Server::new_async().await;
        let _nodes =
            mock_list(&mut server, ResourceKind::Nodes, node_list(&["a", "b", "c", "d"])).await;
        let _pods = mock_list(&mut server, ResourceKind::Pods, pod_list(&[])).await;
        let _services = mock_list(&mut server, ResourceKind::Services, service_list(&[])).await;

        let store = Arc::new(FlakyStore {
            inner: MemoryStore::new(),
            calls: AtomicUsize::new(0),
        });
        let report = CollectionCycle::new(context(&server, store.clone())).run().await;

        let nodes = report.get(ResourceKind::Nodes).unwrap();
        assert_eq!(nodes.fetched, 4);
        assert_eq!(nodes.written, 2);
        assert_eq!(nodes.failed_writes, 2);
        assert!(!report.is_clean());
        assert_eq!(store.inner.len().await, 2);
    }

    #[tokio::test]
    async fn test_cycle_against_sqlite_store() {
        let mut server = mockito::Server::new_async().await;
        let _nodes = mock_list(&mut server, ResourceKind::Nodes, node_list(&["n1"])).await;
        let _pods = mock_list(&mut server, ResourceKind::Pods, pod_list(&[1, 3])).await;
        let _services =
            mock_list(&mut server, ResourceKind::Services, service_list(&["a", "b", "c"])).await;

        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let cycle = CollectionCycle::new(context(&server, store.clone()));

        cycle.run().await;
        cycle.run().await;

        assert_eq!(store.count(ResourceKind::Nodes).await.unwrap(), 2);
        assert_eq!(store.count(ResourceKind::Pods).await.unwrap(), 4);
        assert_eq!(store.count(ResourceKind::Services).await.unwrap(), 6);
        assert_eq!(store.tags(ResourceKind::Services).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_collectors_run_on_spawned_tasks() {
        let mut server = mockito::Server::new_async().await;
        let _nodes = mock_list(&mut server, ResourceKind::Nodes, node_list(&["n1"])).await;
        let _pods = mock_list(&mut server, ResourceKind::Pods, pod_list(&[2])).await;
        let _services = mock_list(&mut server, ResourceKind::Services, service_list(&["s"])).await;

        let store = Arc::new(MemoryStore::new());
        let ctx = context(&server, store.clone());

        let nodes = tokio::spawn({
            let ctx = ctx.clone();
            async move { collect_nodes(&ctx).await }
        });
        let pods = tokio::spawn({
            let ctx = ctx.clone();
            async move { collect_pods(&ctx).await }
        });
        let services = tokio::spawn(async move { collect_services(&ctx).await });

        assert_eq!(nodes.await.unwrap().written, 1);
        assert_eq!(pods.await.unwrap().written, 1);
        assert_eq!(services.await.unwrap().written, 1);
        assert_eq!(store.len().await, 3);
    }

    #[tokio::test]
    async fn test_null_status_still_writes_every_pod() {
        let body = json!({
            "kind": "PodList",
            "items": [
                {"metadata": {"name": "running"}, "status": {"hostIP": "10.0.0.1",
                    "conditions": [{"type": "Ready", "status": "True"}]}},
                {"metadata": {"name": "pending"}, "status": null},
                {"metadata": null}
            ]
        })
        .to_string();
        let mut server = mockito::Server::new_async().await;
        let _pods = mock_list(&mut server, ResourceKind::Pods, body).await;

        let store = Arc::new(MemoryStore::new());
        let report = collect_pods(&context(&server, store.clone())).await;

        assert!(report.is_clean());
        assert_eq!(report.written, 3);
        let pods: Vec<_> = store
            .records_of(ResourceKind::Pods)
            .await
            .into_iter()
            .map(|r| match r {
                InventoryRecord::Pod(p) => p,
                other => panic!("unexpected record {:?}", other),
            })
            .collect();
        assert_eq!(pods[1].pod_name, "pending");
        assert_eq!(pods[1].host_ip, "");
        assert_eq!(pods[1].container_count, "0");
        assert_eq!(pods[2].pod_name, "");
        assert!(pods.iter().all(|p| p.total_containers == "1"));
    }

    #[tokio::test]
    async fn test_null_item_list_is_empty_not_a_failure() {
        let mut server = mockito::Server::new_async().await;
        let _nodes = mock_list(
            &mut server,
            ResourceKind::Nodes,
            r#"{"kind": "NodeList", "items": null}"#.to_string(),
        )
        .await;

        let store = Arc::new(MemoryStore::new());
        let report = collect_nodes(&context(&server, store.clone())).await;

        assert!(report.failure.is_none());
        assert_eq!(report.fetched, 0);
        assert!(store.is_empty().await);
    }
}
