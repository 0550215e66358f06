//! Core data models for the inventory snapshotter
//!
//! Two families of types live here: the subset of the control-plane wire
//! schema that the collectors actually read, and the flattened summary
//! records written to the record store.

use chrono::{DateTime, FixedOffset, Offset, Utc};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Timestamp layout used for every stored time column
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Length of a generated batch tag
pub const BATCH_TAG_LEN: usize = 5;

/// Default shift applied to record timestamps (UTC+8)
pub const DEFAULT_RECORD_OFFSET_HOURS: i32 = 8;

/// Resource collections polled from the control plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Nodes,
    Pods,
    Services,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 3] = [
        ResourceKind::Nodes,
        ResourceKind::Pods,
        ResourceKind::Services,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Nodes => "nodes",
            ResourceKind::Pods => "pods",
            ResourceKind::Services => "services",
        }
    }

    /// List endpoint relative to the control-plane base URL
    pub fn list_path(&self) -> &'static str {
        match self {
            ResourceKind::Nodes => "/api/v1/nodes",
            ResourceKind::Pods => "/api/v1/pods",
            ResourceKind::Services => "/api/v1/services",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `{ "items": [...] }` envelope returned by list endpoints.
///
/// Every field of the wire schema is optional so that an explicit `null`
/// decodes the same way as an absent key.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ResourceList<T> {
    #[serde(default)]
    pub items: Option<Vec<T>>,
}

impl<T> ResourceList<T> {
    /// Listed objects; a missing or `null` item list is empty
    pub fn into_items(self) -> Vec<T> {
        self.items.unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub creation_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub labels: Option<BTreeMap<String, String>>,
}

/// Read access to the `metadata` block shared by every listed object
pub trait HasMetadata {
    fn meta(&self) -> Option<&ObjectMeta>;

    /// Object name, `""` when absent
    fn name(&self) -> &str {
        self.meta()
            .and_then(|m| m.name.as_deref())
            .unwrap_or_default()
    }

    fn creation_timestamp(&self) -> Option<&DateTime<Utc>> {
        self.meta().and_then(|m| m.creation_timestamp.as_ref())
    }

    fn labels(&self) -> Option<&BTreeMap<String, String>> {
        self.meta().and_then(|m| m.labels.as_ref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Node {
    #[serde(default)]
    pub metadata: Option<ObjectMeta>,
    #[serde(default)]
    pub status: Option<NodeStatus>,
}

impl Node {
    /// Capacity quantity for a resource name, e.g. `cpu` -> `"4"`
    pub fn capacity(&self, key: &str) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|s| s.capacity.as_ref())
            .and_then(|c| c.get(key))
            .map(String::as_str)
    }
}

impl HasMetadata for Node {
    fn meta(&self) -> Option<&ObjectMeta> {
        self.metadata.as_ref()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeStatus {
    #[serde(default)]
    pub capacity: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Pod {
    #[serde(default)]
    pub metadata: Option<ObjectMeta>,
    #[serde(default)]
    pub status: Option<PodStatus>,
}

impl Pod {
    /// Address of the hosting node, `""` until the pod is scheduled
    pub fn host_ip(&self) -> &str {
        self.status
            .as_ref()
            .and_then(|s| s.host_ip.as_deref())
            .unwrap_or_default()
    }

    /// Status conditions, empty when absent or `null`
    pub fn conditions(&self) -> &[PodCondition] {
        self.status
            .as_ref()
            .and_then(|s| s.conditions.as_deref())
            .unwrap_or_default()
    }
}

impl HasMetadata for Pod {
    fn meta(&self) -> Option<&ObjectMeta> {
        self.metadata.as_ref()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PodStatus {
    #[serde(rename = "hostIP", default)]
    pub host_ip: Option<String>,
    #[serde(default)]
    pub conditions: Option<Vec<PodCondition>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PodCondition {
    #[serde(rename = "type", default)]
    pub condition_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Service {
    #[serde(default)]
    pub metadata: Option<ObjectMeta>,
}

impl HasMetadata for Service {
    fn meta(&self) -> Option<&ObjectMeta> {
        self.metadata.as_ref()
    }
}

/// Random identifier shared by every row written in one collector run
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchTag(String);

impl BatchTag {
    /// Fresh random tag of `BATCH_TAG_LEN` alphanumeric characters
    pub fn generate() -> Self {
        let tag = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(BATCH_TAG_LEN)
            .map(char::from)
            .collect();
        Self(tag)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BatchTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One row per node per collector run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub node_name: String,
    pub cpu_cores: String,
    pub gpu_cores: String,
    pub memory_size: String,
    pub pod_limit: String,
    pub create_time: String,
    pub record_time: String,
    pub tag: BatchTag,
}

/// One row per pod per collector run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodRecord {
    pub pod_name: String,
    pub host_ip: String,
    /// Length of the pod's condition list, used as a container-count proxy
    pub container_count: String,
    /// Number of pods in the list this row was taken from
    pub total_pods: String,
    /// Sum of `container_count` over the whole list, identical on every row
    pub total_containers: String,
    pub create_time: String,
    pub record_time: String,
    pub tag: BatchTag,
}

/// One row per service per collector run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub service_name: String,
    pub total_services: String,
    pub create_time: String,
    pub record_time: String,
    pub tag: BatchTag,
}

/// Unit accepted by the record store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum InventoryRecord {
    Node(NodeRecord),
    Pod(PodRecord),
    Service(ServiceRecord),
}

impl InventoryRecord {
    /// Resource kind the record was taken from
    pub fn kind(&self) -> ResourceKind {
        match self {
            InventoryRecord::Node(_) => ResourceKind::Nodes,
            InventoryRecord::Pod(_) => ResourceKind::Pods,
            InventoryRecord::Service(_) => ResourceKind::Services,
        }
    }

    pub fn tag(&self) -> &BatchTag {
        match self {
            InventoryRecord::Node(r) => &r.tag,
            InventoryRecord::Pod(r) => &r.tag,
            InventoryRecord::Service(r) => &r.tag,
        }
    }

    pub fn record_time(&self) -> &str {
        match self {
            InventoryRecord::Node(r) => &r.record_time,
            InventoryRecord::Pod(r) => &r.record_time,
            InventoryRecord::Service(r) => &r.record_time,
        }
    }
}

impl From<NodeRecord> for InventoryRecord {
    fn from(record: NodeRecord) -> Self {
        InventoryRecord::Node(record)
    }
}

impl From<PodRecord> for InventoryRecord {
    fn from(record: PodRecord) -> Self {
        InventoryRecord::Pod(record)
    }
}

impl From<ServiceRecord> for InventoryRecord {
    fn from(record: ServiceRecord) -> Self {
        InventoryRecord::Service(record)
    }
}

/// Produces record timestamps in a fixed offset from UTC
#[derive(Debug, Clone, Copy)]
pub struct RecordClock {
    offset: FixedOffset,
}

impl RecordClock {
    /// Returns `None` when the offset is outside +/-23 hours
    pub fn with_offset_hours(hours: i32) -> Option<Self> {
        let offset = FixedOffset::east_opt(hours.checked_mul(3600)?)?;
        Some(Self { offset })
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }

    /// Current wall-clock time shifted to the configured offset
    pub fn stamp(&self) -> String {
        self.now().format(TIME_FORMAT).to_string()
    }
}

impl Default for RecordClock {
    fn default() -> Self {
        Self::with_offset_hours(DEFAULT_RECORD_OFFSET_HOURS).unwrap_or(Self { offset: Utc.fix() })
    }
}

/// Render a source creation timestamp (UTC); absent timestamps become `""`
pub fn format_creation_time(timestamp: Option<&DateTime<Utc>>) -> String {
    timestamp
        .map(|ts| ts.format(TIME_FORMAT).to_string())
        .unwrap_or_default()
}
