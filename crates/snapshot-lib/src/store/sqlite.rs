//! SQLite-backed record store
//!
//! One table per resource kind. Tables are created on open when missing.
//! Inserts run on the blocking pool behind a single connection mutex, which
//! serialises concurrent writers from the three collectors.

use super::RecordStore;
use crate::error::StoreError;
use crate::models::{InventoryRecord, ResourceKind};
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS nodes (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    node_name   TEXT NOT NULL,
    cpu_cores   TEXT NOT NULL,
    gpu_cores   TEXT NOT NULL,
    memory_size TEXT NOT NULL,
    pod_limit   TEXT NOT NULL,
    create_time TEXT NOT NULL,
    record_time TEXT NOT NULL,
    tag         TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS pods (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    pod_name         TEXT NOT NULL,
    host_ip          TEXT NOT NULL,
    container_count  TEXT NOT NULL,
    total_pods       TEXT NOT NULL,
    total_containers TEXT NOT NULL,
    create_time      TEXT NOT NULL,
    record_time      TEXT NOT NULL,
    tag              TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS services (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    service_name   TEXT NOT NULL,
    total_services TEXT NOT NULL,
    create_time    TEXT NOT NULL,
    record_time    TEXT NOT NULL,
    tag            TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_nodes_tag ON nodes(tag);
CREATE INDEX IF NOT EXISTS idx_pods_tag ON pods(tag);
CREATE INDEX IF NOT EXISTS idx_services_tag ON services(tag);
"#;

/// Relational store for node, pod and service summaries
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open or create the database file and ensure the schema exists
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        info!(path = %path.display(), "Opened sqlite record store");
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Number of rows stored for a resource kind
    pub async fn count(&self, kind: ResourceKind) -> Result<i64, StoreError> {
        self.with_conn(move |conn| {
            let sql = format!("SELECT COUNT(*) FROM {}", kind.as_str());
            conn.query_row(&sql, [], |row| row.get(0))
        })
        .await
    }

    /// Distinct batch tags stored for a resource kind
    pub async fn tags(&self, kind: ResourceKind) -> Result<Vec<String>, StoreError> {
        self.with_conn(move |conn| {
            let sql = format!("SELECT DISTINCT tag FROM {} ORDER BY tag", kind.as_str());
            let mut stmt = conn.prepare(&sql)?;
            let tags = stmt
                .query_map([], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            Ok(tags)
        })
        .await
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|_| StoreError::Poisoned)?;
            f(&conn).map_err(StoreError::from)
        })
        .await
        .map_err(|e| StoreError::Internal(e.to_string()))?
    }
}

fn insert_record(conn: &Connection, record: &InventoryRecord) -> rusqlite::Result<i64> {
    match record {
        InventoryRecord::Node(n) => conn.execute(
            "INSERT INTO nodes (node_name, cpu_cores, gpu_cores, memory_size, pod_limit, \
             create_time, record_time, tag) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                n.node_name,
                n.cpu_cores,
                n.gpu_cores,
                n.memory_size,
                n.pod_limit,
                n.create_time,
                n.record_time,
                n.tag.as_str(),
            ],
        )?,
        InventoryRecord::Pod(p) => conn.execute(
            "INSERT INTO pods (pod_name, host_ip, container_count, total_pods, \
             total_containers, create_time, record_time, tag) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                p.pod_name,
                p.host_ip,
                p.container_count,
                p.total_pods,
                p.total_containers,
                p.create_time,
                p.record_time,
                p.tag.as_str(),
            ],
        )?,
        InventoryRecord::Service(s) => conn.execute(
            "INSERT INTO services (service_name, total_services, create_time, record_time, tag) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                s.service_name,
                s.total_services,
                s.create_time,
                s.record_time,
                s.tag.as_str(),
            ],
        )?,
    };

    Ok(conn.last_insert_rowid())
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn insert(&self, record: InventoryRecord) -> Result<i64, StoreError> {
        self.with_conn(move |conn| insert_record(conn, &record)).await
    }
}
