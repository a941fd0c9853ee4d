//! `tca-storage` — the embedded durable store: schema/migrations, the
//! bounded read pool, the single-writer queue, typed repositories per
//! entity, and dynamic-settings resolution.
//!
//! Nothing above the pool/writer primitives talks to `rusqlite` directly;
//! callers compose repository functions inside a closure submitted to the
//! [`writer::WriterQueue`] for writes, or call them directly against a
//! pooled connection for reads.

pub mod cursor;
pub mod error;
pub mod model;
pub mod pool;
pub mod repo;
pub mod resolver;
pub mod schema;
pub mod timefmt;
pub mod writer;

pub use error::{Result, StorageError};
pub use pool::{ReadConn, ReadPool};
pub use writer::WriterQueue;

use std::sync::Arc;

/// Owns both storage engines for the process lifetime: the bounded read
/// pool and the single-writer queue, both opened against the same file.
pub struct Store {
    pub read_pool: ReadPool,
    pub writer: Arc<WriterQueue>,
}

impl Store {
    pub fn open(db_path: &str, read_pool_size: u32) -> Result<Self> {
        let writer_conn = pool::open_writer_connection(db_path)?;
        let read_pool = pool::open_read_pool(db_path, read_pool_size)?;
        Ok(Self {
            read_pool,
            writer: Arc::new(WriterQueue::spawn(writer_conn)),
        })
    }

    pub fn read(&self) -> Result<ReadConn> {
        Ok(self.read_pool.get()?)
    }

    pub async fn close(&self) {
        self.writer.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_in_memory_variant_applies_migrations() {
        // Store::open requires a file path (r2d2_sqlite needs a shareable
        // file, not `:memory:`, for the pool to see the writer's data), so
        // this exercises the pool/writer wiring against a tempdir path.
        let dir = std::env::temp_dir().join(format!("tca-storage-test-{}", uuid::Uuid::new_v4()));
        let path = dir.to_str().unwrap().to_string();
        let store = Store::open(&path, 2).unwrap();
        let count: i64 = store
            .read()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
        store.close().await;
        let _ = std::fs::remove_file(&path);
    }
}
