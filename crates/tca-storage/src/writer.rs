use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rusqlite::Connection;
use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex};
use tokio::task::JoinHandle;

use crate::error::{Result, StorageError};

type Job = Box<dyn FnOnce(&mut Connection) + Send>;

enum Message {
    Job(Job),
    Close,
}

/// Single-consumer FIFO writer queue.
///
/// The only legitimate writer against the store. Every submitted closure
/// runs inside its own transaction on a dedicated blocking thread (rusqlite
/// connections are `!Sync`); the closure's return value commits the
/// transaction, an error rolls it back. Submissions are processed strictly
/// in arrival order — at most one runs at a time.
pub struct WriterQueue {
    tx: mpsc::UnboundedSender<Message>,
    closed: Arc<AtomicBool>,
    handle: AsyncMutex<Option<JoinHandle<()>>>,
}

impl WriterQueue {
    /// Spawns the consumer thread that owns `conn` for the lifetime of the
    /// queue. `conn` must already have pragmas applied and migrations run.
    pub fn spawn(conn: Connection) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

        let handle = tokio::task::spawn_blocking(move || {
            let mut conn = conn;
            while let Some(message) = rx.blocking_recv() {
                match message {
                    Message::Job(job) => job(&mut conn),
                    Message::Close => break,
                }
            }
        });

        Self {
            tx,
            closed: Arc::new(AtomicBool::new(false)),
            handle: AsyncMutex::new(Some(handle)),
        }
    }

    /// Submits a closure and awaits its completion. The closure receives a
    /// live transaction; returning `Ok` commits it, returning `Err` rolls it
    /// back. The transaction commit/rollback itself is handled here, not by
    /// the caller.
    pub async fn submit<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&rusqlite::Transaction<'_>) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StorageError::WriterClosed);
        }

        let (reply_tx, reply_rx) = oneshot::channel::<Result<T>>();
        let job: Job = Box::new(move |conn| {
            let outcome = (|| -> Result<T> {
                let tx = conn.transaction()?;
                let value = f(&tx)?;
                tx.commit()?;
                Ok(value)
            })();
            let _ = reply_tx.send(outcome);
        });

        self.tx
            .send(Message::Job(job))
            .map_err(|_| StorageError::WriterClosed)?;

        reply_rx.await.map_err(|_| StorageError::WriterClosed)?
    }

    /// Marks the queue closed (rejecting new submissions), lets all
    /// already-queued closures drain, then awaits the consumer thread.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.tx.send(Message::Close);
        if let Some(handle) = self.handle.lock().await.take() {
            let _ = handle.await;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_queue() -> WriterQueue {
        let conn = Connection::open_in_memory().unwrap();
        crate::schema::apply_connection_pragmas(&conn).unwrap();
        let mut conn = conn;
        crate::schema::migrate(&mut conn).unwrap();
        WriterQueue::spawn(conn)
    }

    #[tokio::test]
    async fn submissions_run_in_fifo_order() {
        let queue = memory_queue().await;
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        // Fire off all submissions without awaiting each one in turn, then
        // verify the consumer thread still executed them in send order.
        let mut futures = Vec::new();
        for i in 0..10 {
            let order = order.clone();
            futures.push(queue.submit(move |_tx| {
                order.lock().unwrap().push(i);
                Ok(())
            }));
        }
        for f in futures {
            f.await.unwrap();
        }

        assert_eq!(*order.lock().unwrap(), (0..10).collect::<Vec<_>>());
        queue.close().await;
    }

    #[tokio::test]
    async fn error_rolls_back_and_propagates() {
        let queue = memory_queue().await;
        let result: Result<()> = queue
            .submit(|tx| {
                tx.execute(
                    "INSERT INTO settings (key, value_json, updated_at) VALUES ('x', '1', 'now')",
                    [],
                )?;
                Err(StorageError::WriterClosed)
            })
            .await;
        assert!(result.is_err());

        let count: i64 = queue
            .submit(|tx| Ok(tx.query_row("SELECT COUNT(*) FROM settings", [], |r| r.get(0))?))
            .await
            .unwrap();
        assert_eq!(count, 0);
        queue.close().await;
    }

    #[tokio::test]
    async fn submissions_after_close_fail() {
        let queue = memory_queue().await;
        queue.close().await;
        let result: Result<()> = queue.submit(|_tx| Ok(())).await;
        assert!(matches!(result, Err(StorageError::WriterClosed)));
    }
}
