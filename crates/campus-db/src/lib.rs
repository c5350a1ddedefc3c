pub mod migrations;
pub mod models;
pub mod queries;
pub mod seats;

pub use rusqlite::Connection;

use anyhow::Result;
use rusqlite::{ErrorCode, OpenFlags};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, TryLockError};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::info;

const READER_POOL_SIZE: usize = 4;

/// How long SQLite waits on a locked database file before giving up with
/// `SQLITE_BUSY`.
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// How often a deadline-bounded writer waits between lock attempts.
const WRITER_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// The writer connection was still held by someone else when the caller's
/// deadline passed. Nothing was executed.
#[derive(Debug, Error)]
#[error("writer connection still busy at deadline")]
pub struct DeadlineExceeded;

/// SQLite handle with a reader/writer split.
///
/// All writes are funnelled through a single connection, so every write
/// transaction sees the effects of the previous one. Reads go round-robin
/// over a small pool of read-only connections (WAL mode lets them run
/// alongside the writer).
pub struct Database {
    writer: Mutex<Connection>,
    readers: Vec<Mutex<Connection>>,
    reader_idx: AtomicUsize,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let writer = Connection::open(path)?;
        writer.pragma_update(None, "journal_mode", "WAL")?;
        writer.pragma_update(None, "foreign_keys", "ON")?;
        writer.busy_timeout(BUSY_TIMEOUT)?;

        migrations::run(&writer)?;

        let mut readers = Vec::with_capacity(READER_POOL_SIZE);
        for _ in 0..READER_POOL_SIZE {
            let conn = Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            conn.busy_timeout(BUSY_TIMEOUT)?;
            readers.push(Mutex::new(conn));
        }

        info!(
            "Database opened at {} (1 writer + {} readers)",
            path.display(),
            READER_POOL_SIZE
        );
        Ok(Self {
            writer: Mutex::new(writer),
            readers,
            reader_idx: AtomicUsize::new(0),
        })
    }

    /// Private in-memory database. Reads share the writer connection since
    /// an in-memory database is only visible to the connection that made it.
    pub fn open_in_memory() -> Result<Self> {
        let writer = Connection::open_in_memory()?;
        writer.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run(&writer)?;

        Ok(Self {
            writer: Mutex::new(writer),
            readers: Vec::new(),
            reader_idx: AtomicUsize::new(0),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        if self.readers.is_empty() {
            return self.with_conn_mut(f);
        }
        let idx = self.reader_idx.fetch_add(1, Ordering::Relaxed) % self.readers.len();
        let conn = self.readers[idx]
            .lock()
            .map_err(|e| anyhow::anyhow!("Reader lock poisoned: {}", e))?;
        f(&conn)
    }

    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .writer
            .lock()
            .map_err(|e| anyhow::anyhow!("Writer lock poisoned: {}", e))?;
        f(&conn)
    }

    /// Like [`with_conn_mut`](Self::with_conn_mut), but gives up with
    /// [`DeadlineExceeded`] if the writer can't be taken before `deadline`.
    /// `f` either runs to completion or not at all, so a caller that sees
    /// the error knows nothing was written.
    pub fn with_conn_mut_until<F, T>(&self, deadline: Instant, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        loop {
            match self.writer.try_lock() {
                Ok(conn) => {
                    if Instant::now() >= deadline {
                        return Err(DeadlineExceeded.into());
                    }
                    return f(&conn);
                }
                Err(TryLockError::WouldBlock) => {
                    if Instant::now() >= deadline {
                        return Err(DeadlineExceeded.into());
                    }
                    std::thread::sleep(WRITER_POLL_INTERVAL);
                }
                Err(TryLockError::Poisoned(e)) => {
                    return Err(anyhow::anyhow!("Writer lock poisoned: {}", e));
                }
            }
        }
    }
}

/// True when the error is a lock that could not be acquired in time, either
/// SQLite's own or the writer deadline. The failed call wrote nothing, so
/// it is safe to retry.
pub fn is_busy(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause.is::<DeadlineExceeded>()
            || matches!(
                cause.downcast_ref::<rusqlite::Error>(),
                Some(rusqlite::Error::SqliteFailure(e, _))
                    if matches!(e.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
            )
    })
}

/// True when the error is a UNIQUE (or other constraint) violation.
pub fn is_constraint_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<rusqlite::Error>(),
            Some(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation
        )
    })
}
