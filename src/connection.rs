//! DuckDB connection manager
//!
//! One physical handle per process; lightweight per-thread cursors cloned
//! from it. A cursor is checked out of a mutex-guarded map keyed by thread
//! id and returned when the guard drops, so the same thread gets the same
//! cursor back on its next acquire while other threads run concurrently on
//! their own cursors.

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};

use duckdb::{AccessMode, Config, Connection};

use crate::errors::{MacroError, MacroResult};
use crate::observability::Logger;

/// Manages the physical DuckDB handle and per-thread cursors
pub struct ConnectionManager {
    db_path: String,
    read_only: bool,
    main: Mutex<Option<Connection>>,
    cursors: Arc<Mutex<HashMap<ThreadId, Connection>>>,
    active: Arc<Mutex<usize>>,
}

impl ConnectionManager {
    /// Open the physical handle. Fails on an invalid path or an unopenable
    /// database; construction failure is fatal, not retried.
    pub fn new(db_path: &str, read_only: bool) -> MacroResult<Self> {
        Self::validate_path(db_path)?;

        let manager = Self {
            db_path: db_path.to_string(),
            read_only,
            main: Mutex::new(None),
            cursors: Arc::new(Mutex::new(HashMap::new())),
            active: Arc::new(Mutex::new(0)),
        };
        manager.init_main()?;
        Ok(manager)
    }

    /// Security boundary against path traversal, evaluated once here and
    /// never per-query. The in-memory pseudo-path is always allowed.
    fn validate_path(db_path: &str) -> MacroResult<()> {
        if db_path == ":memory:" {
            return Ok(());
        }
        if db_path.starts_with('/') || db_path.split(['/', '\\']).any(|seg| seg == "..") {
            return Err(MacroError::Config(format!(
                "Invalid database path: {}",
                db_path
            )));
        }
        Ok(())
    }

    fn open_connection(&self) -> MacroResult<Connection> {
        let conn = if self.read_only && self.db_path != ":memory:" {
            let config = Config::default()
                .access_mode(AccessMode::ReadOnly)
                .map_err(|e| MacroError::Connection(e.to_string()))?;
            Connection::open_with_flags(&self.db_path, config)
                .map_err(|e| MacroError::Connection(e.to_string()))?
        } else {
            Connection::open(&self.db_path)
                .map_err(|e| MacroError::Connection(e.to_string()))?
        };
        Ok(conn)
    }

    fn init_main(&self) -> MacroResult<()> {
        let mut main = self
            .main
            .lock()
            .map_err(|_| MacroError::Connection("connection lock poisoned".to_string()))?;
        if main.is_none() {
            *main = Some(self.open_connection()?);
            Logger::info(
                "CONNECTION_OPENED",
                &[
                    ("path", &self.db_path),
                    ("read_only", if self.read_only { "true" } else { "false" }),
                ],
            );
        }
        Ok(())
    }

    /// Acquire the calling thread's cursor, creating it from the main
    /// handle if absent. If the handle itself is gone (after `close`),
    /// initialization is retried once before a connection error.
    pub fn acquire(&self) -> MacroResult<CursorGuard> {
        let thread_id = thread::current().id();

        let existing = {
            let mut cursors = self
                .cursors
                .lock()
                .map_err(|_| MacroError::Connection("cursor lock poisoned".to_string()))?;
            cursors.remove(&thread_id)
        };

        let cursor = match existing {
            Some(cursor) => cursor,
            None => {
                self.init_main()?;
                let main = self
                    .main
                    .lock()
                    .map_err(|_| MacroError::Connection("connection lock poisoned".to_string()))?;
                let conn = main.as_ref().ok_or_else(|| {
                    MacroError::Connection("failed to initialize database connection".to_string())
                })?;
                let cursor = conn
                    .try_clone()
                    .map_err(|e| MacroError::Connection(e.to_string()))?;
                {
                    let mut active = self.active.lock().map_err(|_| {
                        MacroError::Connection("counter lock poisoned".to_string())
                    })?;
                    *active += 1;
                }
                Logger::debug("CURSOR_CREATED", &[("path", &self.db_path)]);
                cursor
            }
        };

        Ok(CursorGuard {
            cursors: Arc::clone(&self.cursors),
            active: Arc::clone(&self.active),
            thread_id,
            cursor: Some(cursor),
        })
    }

    /// Run a trivial query; never errors, false on any failure
    pub fn test_connection(&self) -> bool {
        match self.acquire() {
            Ok(cursor) => cursor
                .query_row("SELECT 1", [], |row| row.get::<_, i32>(0))
                .is_ok(),
            Err(_) => false,
        }
    }

    /// Number of cursors created and not yet released by `close`
    pub fn active_count(&self) -> usize {
        self.active.lock().map(|n| *n).unwrap_or(0)
    }

    /// Drop all cursors, then the physical handle. Safe when nothing is
    /// open; a later `acquire` re-initializes the handle.
    pub fn close(&self) {
        if let Ok(mut cursors) = self.cursors.lock() {
            cursors.clear();
        }
        if let Ok(mut main) = self.main.lock() {
            *main = None;
        }
        if let Ok(mut active) = self.active.lock() {
            *active = 0;
        }
        Logger::info("CONNECTION_CLOSED", &[("path", &self.db_path)]);
    }

    /// Configured database path
    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    /// True when the physical handle was opened read-only
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }
}

/// RAII cursor handle; returns the cursor to the per-thread map on drop
/// so every exit path, including errors, releases it. When a thread holds
/// two guards at once, the second return overwrites the first cursor in
/// the map; the displaced cursor is dropped and the counter adjusted.
pub struct CursorGuard {
    cursors: Arc<Mutex<HashMap<ThreadId, Connection>>>,
    active: Arc<Mutex<usize>>,
    thread_id: ThreadId,
    cursor: Option<Connection>,
}

impl Deref for CursorGuard {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        // Invariant: cursor is only taken in drop
        self.cursor.as_ref().unwrap()
    }
}

impl Drop for CursorGuard {
    fn drop(&mut self) {
        if let Some(cursor) = self.cursor.take() {
            if let Ok(mut cursors) = self.cursors.lock() {
                if cursors.insert(self.thread_id, cursor).is_some() {
                    if let Ok(mut active) = self.active.lock() {
                        *active = active.saturating_sub(1);
                    }
                }
            }
        }
    }
}
