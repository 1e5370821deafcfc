//! Database connection management.

use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// How long a connection waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared, mutex-guarded SQLite connection.
///
/// Cloning is cheap and every clone talks to the same connection. Separate
/// processes (or separate `Database::open` calls on one file) get separate
/// connections and rely on SQLite locking for atomicity.
#[derive(Debug, Clone)]
pub struct Database {
    connection: Arc<std::sync::Mutex<Connection>>,
}

impl Database {
    /// Get the default database path based on the RELAY_HOME environment variable or platform defaults.
    ///
    /// Priority order:
    /// 1. RELAY_HOME environment variable
    /// 2. Platform-specific defaults:
    ///    - Linux: `${XDG_STATE_HOME:-~/.local/state}/relay/state.db`
    ///    - macOS: `~/Library/Application Support/relay/state.db`
    ///    - Windows: `%LOCALAPPDATA%\relay\state.db`
    pub fn default_path() -> crate::Result<PathBuf> {
        if let Ok(relay_home) = std::env::var("RELAY_HOME") {
            return Ok(PathBuf::from(relay_home).join("state.db"));
        }

        #[cfg(target_os = "linux")]
        {
            let state_home = match std::env::var("XDG_STATE_HOME") {
                Ok(dir) => PathBuf::from(dir),
                Err(_) => home_dir()?.join(".local").join("state"),
            };
            Ok(state_home.join("relay").join("state.db"))
        }

        #[cfg(target_os = "macos")]
        {
            Ok(home_dir()?
                .join("Library")
                .join("Application Support")
                .join("relay")
                .join("state.db"))
        }

        #[cfg(target_os = "windows")]
        {
            let local_appdata = std::env::var("LOCALAPPDATA").map_err(|_| {
                crate::Error::generic("LOCALAPPDATA environment variable not set")
            })?;
            Ok(PathBuf::from(local_appdata).join("relay").join("state.db"))
        }

        #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
        {
            Ok(home_dir()?.join(".relay").join("state.db"))
        }
    }

    /// Open the database at the default path, creating parent directories.
    pub fn open_default() -> crate::Result<Self> {
        let path = Self::default_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::open(&path)
    }

    /// Open a new database connection at the specified path.
    ///
    /// If the path doesn't exist, the database will be created.
    pub fn open<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        // WAL lets readers proceed while another connection holds the write lock
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        tracing::debug!(journal_mode = %mode, "Opened relay database");
        Self::initialize_schema(&conn)?;
        Ok(Self {
            connection: Arc::new(std::sync::Mutex::new(conn)),
        })
    }

    /// Open an in-memory database for testing.
    pub fn open_in_memory() -> crate::Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            connection: Arc::new(std::sync::Mutex::new(conn)),
        })
    }

    fn initialize_schema(conn: &Connection) -> crate::Result<()> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        crate::migrations::MigrationManager::migrate(conn)?;
        Ok(())
    }

    /// Get a reference to the underlying connection.
    ///
    /// The caller must hold the lock for the whole statement (or group of
    /// statements) it runs.
    pub fn connection(&self) -> &std::sync::Mutex<Connection> {
        &self.connection
    }

    /// Run `f` with the connection locked, outside any explicit transaction.
    ///
    /// Each statement `f` executes commits on its own.
    pub fn with_connection<F, T>(&self, f: F) -> crate::Result<T>
    where
        F: FnOnce(&Connection) -> crate::Result<T>,
    {
        let conn = self.connection.lock().map_err(|e| {
            crate::Error::generic(format!("Failed to acquire database lock: {}", e))
        })?;
        f(&conn)
    }

    /// Execute a transaction with automatic rollback on error.
    pub fn transaction<F, T>(&self, f: F) -> crate::Result<T>
    where
        F: FnOnce(&Connection) -> crate::Result<T>,
    {
        let conn = self.connection.lock().map_err(|e| {
            crate::Error::generic(format!("Failed to acquire database lock: {}", e))
        })?;

        let tx = conn.unchecked_transaction()?;
        match f(&tx) {
            Ok(result) => {
                tx.commit()?;
                Ok(result)
            }
            Err(e) => {
                tx.rollback()?;
                Err(e)
            }
        }
    }
}

#[cfg(not(target_os = "windows"))]
fn home_dir() -> crate::Result<PathBuf> {
    std::env::var("HOME")
        .map(PathBuf::from)
        .map_err(|_| crate::Error::generic("HOME environment variable not set"))
}
