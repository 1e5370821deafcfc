//! Database integration for sessions, workflow state and handoffs.

use crate::handoff::HandoffManager;
use crate::session::SessionManager;
use crate::workflow::WorkflowState;
use relay_local_db::{Database, WorkflowStateStore};
use std::path::Path;

/// Entry point for everything relay keeps in SQLite.
#[derive(Debug, Clone)]
pub struct DatabaseManager {
    db: Database,
}

impl DatabaseManager {
    /// Open the database at the default path.
    pub fn new() -> crate::Result<Self> {
        let db = Database::open_default()?;
        Ok(Self { db })
    }

    /// Open the database at a custom path.
    pub fn with_path<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let db = Database::open(path)?;
        Ok(Self { db })
    }

    /// A throwaway in-memory database.
    pub fn in_memory() -> crate::Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self { db })
    }

    pub fn sessions(&self) -> SessionManager {
        SessionManager::new(self.db.clone())
    }

    pub fn handoffs(&self) -> HandoffManager {
        HandoffManager::new(self.db.clone())
    }

    pub fn load_workflow_state(&self, session_id: &str) -> crate::Result<Option<WorkflowState>> {
        let record = self
            .db
            .with_connection(|conn| WorkflowStateStore::new(conn).load(session_id))?;
        record.map(WorkflowState::from_record).transpose()
    }

    pub fn save_workflow_state(&self, state: &WorkflowState) -> crate::Result<()> {
        let record = state.to_record()?;
        self.db
            .with_connection(|conn| WorkflowStateStore::new(conn).save(&record))?;
        Ok(())
    }

    /// Get access to the underlying database for advanced operations.
    pub fn database(&self) -> &Database {
        &self.db
    }
}
