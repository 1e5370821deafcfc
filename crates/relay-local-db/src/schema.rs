//! Database schema definitions and constants.

// Current schema version
pub const SCHEMA_VERSION: u32 = 1;

// Table names
pub const TABLE_SCHEMA_MIGRATIONS: &str = "schema_migrations";
pub const TABLE_SESSIONS: &str = "sessions";
pub const TABLE_WORKFLOW_STATES: &str = "workflow_states";
pub const TABLE_WORKFLOW_HANDOFFS: &str = "workflow_handoffs";
