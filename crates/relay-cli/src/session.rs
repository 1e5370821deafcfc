use crate::print_json;
use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use relay_core::{DatabaseManager, SessionStatus};

/// Session-related commands
#[derive(Subcommand)]
pub enum SessionCommands {
    /// Register a new active session
    Register(SessionRegisterArgs),
    /// Show a session as JSON
    Show(SessionIdArgs),
    /// Replace the summary successors inject as context
    Summary(SessionSummaryArgs),
    /// Set the status of a session
    SetStatus(SessionSetStatusArgs),
}

#[derive(Args)]
pub struct SessionRegisterArgs {
    /// Project the session works on
    #[arg(long = "project", value_name = "PROJECT")]
    pub project: String,

    /// Session this one continues from
    #[arg(long = "parent", value_name = "SESSION_ID")]
    pub parent: Option<String>,
}

#[derive(Args)]
pub struct SessionIdArgs {
    #[arg(value_name = "SESSION_ID")]
    pub id: String,
}

#[derive(Args)]
pub struct SessionSummaryArgs {
    #[arg(value_name = "SESSION_ID")]
    pub id: String,

    /// Summary text (markdown)
    #[arg(long = "text", value_name = "TEXT")]
    pub text: String,
}

#[derive(Args)]
pub struct SessionSetStatusArgs {
    #[arg(value_name = "SESSION_ID")]
    pub id: String,

    /// active, paused, handoff_ready, completed or failed
    #[arg(value_name = "STATUS")]
    pub status: SessionStatus,
}

impl SessionCommands {
    pub fn run(self, db: &DatabaseManager) -> Result<()> {
        let sessions = db.sessions();
        match self {
            SessionCommands::Register(args) => {
                if let Some(parent) = &args.parent {
                    sessions
                        .find(parent)?
                        .with_context(|| format!("Parent session {} not found", parent))?;
                }
                let session = sessions
                    .register(&args.project, args.parent.as_deref())
                    .context("Failed to register session")?;
                print_json(&session)
            }
            SessionCommands::Show(args) => {
                let session = sessions
                    .find(&args.id)?
                    .with_context(|| format!("Session {} not found", args.id))?;
                print_json(&session)
            }
            SessionCommands::Summary(args) => {
                sessions
                    .update_summary(&args.id, &args.text)
                    .context("Failed to update session summary")?;
                println!("Updated summary for session {}", args.id);
                Ok(())
            }
            SessionCommands::SetStatus(args) => {
                sessions
                    .set_status(&args.id, args.status)
                    .context("Failed to update session status")?;
                println!("Session {} is now {}", args.id, args.status);
                Ok(())
            }
        }
    }
}
