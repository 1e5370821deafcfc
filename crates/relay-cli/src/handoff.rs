use crate::print_json;
use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use relay_core::DatabaseManager;

/// Handoff-related commands
#[derive(Subcommand)]
pub enum HandoffCommands {
    /// Claim the oldest open handoff for a project
    Claim(HandoffClaimArgs),
    /// List open handoffs for a project
    List(HandoffListArgs),
}

#[derive(Args)]
pub struct HandoffClaimArgs {
    /// Session taking over the work
    #[arg(long = "session", value_name = "SESSION_ID")]
    pub session: String,

    #[arg(long = "project", value_name = "PROJECT")]
    pub project: String,

    /// Only claim handoffs from this workflow
    #[arg(long = "workflow", value_name = "WORKFLOW")]
    pub workflow: Option<String>,
}

#[derive(Args)]
pub struct HandoffListArgs {
    #[arg(long = "project", value_name = "PROJECT")]
    pub project: String,
}

impl HandoffCommands {
    pub fn run(self, db: &DatabaseManager) -> Result<()> {
        let handoffs = db.handoffs();
        match self {
            HandoffCommands::Claim(args) => {
                let claimed = handoffs
                    .claim(&args.session, &args.project, args.workflow.as_deref())
                    .context("Failed to claim handoff")?;
                print_json(&claimed)
            }
            HandoffCommands::List(args) => {
                let open = handoffs
                    .list_open(&args.project)
                    .context("Failed to list handoffs")?;
                print_json(&open)
            }
        }
    }
}
