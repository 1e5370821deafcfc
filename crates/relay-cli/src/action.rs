use crate::print_json;
use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use relay_core::{
    ActionContext, ActionOutcome, DatabaseManager, Dispatcher, JinjaTemplateEngine, WorkflowState,
};
use serde_json::Value;
use std::path::PathBuf;
use tracing::{info, warn};

/// Phase given to a workflow state created without `--phase`.
pub const DEFAULT_PHASE: &str = "start";

/// Action-related commands
#[derive(Subcommand)]
pub enum ActionCommands {
    /// Dispatch one action against a session's workflow state
    Run(ActionRunArgs),
    /// List the registered action names
    List,
}

#[derive(Args)]
pub struct ActionRunArgs {
    #[arg(long = "session", value_name = "SESSION_ID")]
    pub session: String,

    #[arg(long = "workflow", value_name = "WORKFLOW")]
    pub workflow: String,

    /// Phase to run in; moving to a new phase resets its action count
    #[arg(long = "phase", value_name = "PHASE")]
    pub phase: Option<String>,

    /// Root for relative artifact patterns (defaults to the current directory)
    #[arg(long = "working-dir", value_name = "DIR")]
    pub working_dir: Option<PathBuf>,

    /// Action name, e.g. inject_context
    #[arg(value_name = "ACTION")]
    pub name: String,

    /// Action arguments as a JSON object
    #[arg(long = "args", value_name = "JSON", default_value = "{}")]
    pub args: String,
}

impl ActionCommands {
    pub async fn run(self, db: &DatabaseManager) -> Result<()> {
        match self {
            ActionCommands::Run(args) => args.run(db).await,
            ActionCommands::List => {
                for name in Dispatcher::with_builtin_actions().registry().names() {
                    println!("{}", name);
                }
                Ok(())
            }
        }
    }
}

impl ActionRunArgs {
    pub async fn run(self, db: &DatabaseManager) -> Result<()> {
        let raw: Value = serde_json::from_str(&self.args).context("--args is not valid JSON")?;
        let mut state = self.load_state(db)?;

        let sessions = db.sessions();
        let handoffs = db.handoffs();
        let templates = JinjaTemplateEngine::new();
        let dispatcher = Dispatcher::with_builtin_actions();

        let outcome = {
            let mut ctx = ActionContext::new(&mut state, &handoffs, &sessions, &templates);
            if let Some(dir) = &self.working_dir {
                ctx = ctx.with_working_dir(dir);
            }
            dispatcher.execute(&self.name, &mut ctx, raw).await
        };

        if outcome.as_ref().is_some_and(ActionOutcome::is_error) {
            warn!(action = %self.name, session_id = %self.session, "Action did not succeed");
        }

        db.save_workflow_state(&state)
            .context("Failed to save workflow state")?;
        info!(
            session_id = %state.session_id,
            phase = %state.phase,
            phase_action_count = state.phase_action_count,
            "Saved workflow state"
        );

        print_json(&outcome)
    }

    fn load_state(&self, db: &DatabaseManager) -> Result<WorkflowState> {
        let existing = db
            .load_workflow_state(&self.session)
            .context("Failed to load workflow state")?;

        let Some(mut state) = existing else {
            let phase = self.phase.as_deref().unwrap_or(DEFAULT_PHASE);
            return Ok(WorkflowState::new(&self.session, &self.workflow, phase));
        };

        if state.workflow_name != self.workflow {
            anyhow::bail!(
                "Session {} is running workflow {}, not {}",
                self.session,
                state.workflow_name,
                self.workflow
            );
        }
        if let Some(phase) = &self.phase {
            if *phase != state.phase {
                state.transition_to(phase.as_str());
            }
        }
        Ok(state)
    }
}
