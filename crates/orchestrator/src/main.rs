//! Thin CLI entrypoint over the Raid/Orchestrator facade.
//!
//! Interactive CLI/TUI and configuration loading are out of scope (SPEC_FULL
//! §1) beyond this trivial glue: parse arguments, call one `Orchestrator`
//! method, print the result. `anyhow` is used here and only here in this
//! crate (SPEC_FULL §2.2); every library module returns its own `thiserror`
//! type instead.

use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};

use undercity_orchestrator::raid::{Orchestrator, OrchestratorError, PlanGenerator};
use undercity_kernel::PlannedTask;

#[derive(Parser, Debug)]
#[command(author, version, about = "undercity: multi-agent coding raid orchestrator", long_about = None)]
struct Args {
    /// State directory holding pocket/inventory/stash and the other persisted stores.
    #[arg(long, global = true, default_value = ".undercity")]
    state_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start a new raid, or resume the active one if the pocket already points at one.
    Start {
        /// Natural-language engineering objective.
        goal: String,
    },
    /// Approve the active raid's plan and hand its tasks to the caller for scheduling.
    ApprovePlan,
    /// Mark the active raid complete and move it into stash history.
    Extract,
    /// Abort the active raid, mark it failed, and move it into stash history.
    Surrender,
    /// Print a read-only snapshot of the active raid, if any.
    Status,
}

/// Turns a raw goal into a single-task plan.
///
/// Plan generation's content is out of scope (SPEC_FULL §4.H: "it ultimately
/// comes from an LLM or a human"); this exists only so the CLI's `start`
/// command has something to hand the Orchestrator that satisfies the
/// `PlanGenerator` shape. A real deployment supplies its own implementation.
struct SingleTaskPlan;

#[async_trait]
impl PlanGenerator for SingleTaskPlan {
    async fn generate_plan(&self, goal: &str) -> Result<Vec<PlannedTask>, OrchestratorError> {
        Ok(vec![PlannedTask {
            id: uuid::Uuid::new_v4().to_string(),
            objective: goal.to_string(),
            depends_on: Vec::new(),
            conflicts: Vec::new(),
            priority: 0,
            estimated_files: Vec::new(),
        }])
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("undercity=info".parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();

    let orchestrator = Orchestrator::new(&args.state_dir);

    match args.command {
        Command::Start { goal } => {
            let raid = orchestrator
                .start(&goal, &SingleTaskPlan)
                .await
                .context("failed to start raid")?;
            println!("{}", serde_json::to_string_pretty(&raid)?);
        }
        Command::ApprovePlan => {
            let waypoints = orchestrator.approve_plan().context("failed to approve plan")?;
            println!("{}", serde_json::to_string_pretty(&waypoints)?);
        }
        Command::Extract => {
            let completed = orchestrator.extract().context("failed to extract raid")?;
            println!("{}", serde_json::to_string_pretty(&completed)?);
        }
        Command::Surrender => {
            let completed = orchestrator.surrender().context("failed to surrender raid")?;
            println!("{}", serde_json::to_string_pretty(&completed)?);
        }
        Command::Status => {
            let status = orchestrator.status();
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }

    Ok(())
}
