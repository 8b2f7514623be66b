//! `geomerge task` subcommands.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use geomerge::GeomergeError;
use geomerge::config::GeomergeConfig;
use geomerge::document::save_graph;
use geomerge::format::OutputFormat;
use geomerge::report::MergeReport;
use geomerge::session::EditSession;
use geomerge::task::{DirectoryTaskSource, Task, TaskSource, TaskStatus};

use crate::merge_cmd::{FormatArgs, load, print_report};

#[derive(Args, Debug)]
pub struct TaskArgs {
    /// Task directory (default from geomerge.toml)
    #[arg(long, global = true, env = "GEOMERGE_TASKS")]
    pub dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: TaskCommands,
}

/// `geomerge task` subcommands.
#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Show a task
    ///
    /// Examples:
    ///   geomerge task show 42
    ///   geomerge task show 42 --format json
    #[command(verbatim_doc_comment)]
    Show {
        /// Task id
        id: u64,

        #[command(flatten)]
        format: FormatArgs,
    },

    /// Merge a task's suggested edit into a graph
    ///
    /// The task is locked while the merge runs. With --mark, the task status
    /// is updated afterwards, but only if the merge raised no conflicts.
    ///
    /// Examples:
    ///   geomerge task apply 42 work.json -o work.json
    ///   geomerge task apply 42 work.json -o work.json --mark fixed
    #[command(verbatim_doc_comment)]
    Apply {
        /// Task id
        id: u64,

        /// Graph document with local edits
        target: PathBuf,

        /// Write the merged graph here (may be the target itself)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Status to set after a conflict-free merge
        #[arg(long)]
        mark: Option<TaskStatus>,

        #[command(flatten)]
        format: FormatArgs,
    },

    /// Change a task's status
    ///
    /// Deleted and disabled tasks keep their status.
    ///
    /// Statuses: created, fixed, false-positive, skipped, deleted,
    /// already-fixed, too-hard, answered, validated, disabled
    ///
    /// Examples:
    ///   geomerge task status 42 fixed
    #[command(verbatim_doc_comment)]
    Status {
        /// Task id
        id: u64,

        /// New status
        status: TaskStatus,
    },
}

pub fn run(args: &TaskArgs, config: &GeomergeConfig) -> Result<()> {
    let dir = args
        .dir
        .clone()
        .unwrap_or_else(|| config.tasks.directory.clone());
    let tasks = DirectoryTaskSource::new(dir);

    match &args.command {
        TaskCommands::Show { id, format } => show(&tasks, *id, format.resolve(config)),
        TaskCommands::Apply {
            id,
            target,
            output,
            mark,
            format,
        } => apply(
            &tasks,
            *id,
            target,
            output.as_deref(),
            *mark,
            config,
            format.resolve(config),
        ),
        TaskCommands::Status { id, status } => {
            let task = tasks.update_status(*id, *status)?;
            println!("Task {} is now {}.", task.id, task.status);
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn show(tasks: &DirectoryTaskSource, id: u64, format: OutputFormat) -> Result<()> {
    let task = tasks.task(id)?;
    match format {
        OutputFormat::Text => print!("{}", render_task(&task)),
        OutputFormat::Json => println!("{}", format.serialize(&task)?),
    }
    Ok(())
}

fn render_task(task: &Task) -> String {
    let mut out = format!(
        "Task {} (challenge {}): {}\n  status: {}\n",
        task.id, task.challenge_id, task.name, task.status
    );
    if let Some(b) = task.bounds {
        out.push_str(&format!(
            "  bounds: {},{} .. {},{}\n",
            b.min_lat, b.min_lon, b.max_lat, b.max_lon
        ));
    }
    if !task.instruction.is_empty() {
        out.push_str(&format!("\n{}\n", task.instruction));
    }
    out
}

// ---------------------------------------------------------------------------
// apply
// ---------------------------------------------------------------------------

fn apply(
    tasks: &DirectoryTaskSource,
    id: u64,
    target: &std::path::Path,
    output: Option<&std::path::Path>,
    mark: Option<TaskStatus>,
    config: &GeomergeConfig,
    format: OutputFormat,
) -> Result<()> {
    let session = EditSession::new(load(target)?, config.merge.options());
    let applied = session.apply_task(tasks, id)?;
    let merged = session.snapshot();

    if let Some(output) = output {
        save_graph(output, &merged)
            .map_err(GeomergeError::from)
            .with_context(|| format!("writing merged graph to {}", output.display()))?;
    }

    let report = MergeReport::new(&merged, &applied.outcome).for_task(&applied.task);
    print_report(&report, format)?;

    if let Some(status) = mark {
        if report.is_clean() {
            tasks.update_status(id, status)?;
        } else {
            eprintln!(
                "Task {id} left as {}: resolve the conflicts, then run\n  geomerge task status {id} {status}",
                applied.task.status
            );
        }
    }
    Ok(())
}
