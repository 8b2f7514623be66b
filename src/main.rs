use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use geomerge::config::{CONFIG_FILE, GeomergeConfig};

mod merge_cmd;
mod task_cmd;

/// Merge suggested edits into a locally edited geographic graph
///
/// geomerge reconciles two graphs of points, paths and groups: a TARGET
/// you have been editing and a SOURCE with upstream changes (for example
/// the suggested fix attached to a review task). Edits on only one side are
/// taken over automatically; edits on both sides are reported as conflicts
/// and left for you to resolve.
///
/// QUICK START:
///
///   # Merge upstream changes into your working copy
///   geomerge merge work.json upstream.json -o work.json
///
///   # Look at a graph document
///   geomerge inspect work.json
///
///   # Apply the suggestion of task 42 and mark it fixed
///   geomerge task apply 42 work.json -o work.json
///   geomerge task status 42 fixed
///
/// CONFIGURATION:
///
///   geomerge.toml in the working directory (or --config):
///
///     [merge]
///     merge_bounds = true
///     adopt_local_matches = true
///
///     [tasks]
///     directory = "tasks"
///
///     [output]
///     format = "text"
///
/// LOGGING:
///
///   GEOMERGE_LOG=debug geomerge merge ...      (EnvFilter syntax)
///   GEOMERGE_LOG_FORMAT=json                   (JSON lines on stderr)
#[derive(Parser)]
#[command(name = "geomerge")]
#[command(version, about)]
#[command(propagate_version = true)]
#[command(
    after_help = "See 'geomerge <command> --help' for more information on a specific command."
)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, env = "GEOMERGE_CONFIG", default_value = CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge a source graph into a target graph
    ///
    /// Conflicts are reported but do not make the command fail. The merged
    /// graph is only written when --output is given.
    Merge(merge_cmd::MergeArgs),

    /// Summarize a graph document
    ///
    /// Prints per-kind counts, whether the graph is referentially closed and
    /// its content digest.
    Inspect(merge_cmd::InspectArgs),

    /// Work with review tasks
    Task(task_cmd::TaskArgs),
}

fn main() -> Result<()> {
    geomerge::telemetry::init();
    let cli = Cli::parse();

    let config = GeomergeConfig::load(&cli.config)
        .map_err(geomerge::GeomergeError::from)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    match &cli.command {
        Commands::Merge(args) => merge_cmd::merge(args, &config),
        Commands::Inspect(args) => merge_cmd::inspect(args, &config),
        Commands::Task(args) => task_cmd::run(args, &config),
    }
}
