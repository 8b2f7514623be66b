//! `geomerge merge` and `geomerge inspect`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use geomerge::GeomergeError;
use geomerge::config::GeomergeConfig;
use geomerge::document::{load_graph, save_graph};
use geomerge::format::OutputFormat;
use geomerge::report::{GraphSummary, MergeReport};
use geomerge::session::EditSession;

/// Output format flags shared by every reporting command.
#[derive(Args, Debug, Clone, Copy)]
pub struct FormatArgs {
    /// Output format: text or json (default from geomerge.toml)
    #[arg(long)]
    pub format: Option<OutputFormat>,

    /// Shorthand for --format json
    #[arg(long, hide = true, conflicts_with = "format")]
    pub json: bool,
}

impl FormatArgs {
    pub const fn resolve(self, config: &GeomergeConfig) -> OutputFormat {
        OutputFormat::resolve(
            OutputFormat::with_json_flag(self.format, self.json),
            config.output.format,
        )
    }
}

#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Graph document with local edits
    pub target: PathBuf,

    /// Graph document with upstream changes
    pub source: PathBuf,

    /// Write the merged graph here (may be the target itself)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Do not copy the source's download extents into the target
    #[arg(long)]
    pub no_bounds: bool,

    /// Never let upstream primitives claim equal locally created ones
    #[arg(long)]
    pub no_adopt: bool,

    #[command(flatten)]
    pub format: FormatArgs,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Graph document to summarize
    pub graph: PathBuf,

    #[command(flatten)]
    pub format: FormatArgs,
}

// ---------------------------------------------------------------------------
// merge
// ---------------------------------------------------------------------------

pub fn merge(args: &MergeArgs, config: &GeomergeConfig) -> Result<()> {
    let mut options = config.merge.options();
    if args.no_bounds {
        options.merge_bounds = false;
    }
    if args.no_adopt {
        options.adopt_local_matches = false;
    }

    let target = load(&args.target)?;
    let source = load(&args.source)?;

    let session = EditSession::new(target, options);
    let outcome = session.merge(&source)?;
    let merged = session.snapshot();

    if let Some(output) = &args.output {
        save_graph(output, &merged)
            .map_err(GeomergeError::from)
            .with_context(|| format!("writing merged graph to {}", output.display()))?;
    }

    let report = MergeReport::new(&merged, &outcome);
    print_report(&report, args.format.resolve(config))
}

pub fn print_report(report: &MergeReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => print!("{}", report.render_text()),
        OutputFormat::Json => println!("{}", format.serialize(report)?),
    }
    Ok(())
}

pub fn load(path: &Path) -> Result<geomerge_core::Graph> {
    Ok(load_graph(path).map_err(GeomergeError::from)?)
}

// ---------------------------------------------------------------------------
// inspect
// ---------------------------------------------------------------------------

pub fn inspect(args: &InspectArgs, config: &GeomergeConfig) -> Result<()> {
    let graph = load(&args.graph)?;
    let summary = GraphSummary::new(&graph);
    match args.format.resolve(config) {
        OutputFormat::Text => print!("{}", summary.render_text()),
        format @ OutputFormat::Json => println!("{}", format.serialize(&summary)?),
    }
    Ok(())
}
