#![allow(missing_docs)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use omni_relink::{
    ChangeSet, ConflictResolutions, Corpus, FilePreview, HeadingConflict, LinkStyleTarget,
    MergeOutcome, MergeStrategy, MoveOptions, OperationSummary, OrderStrategy, PathResolution,
    Planner, RelinkConfig, SplitKind, SplitOptions, ValidationReport, Validator, execute,
};

#[derive(Parser, Debug)]
#[command(
    name = "relink",
    about = "Move, split, join, merge and restyle markdown files without breaking links",
    arg_required_else_help = true
)]
struct Cli {
    /// Corpus root directory. File arguments are relative to it.
    #[arg(
        long,
        short = 'r',
        value_name = "DIR",
        default_value = ".",
        global = true
    )]
    root: PathBuf,

    /// Explicit relink config file (default: `<root>/.config/omni-dev-fusion/relink.yaml`).
    #[arg(long = "conf", short = 'c', value_name = "FILE", global = true)]
    config_file: Option<PathBuf>,

    /// Exclude these directory names in addition to the configured ones (repeatable).
    #[arg(long = "exclude-dir", value_name = "DIR", global = true)]
    exclude_dirs: Vec<String>,

    /// Plan and validate without touching disk; prints diffs.
    #[arg(long, short = 'n', global = true)]
    dry_run: bool,

    /// Debug logging.
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Output format.
    #[arg(long, short = 'o', value_enum, default_value_t = OutputFormat::Pretty, global = true)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Move files; with several sources the destination is a directory.
    Move {
        /// Source files followed by the destination.
        #[arg(required = true, num_args = 2..)]
        paths: Vec<PathBuf>,
        /// Replace existing files that are not themselves moving.
        #[arg(long)]
        overwrite: bool,
    },
    /// Split one document into several.
    Split {
        source: PathBuf,
        #[arg(long, value_enum)]
        strategy: Option<SplitKind>,
        /// Heading depth for `headers`.
        #[arg(long)]
        level: Option<usize>,
        /// Byte budget per part for `size`.
        #[arg(long)]
        max_bytes: Option<usize>,
        /// Line budget per part for `size`.
        #[arg(long)]
        max_lines: Option<usize>,
        /// Marker line for `manual`.
        #[arg(long)]
        marker: Option<String>,
        /// 1-based line numbers starting parts for `lines`.
        #[arg(long = "at", value_name = "LINE", value_delimiter = ',')]
        lines: Vec<usize>,
        /// Delete the source instead of keeping it as an index.
        #[arg(long)]
        no_toc: bool,
        /// Directory for the parts.
        #[arg(long, value_name = "DIR")]
        output_dir: Option<PathBuf>,
    },
    /// Concatenate documents, renumbering colliding heading anchors.
    Join {
        #[arg(required = true, num_args = 2..)]
        sources: Vec<PathBuf>,
        #[arg(long = "into", value_name = "FILE")]
        destination: PathBuf,
        #[arg(long, value_enum)]
        order: Option<OrderStrategy>,
    },
    /// Concatenate documents, resolving heading collisions explicitly.
    Merge {
        #[arg(required = true, num_args = 2..)]
        sources: Vec<PathBuf>,
        #[arg(long = "into", value_name = "FILE")]
        destination: PathBuf,
        #[arg(long, value_enum)]
        strategy: Option<MergeStrategy>,
        #[arg(long, value_enum)]
        order: Option<OrderStrategy>,
        /// Interactive answer, `path#slug=New heading` (repeatable).
        #[arg(long = "resolve", value_name = "PATH#SLUG=TEXT", value_parser = ConflictResolutions::parse_entry)]
        resolutions: Vec<(PathBuf, String, String)>,
    },
    /// Rewrite link syntax in place; every document when no files are given.
    Convert {
        files: Vec<PathBuf>,
        #[arg(long, value_enum)]
        link_style: Option<LinkStyleTarget>,
        #[arg(long, value_enum)]
        path_resolution: Option<PathResolution>,
    },
    /// Report every broken link in the corpus.
    Check,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
}

#[derive(Serialize)]
struct Report {
    result: Option<OperationSummary>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    previews: Vec<FilePreview>,
    validation: ValidationReport,
}

#[derive(Serialize)]
struct PendingConflicts<'a> {
    conflicts: &'a [HeadingConflict],
    hint: &'static str,
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose {
            "omni_relink=debug"
        } else {
            "omni_relink=info"
        })
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn emit<T: Serialize>(value: &T, output: OutputFormat) -> Result<()> {
    let rendered = match output {
        OutputFormat::Json => serde_json::to_string(value),
        OutputFormat::Pretty => serde_json::to_string_pretty(value),
    }
    .context("failed to serialize CLI output as JSON")?;
    println!("{rendered}");
    Ok(())
}

fn load(cli: &Cli) -> Result<(RelinkConfig, Arc<Corpus>)> {
    let mut config = RelinkConfig::load(&cli.root, cli.config_file.as_deref())
        .context("failed to load relink config")?;
    config.exclude_dirs.extend(cli.exclude_dirs.iter().cloned());
    let corpus = Corpus::load(&cli.root, &config)
        .with_context(|| format!("failed to load corpus at {}", cli.root.display()))?;
    Ok((config, Arc::new(corpus)))
}

/// Plan for the chosen subcommand; `None` when a merge still needs answers.
fn plan(cli: &Cli, config: &RelinkConfig, planner: &Planner) -> Result<Option<ChangeSet>> {
    let set = match &cli.command {
        Command::Move { paths, overwrite } => {
            let Some((destination, sources)) = paths.split_last() else {
                bail!("move needs at least one source and a destination");
            };
            let mut destination = destination.clone();
            if sources.len() > 1 && !destination.to_string_lossy().ends_with('/') {
                destination.as_mut_os_string().push("/");
            }
            let pairs: Vec<(PathBuf, PathBuf)> = sources
                .iter()
                .map(|source| (source.clone(), destination.clone()))
                .collect();
            planner.plan_move(&pairs, &MoveOptions {
                overwrite: *overwrite,
            })?
        }
        Command::Split {
            source,
            strategy,
            level,
            max_bytes,
            max_lines,
            marker,
            lines,
            no_toc,
            output_dir,
        } => {
            let mut settings = config.split.clone();
            settings.level = level.or(settings.level);
            settings.max_bytes = max_bytes.or(settings.max_bytes);
            settings.max_lines = max_lines.or(settings.max_lines);
            if let Some(marker) = marker {
                settings.marker.clone_from(marker);
            }
            let kind = strategy.unwrap_or(settings.strategy);
            let options = SplitOptions {
                toc: settings.toc && !no_toc,
                output_dir: output_dir.clone(),
            };
            planner.plan_split(source, &settings.strategy_for(kind, lines.clone()), &options)?
        }
        Command::Join {
            sources,
            destination,
            order,
        } => planner.plan_join(sources, destination, order.unwrap_or(config.merge.order))?,
        Command::Merge {
            sources,
            destination,
            strategy,
            order,
            resolutions,
        } => {
            let mut answers = ConflictResolutions::new();
            for (path, slug, text) in resolutions {
                answers.insert(path.clone(), slug.clone(), text.clone());
            }
            let outcome = planner.plan_merge(
                sources,
                destination,
                strategy.unwrap_or(config.merge.strategy),
                order.unwrap_or(config.merge.order),
                &answers,
            )?;
            match outcome {
                MergeOutcome::Ready(set) => set,
                MergeOutcome::NeedsResolution(conflicts) => {
                    emit(
                        &PendingConflicts {
                            conflicts: &conflicts,
                            hint: "re-run with --resolve PATH#SLUG=TEXT for each occurrence",
                        },
                        cli.output,
                    )?;
                    return Ok(None);
                }
            }
        }
        Command::Convert {
            files,
            link_style,
            path_resolution,
        } => planner.plan_convert(
            files,
            link_style.or(config.convert.link_style),
            path_resolution.or(config.convert.path_resolution),
        )?,
        Command::Check => bail!("check does not plan changes"),
    };
    Ok(Some(set))
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let (config, corpus) = load(cli)?;

    if matches!(cli.command, Command::Check) {
        let validation = Validator::check_corpus(&corpus);
        let valid = validation.valid;
        emit(
            &Report {
                result: None,
                previews: Vec::new(),
                validation,
            },
            cli.output,
        )?;
        return Ok(if valid {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    let planner = Planner::new(corpus);
    let Some(set) = plan(cli, &config, &planner)? else {
        return Ok(ExitCode::from(2));
    };

    let result = execute(&set, cli.dry_run);
    let validation = Validator::new(config.max_file_size).validate(&result);
    let ok = result.success && validation.valid;
    emit(
        &Report {
            result: Some(result.summary()),
            previews: if cli.dry_run {
                result.previews()
            } else {
                Vec::new()
            },
            validation,
        },
        cli.output,
    )?;
    Ok(if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    run(&cli)
}
