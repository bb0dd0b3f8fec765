mod compare;
mod config;
mod extract;
mod record;
mod report;
mod sources;
mod stats;

use clap::{Parser, Subcommand};
use config::{OutputFormat, ReportConfig};
use std::io::Write;
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Extract BatchAPI stress-test records from harness logs and report
/// per-size latency statistics or batched vs. standard comparisons.
#[derive(Parser, Debug)]
#[command(name = "stress-report", version, about)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file path (missing file means defaults)
    #[arg(short, long, global = true, default_value = "stress-report.toml")]
    config: PathBuf,

    /// Directory holding the numbered logs (overrides config)
    #[arg(short, long, global = true)]
    dir: Option<PathBuf>,

    /// Read this file instead of the numbered logs; repeatable
    #[arg(short = 'f', long = "file", global = true)]
    files: Vec<PathBuf>,

    /// Find {prefix}<N>.{extension} files in the directory instead of a fixed range
    #[arg(long, global = true)]
    discover: bool,

    /// Marker that precedes each embedded record (overrides config)
    #[arg(long, global = true)]
    marker: Option<String>,

    /// Keep reading a file past empty fragments instead of stopping at the first
    #[arg(long, global = true)]
    keep_scanning: bool,

    /// Operation compared by `compare` (overrides config)
    #[arg(long, global = true)]
    method: Option<String>,

    /// Output format (overrides config)
    #[arg(long, global = true, value_enum)]
    format: Option<OutputFormat>,

    /// Field delimiter for csv output (overrides config)
    #[arg(long, global = true)]
    delimiter: Option<char>,

    /// Write the report here instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Print resolved settings and input files, don't read anything
    #[arg(long, global = true)]
    dry_run: bool,

    /// Extra logging (per-record and per-line decisions)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Mean and sample standard deviation of millis per number of entries
    Stats,
    /// Batched vs. standard latency points for one method
    Compare,
    /// Dump the parsed records as JSON lines
    Extract,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);
    tracing::debug!(?cli, "parsed CLI arguments");

    if let Err(e) = run(&cli) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let default = if verbose {
        LevelFilter::DEBUG
    } else if quiet {
        LevelFilter::WARN
    } else {
        LevelFilter::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(default.into())
                .from_env_lossy(),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut cfg = config::load_config(&cli.config)?;
    apply_overrides(&mut cfg, cli);
    cfg.validate()?;

    let inputs = sources::resolve_inputs(&cfg.input)?;
    tracing::info!(files = inputs.len(), "resolved input files");

    if cli.dry_run {
        print!("{}", format_settings(&cfg, &inputs));
        return Ok(());
    }

    let extraction = extract::extract_files(&inputs, &cfg.extract)?;
    tracing::info!(
        records = extraction.records.len(),
        files = extraction.files.len(),
        "extraction complete"
    );

    let out: Box<dyn Write> = match &cli.output {
        Some(path) => {
            let file = std::fs::File::create(path)
                .map_err(|e| format!("cannot create {}: {e}", path.display()))?;
            Box::new(std::io::BufWriter::new(file))
        }
        None => Box::new(std::io::stdout().lock()),
    };

    match cli.command {
        Command::Stats => {
            let stats = stats::grouped_stats(&extraction.records);
            if stats.is_empty() {
                tracing::warn!("no records found, statistics are empty");
            }
            tracing::debug!(
                entries = ?stats.entries(),
                means = ?stats.means(),
                "grouped statistics"
            );
            let singletons = stats
                .std_devs()
                .iter()
                .filter(|s| s.value().is_none())
                .count();
            if singletons > 0 {
                tracing::warn!(
                    groups = singletons,
                    "groups with a single record have no standard deviation"
                );
            }
            report::write_stats(out, &stats, cfg.output.format, cfg.delimiter_byte())?;
        }
        Command::Compare => {
            let cmp = compare::compare_method(&extraction.records, &cfg.compare.method);
            if cmp.batched.is_empty() && cmp.standard.is_empty() {
                tracing::warn!(method = %cmp.method, "no records matched the compared method");
            }
            report::write_comparison(out, &cmp, cfg.output.format, cfg.delimiter_byte())?;
        }
        Command::Extract => report::write_records(out, &extraction.records)?,
    }

    Ok(())
}

/// CLI flags win over the config file.
fn apply_overrides(cfg: &mut ReportConfig, cli: &Cli) {
    if let Some(dir) = &cli.dir {
        cfg.input.dir = dir.clone();
    }
    if !cli.files.is_empty() {
        cfg.input.files = cli.files.clone();
    }
    if cli.discover {
        cfg.input.discover = true;
    }
    if let Some(marker) = &cli.marker {
        cfg.extract.marker = marker.clone();
    }
    if cli.keep_scanning {
        cfg.extract.stop_at_empty = false;
    }
    if let Some(method) = &cli.method {
        cfg.compare.method = method.clone();
    }
    if let Some(format) = cli.format {
        cfg.output.format = format;
    }
    if let Some(delimiter) = cli.delimiter {
        cfg.output.delimiter = delimiter;
    }
}

fn format_settings(cfg: &ReportConfig, inputs: &[PathBuf]) -> String {
    let mut lines = vec![
        format!("stress-report v{}", env!("CARGO_PKG_VERSION")),
        format!("Marker: {:?}", cfg.extract.marker),
        format!("Stop at first empty fragment: {}", cfg.extract.stop_at_empty),
        format!("Compare method: {}", cfg.compare.method),
        format!(
            "Output: {:?} (delimiter {:?})",
            cfg.output.format, cfg.output.delimiter
        ),
        format!("Input files ({}):", inputs.len()),
    ];
    lines.extend(inputs.iter().map(|p| format!("  {}", p.display())));
    let mut text = lines.join("\n");
    text.push('\n');
    text
}
