use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use hitline_domain::{parse_chart, NormalizationReport, TempoWarning};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Validate rhythm chart files")]
struct Args {
    /// Chart JSON files to check
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
    /// Fail when any chart needed normalization or has tempo warnings
    #[arg(long)]
    strict: bool,
}

#[derive(Debug)]
struct LintResult {
    notes: usize,
    normalization: NormalizationReport,
    tempo: Vec<TempoWarning>,
}

impl LintResult {
    fn is_clean(&self) -> bool {
        self.normalization.dropped == 0
            && self.normalization.converted_to_tap == 0
            && self.tempo.is_empty()
    }
}

fn lint(path: &Path) -> Result<LintResult> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let id = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("chart");
    let (chart, normalization) =
        parse_chart(&text, id).with_context(|| format!("parsing {}", path.display()))?;
    Ok(LintResult {
        notes: chart.notes.len(),
        normalization,
        tempo: chart.tempo.warnings(),
    })
}

fn describe(warning: &TempoWarning) -> String {
    match warning {
        TempoWarning::Overlap {
            earlier_start_ms,
            later_start_ms,
        } => format!(
            "tempo segment at {earlier_start_ms} ms overlaps segment at {later_start_ms} ms"
        ),
        TempoWarning::NonPositiveBpm { start_ms, bpm } => {
            format!("tempo segment at {start_ms} ms has bpm {bpm}")
        }
        TempoWarning::EmptySpan { start_ms } => {
            format!("tempo segment at {start_ms} ms ends before it starts")
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mut failures = 0usize;
    for path in &args.inputs {
        let result = match lint(path) {
            Ok(result) => result,
            Err(err) => {
                warn!(path = %path.display(), error = %format!("{err:#}"), "chart rejected");
                println!("{}: error: {err:#}", path.display());
                failures += 1;
                continue;
            }
        };
        info!(path = %path.display(), notes = result.notes, "chart checked");
        println!(
            "{}: {} notes kept, {} dropped, {} holds converted to taps",
            path.display(),
            result.normalization.kept,
            result.normalization.dropped,
            result.normalization.converted_to_tap
        );
        for warning in &result.tempo {
            println!("{}: warning: {}", path.display(), describe(warning));
        }
        if args.strict && !result.is_clean() {
            failures += 1;
        }
    }
    if failures > 0 {
        bail!("{failures} chart(s) failed");
    }
    Ok(())
}
