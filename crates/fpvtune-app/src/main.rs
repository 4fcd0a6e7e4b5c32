//! fpvtune - recover Betaflight tuning parameters from AI tuning reports
//!
//! Reads a captured response, runs it through the recovery engine, and prints the
//! resulting CLI text or the full extraction result.

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use fpvtune_adapters::config::{load_policy, resolve_policy_path, save_policy, to_toml};
use fpvtune_adapters::corpus::{Corpus, CorpusCase};
use fpvtune_adapters::util::{clamp_input, truncate};
use fpvtune_core::{
    ExtractionResult, Locale, Provenance, RawResponse, ResponseExtractor, TuningHints,
    TuningPolicy,
};
use fpvtune_engine::TuneEngine;
use rayon::prelude::*;
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "FPVTUNE_LOG";

#[derive(Parser, Debug)]
#[command(
    name = "fpvtune",
    about = "Recover Betaflight tuning parameters from AI-generated tuning reports",
    version
)]
struct Cli {
    /// Policy file (defaults to $FPVTUNE_POLICY_FILE, then ~/.config/fpvtune/policy.toml)
    #[arg(long, global = true)]
    policy: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract parameters from one response
    Extract(ExtractArgs),
    /// Replay a corpus of captured responses
    Replay(ReplayArgs),
    /// Print the effective policy as TOML
    Policy(PolicyArgs),
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// Response file; reads stdin when omitted
    #[arg(long, short)]
    input: Option<PathBuf>,
    #[arg(long, default_value = "en")]
    locale: String,
    /// Frame size hint, e.g. `5`, `7 inch`, `inch2_3`
    #[arg(long)]
    frame_size: Option<String>,
    /// Flying style hint, e.g. `freestyle`, `racing`, `cinematic`, `long range`
    #[arg(long)]
    style: Option<String>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Cli)]
    format: OutputFormat,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Cli,
    Json,
}

#[derive(Args, Debug)]
struct ReplayArgs {
    /// Manifest file, directory with a corpus.toml, or directory of captures
    path: PathBuf,
    /// Write the per-case report as JSON
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct PolicyArgs {
    /// Save the effective (sanitized) policy to this path
    #[arg(long)]
    write: Option<PathBuf>,
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    // stdout carries the CLI text; logs go to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let policy = load_policy(cli.policy.as_deref())?;

    match cli.command {
        Commands::Extract(args) => run_extract(args, policy),
        Commands::Replay(args) => run_replay(args, policy),
        Commands::Policy(args) => run_policy(args, cli.policy.as_deref(), &policy),
    }
}

fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read response '{}'", path.display())),
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read response from stdin")?;
            Ok(text)
        }
    }
}

fn bounded(text: &str, max_bytes: usize) -> &str {
    let clamped = clamp_input(text, max_bytes);
    if clamped.len() < text.len() {
        warn!(
            original = text.len(),
            kept = clamped.len(),
            "response exceeds max_input_bytes; extra input ignored"
        );
    }
    clamped
}

fn run_extract(args: ExtractArgs, policy: TuningPolicy) -> Result<()> {
    let text = read_input(args.input.as_deref())?;
    let hints = TuningHints::from_text(args.frame_size.as_deref(), args.style.as_deref());
    let engine = TuneEngine::with_policy(policy);
    let response = RawResponse::new(
        bounded(&text, engine.policy().max_input_bytes),
        Locale::parse(&args.locale),
    );

    let result = engine.extract(&response, &hints);
    for issue in &result.issues {
        info!(%issue, "extraction issue");
    }

    match args.format {
        OutputFormat::Cli => {
            if result.is_fallback() {
                eprintln!("  ! No usable values recovered; printing safe baseline values.");
            }
            print!("{}", result.cli);
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&result)
                .context("Failed to serialize extraction result")?;
            println!("{}", json);
        }
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct CaseOutcome {
    id: String,
    provenance: Option<Provenance>,
    expected: Option<Provenance>,
    passed: bool,
    issues: Vec<String>,
    error: Option<String>,
}

fn replay_case(
    engine: &TuneEngine,
    corpus: &Corpus,
    case: &CorpusCase,
) -> CaseOutcome {
    let text = match corpus.read(case) {
        Ok(text) => text,
        Err(err) => {
            return CaseOutcome {
                id: case.id.clone(),
                provenance: None,
                expected: case.expect_provenance,
                passed: false,
                issues: Vec::new(),
                error: Some(format!("{:#}", err)),
            }
        }
    };

    let response = RawResponse::new(
        bounded(&text, engine.policy().max_input_bytes),
        case.locale(),
    );
    let result: ExtractionResult = engine.extract(&response, &case.hints());
    let passed = case
        .expect_provenance
        .is_none_or(|expected| expected == result.provenance);

    CaseOutcome {
        id: case.id.clone(),
        provenance: Some(result.provenance),
        expected: case.expect_provenance,
        passed,
        issues: result.issues.iter().map(ToString::to_string).collect(),
        error: None,
    }
}

fn run_replay(args: ReplayArgs, policy: TuningPolicy) -> Result<()> {
    let corpus = Corpus::open(&args.path)?;
    if corpus.cases.is_empty() {
        return Err(anyhow!(
            "Corpus '{}' contains no cases",
            args.path.display()
        ));
    }
    let engine = TuneEngine::with_policy(policy);

    let outcomes: Vec<CaseOutcome> = corpus
        .cases
        .par_iter()
        .map(|case| replay_case(&engine, &corpus, case))
        .collect();

    let width = outcomes.iter().map(|o| o.id.len()).max().unwrap_or(0);
    for outcome in &outcomes {
        let status = if outcome.passed { "ok  " } else { "FAIL" };
        let got = outcome
            .provenance
            .map(|p| p.label())
            .unwrap_or("-");
        let detail = match (&outcome.error, outcome.expected) {
            (Some(err), _) => truncate(err, 80),
            (None, Some(expected)) if !outcome.passed => format!("expected {}", expected),
            _ => format!("{} issue(s)", outcome.issues.len()),
        };
        println!("  {} {:<width$}  {:<18} {}", status, outcome.id, got, detail);
    }

    let failed = outcomes.iter().filter(|o| !o.passed).count();
    println!();
    println!("  {} case(s), {} failed", outcomes.len(), failed);

    if let Some(path) = args.output.as_deref() {
        let report = serde_json::to_string_pretty(&outcomes)
            .context("Failed to serialize replay report")?;
        std::fs::write(path, report)
            .with_context(|| format!("Failed to write replay report '{}'", path.display()))?;
    }

    if failed > 0 {
        return Err(anyhow!("{} of {} replay case(s) failed", failed, outcomes.len()));
    }
    Ok(())
}

fn run_policy(args: PolicyArgs, explicit: Option<&Path>, policy: &TuningPolicy) -> Result<()> {
    if let Some(path) = args.write.as_deref() {
        save_policy(policy, path)?;
        eprintln!("  + Policy written to {}", path.display());
        return Ok(());
    }

    match resolve_policy_path(explicit) {
        Some((path, source)) => {
            println!("# policy file: {} (from {})", path.display(), source.label())
        }
        None => println!("# policy file: none (built-in defaults)"),
    }
    print!("{}", to_toml(policy)?);
    Ok(())
}
