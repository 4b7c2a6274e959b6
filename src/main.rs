// src/main.rs

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use resonance_core::{
    upcoming_draw_date, CardRenderer, JsonCard, Ledger, ObservationSnapshot, ResonanceConfig,
    ResonanceEngine, ResonanceReport, ResonanceRequest, TextCard, UserIdentity,
};
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "resonance", version, about = "Ephemeris-seeded number combinations")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate a combination and print the resonance card
    Generate(GenerateArgs),
    /// Rebuild a card from a captured observation snapshot
    Replay(ReplayArgs),
    /// List ledger rows recorded for a person
    History(HistoryArgs),
    /// Print the identity hash for a person
    Identity(PersonArgs),
}

#[derive(Debug, Args)]
struct PersonArgs {
    #[arg(long)]
    name: String,

    /// Birth date, YYYY-MM-DD
    #[arg(long, value_parser = parse_date)]
    birth: NaiveDate,
}

#[derive(Debug, Args)]
struct GenerateArgs {
    #[command(flatten)]
    person: PersonArgs,

    /// Analysis date, YYYY-MM-DD (defaults to the coming Saturday)
    #[arg(long, value_parser = parse_date)]
    date: Option<NaiveDate>,

    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Ledger file (overrides the configured path)
    #[arg(long)]
    ledger: Option<PathBuf>,

    /// Do not append to the ledger
    #[arg(long)]
    no_ledger: bool,

    /// Write the resolved positions to this file
    #[arg(long)]
    capture: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ReplayArgs {
    #[arg(long)]
    name: String,

    #[arg(long)]
    snapshot: PathBuf,

    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,
}

#[derive(Debug, Args)]
struct HistoryArgs {
    #[command(flatten)]
    person: PersonArgs,

    #[arg(long)]
    ledger: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("expected YYYY-MM-DD: {}", e))
}

fn main() {
    if let Err(error) = run() {
        eprintln!("resonance error: {:#}", error);
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose)?;
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Generate(args) => generate(&config, args),
        Command::Replay(args) => replay(&config, args),
        Command::History(args) => history(&config, args),
        Command::Identity(person) => {
            let identity = UserIdentity::new(person.name, person.birth);
            println!("{}", identity.identity_hash);
            Ok(())
        }
    }
}

fn init_tracing(quiet: bool, verbose: bool) -> anyhow::Result<()> {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_env("RESONANCE_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {}", error))?;

    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ResonanceConfig> {
    match path {
        Some(path) => ResonanceConfig::load(path)
            .with_context(|| format!("failed to load configuration from {}", path.display())),
        None => Ok(ResonanceConfig::default()),
    }
}

fn print_card(report: &ResonanceReport, format: Format) -> anyhow::Result<()> {
    let card = match format {
        Format::Text => TextCard::default().render(report)?,
        Format::Json => JsonCard { pretty: true }.render(report)?,
    };
    println!("{}", card);
    Ok(())
}

fn generate(config: &ResonanceConfig, args: GenerateArgs) -> anyhow::Result<()> {
    let engine = ResonanceEngine::from_config(config)?;
    let analysis_date = args
        .date
        .unwrap_or_else(|| upcoming_draw_date(Utc::now().date_naive()));
    let request = ResonanceRequest::new(args.person.name, args.person.birth, analysis_date);

    let table = engine.resolve(&request);
    if let Some(path) = &args.capture {
        ObservationSnapshot::capture(&table, request.birth_date, request.analysis_date)
            .save(path)
            .with_context(|| format!("failed to write snapshot {}", path.display()))?;
        info!(path = %path.display(), "captured observations");
    }
    let report = engine.assemble(&request, &table, &mut rand::thread_rng());

    if !args.no_ledger {
        let ledger = Ledger::new(args.ledger.unwrap_or_else(|| config.ledger.path.clone()));
        // ledger failures never block the card
        record_in_ledger(
            &ledger,
            &report,
            config.ledger.log_candidates,
            &mut std::io::stderr(),
        );
    }

    print_card(&report, args.format)
}

// Reports a failed append on `warnings` as well as through tracing, so that
// `--quiet` or a restrictive RESONANCE_LOG filter cannot hide it.
fn record_in_ledger(
    ledger: &Ledger,
    report: &ResonanceReport,
    log_candidates: bool,
    warnings: &mut impl Write,
) -> bool {
    match ledger.record(report, log_candidates) {
        Ok(rows) => {
            info!(rows, path = %ledger.path().display(), "recorded combination in ledger");
            true
        }
        Err(err) => {
            warn!(error = %err, "could not record combination in ledger");
            let _ = writeln!(
                warnings,
                "resonance warning: could not record combination in ledger: {}",
                err
            );
            false
        }
    }
}

fn replay(config: &ResonanceConfig, args: ReplayArgs) -> anyhow::Result<()> {
    let engine = ResonanceEngine::from_config(config)?;
    let snapshot = ObservationSnapshot::load(&args.snapshot)
        .with_context(|| format!("failed to read snapshot {}", args.snapshot.display()))?;
    let request = ResonanceRequest::new(args.name, snapshot.birth_date, snapshot.analysis_date);

    let report = engine.assemble(&request, &snapshot.table(), &mut rand::thread_rng());
    print_card(&report, args.format)
}

fn history(config: &ResonanceConfig, args: HistoryArgs) -> anyhow::Result<()> {
    let identity = UserIdentity::new(args.person.name, args.person.birth);
    let path = args.ledger.unwrap_or_else(|| config.ledger.path.clone());
    let entries = Ledger::new(path).entries_for(&identity.identity_hash)?;

    if entries.is_empty() {
        println!("no records for {}", identity.identity_hash.handle());
        return Ok(());
    }
    for entry in entries {
        println!(
            "{}  {}  {:<12} {}  [{}]",
            entry.timestamp.format("%Y-%m-%d %H:%M"),
            entry.analysis_date,
            entry.channel_label,
            entry.combination,
            entry.aspect_summary
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> ResonanceReport {
        let engine = ResonanceEngine::from_config(&ResonanceConfig::default()).unwrap();
        let birth = NaiveDate::from_ymd_opt(1990, 1, 1).unwrap();
        let analysis = NaiveDate::from_ymd_opt(2024, 1, 6).unwrap();
        engine.generate(&ResonanceRequest::new("설계자", birth, analysis))
    }

    #[test]
    fn test_ledger_failure_is_always_reported() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::new(dir.path().join("missing").join("resonance_log.csv"));
        let mut warnings = Vec::new();

        assert!(!record_in_ledger(&ledger, &report(), false, &mut warnings));
        let text = String::from_utf8(warnings).unwrap();
        assert!(text.starts_with("resonance warning: could not record combination in ledger"));
    }

    #[test]
    fn test_ledger_success_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::new(dir.path().join("resonance_log.csv"));
        let mut warnings = Vec::new();

        assert!(record_in_ledger(&ledger, &report(), false, &mut warnings));
        assert!(warnings.is_empty());
        assert_eq!(ledger.entries_for(&report().identity.identity_hash).unwrap().len(), 1);
    }
}
