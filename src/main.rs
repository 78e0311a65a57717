// src/main.rs

mod cli;

use chrono::{TimeZone, Utc};
use clap::Parser;
use cli::{Args, Command};
use hotspot_miner::export::write_training_set;
use hotspot_miner::{
    ingest, GitHistory, HistorySource, HotspotScorer, IngestOptions, LogisticScorer, MlpScorer, Store,
    StoreLocation,
};
use std::error::Error;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::process::ExitCode;
use std::time::Instant;
use tracing::info;

type BoxError = Box<dyn Error + Send + Sync>;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let mut message = format!("error: {e}");
            let mut source = e.source();
            while let Some(cause) = source {
                message.push_str(&format!("\n  caused by: {cause}"));
                source = cause.source();
            }
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), BoxError> {
    match args.command {
        Command::Ingest {
            repo,
            db,
            model,
            no_progress,
        } => run_ingest(&repo, &db, model.as_deref(), !no_progress),
        Command::Export { db, output } => {
            let store = Store::open(&StoreLocation::parse(&db))?;
            let written = match output {
                Some(path) => write_training_set(&store, &mut BufWriter::new(File::create(path)?))?,
                None => write_training_set(&store, &mut io::stdout().lock())?,
            };
            info!(rows = written, "training set exported");
            Ok(())
        }
        Command::Summary { db } => {
            let store = Store::open(&StoreLocation::parse(&db))?;
            let counts = store.counts()?;
            println!(
                "{} commits, {} files, {} snapshots",
                counts.commits, counts.files, counts.snapshots
            );
            let commits = store.commits()?;
            if let (Some(first), Some(last)) = (commits.first(), commits.last()) {
                println!(
                    "History spans from {} to {}.",
                    format_timestamp(first.timestamp),
                    format_timestamp(last.timestamp)
                );
            }
            Ok(())
        }
        Command::Blob { repo, commit, path } => {
            let history = GitHistory::open(&repo)?;
            match history.read_blob(&commit, &path)? {
                Some(bytes) => {
                    let mut out = io::stdout().lock();
                    out.write_all(&bytes)?;
                    out.flush()?;
                    Ok(())
                }
                None => Err(format!("{path} is not a file at {commit}").into()),
            }
        }
    }
}

fn run_ingest(repo: &Path, db: &str, model: Option<&Path>, show_progress: bool) -> Result<(), BoxError> {
    let start_time = Instant::now();
    let history = GitHistory::open(repo)?;
    let location = StoreLocation::parse(db);
    let mut store = Store::open(&location)?;
    let scorer: Box<dyn HotspotScorer> = match model {
        Some(path) => Box::new(MlpScorer::from_path(path)?),
        None => Box::new(LogisticScorer::default()),
    };
    info!(repo = %repo.display(), store = %location, "ingesting");

    let report = ingest(&history, &mut store, scorer.as_ref(), &IngestOptions { show_progress })?;

    println!(
        "{} commits ({} new), {} snapshots added, {} already present",
        report.commits_seen, report.commits_added, report.snapshots_added, report.snapshots_skipped
    );
    if !report.is_clean() {
        println!(
            "{} snapshots not scored, {} commits with unreadable diffs",
            report.score_failures, report.degraded_commits
        );
    }
    println!("Finished in {:.2?}.", start_time.elapsed());
    Ok(())
}

fn format_timestamp(seconds: i64) -> String {
    Utc.timestamp_opt(seconds, 0)
        .single()
        .map_or_else(|| seconds.to_string(), |t| t.to_rfc2822())
}
