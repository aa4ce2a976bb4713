//! Command-line front end for the hybrid element retriever.
//!
//! The CLI is intentionally thin: it loads a page snapshot (captured by
//! an external browser driver and saved as JSON), runs a query or an
//! action through the library, and prints one JSON object per
//! invocation. Errors go to stderr and exit with code 1.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use her::{
    ActionKind, ActionOutcome, Deadline, Executor, Locator, PageSnapshot, PipelineOptions,
    QueryOptions, Resolution, Retriever, SnapshotProvider,
};

#[derive(Parser)]
#[command(name = "her", version, about = "Resolve natural-language instructions to element locators")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve a phrase to a locator without executing anything.
    Query {
        /// The instruction, e.g. "click the Apple filter".
        phrase: String,
        /// Page URL (used for page signatures and promotions).
        #[arg(long)]
        url: Option<String>,
        /// Snapshot JSON file captured by the browser driver.
        #[arg(long)]
        snapshot: PathBuf,
        /// Emit the full result object as JSON (default output is a
        /// one-line summary).
        #[arg(long)]
        json: bool,
        /// Session identifier; repeated invocations share index state.
        #[arg(long)]
        session: Option<String>,
        /// Candidates to rank.
        #[arg(long, default_value_t = 10)]
        top_k: usize,
    },
    /// Resolve a phrase and execute the action (dry-run without a
    /// connected executor).
    Act {
        phrase: String,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        snapshot: PathBuf,
        #[arg(long)]
        json: bool,
        #[arg(long)]
        session: Option<String>,
        #[arg(long, default_value_t = 10)]
        top_k: usize,
    },
    /// Inspect or clear the persistent caches.
    Cache {
        #[arg(long)]
        clear: bool,
        #[arg(long)]
        stats: bool,
    },
    /// Print the version.
    Version,
}

/// Serves a pre-captured snapshot from disk. The real browser driver
/// implements the same trait in-process.
struct FileSnapshotProvider {
    snapshot: PageSnapshot,
}

impl FileSnapshotProvider {
    fn load(path: &PathBuf, url: Option<&str>) -> Result<Self> {
        let data = std::fs::read(path)
            .with_context(|| format!("reading snapshot file {}", path.display()))?;
        let mut snapshot: PageSnapshot = serde_json::from_slice(&data)
            .with_context(|| format!("parsing snapshot JSON {}", path.display()))?;
        if let Some(url) = url {
            snapshot.top_url = url.to_string();
        }
        snapshot.stamp_frame_identity();
        Ok(Self { snapshot })
    }
}

impl SnapshotProvider for FileSnapshotProvider {
    fn snapshot(&self, _url: Option<&str>, _deadline: Deadline) -> Result<PageSnapshot, String> {
        Ok(self.snapshot.clone())
    }
}

/// Stand-in executor for offline runs: every locator is assumed to
/// exist uniquely and every action to succeed. Output is marked as a
/// dry run so nobody mistakes it for verification.
struct DryRunExecutor;

impl Executor for DryRunExecutor {
    fn exists(&self, _locator: &Locator) -> bool {
        true
    }

    fn unique(&self, _locator: &Locator) -> bool {
        true
    }

    fn perform(&self, _action: ActionKind, _locator: &Locator, _value: Option<&str>) -> ActionOutcome {
        ActionOutcome::success()
    }
}

fn output_object(resolution: &Resolution, snapshot: &PageSnapshot, dry_run: bool) -> serde_json::Value {
    let frames: Vec<serde_json::Value> = snapshot
        .frames
        .iter()
        .map(|f| {
            serde_json::json!({
                "frame_id": f.frame_id,
                "frame_url": f.frame_url,
                "frame_path": f.frame_path,
                "elements": f.elements.len(),
            })
        })
        .collect();

    serde_json::json!({
        "ok": resolution.ok,
        "used_locator": resolution.xpath,
        "strategy": resolution.strategy,
        "confidence": resolution.confidence,
        "verification": {
            "dry_run": dry_run,
            "explanation": resolution.explanation,
            "in_shadow_dom": resolution.metadata.in_shadow_dom,
            "frame_path": resolution.frame_path,
        },
        "snapshot": { "frames": frames },
        "result": resolution,
    })
}

fn print_result(resolution: &Resolution, snapshot: &PageSnapshot, json: bool, dry_run: bool) {
    if json {
        let object = output_object(resolution, snapshot, dry_run);
        println!("{}", serde_json::to_string_pretty(&object).unwrap_or_default());
    } else {
        println!(
            "{} {} (strategy={}, confidence={:.3})",
            if resolution.ok { "ok" } else { "failed" },
            resolution.xpath,
            resolution.strategy,
            resolution.confidence
        );
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Query {
            phrase,
            url,
            snapshot,
            json,
            session,
            top_k,
        } => {
            let provider = FileSnapshotProvider::load(&snapshot, url.as_deref())?;
            let retriever = Retriever::open(PipelineOptions::from_env())?;
            let query_options = QueryOptions {
                top_k,
                ..Default::default()
            };
            let resolution = retriever.query(
                &phrase,
                &provider,
                url.as_deref(),
                session.as_deref(),
                query_options,
                Deadline::unbounded(),
            );
            match resolution {
                Ok(res) => {
                    print_result(&res, &provider.snapshot, json, true);
                    Ok(())
                }
                Err(err) => {
                    let res = Resolution::failure(err.explanation());
                    print_result(&res, &provider.snapshot, json, true);
                    bail!(err.explanation())
                }
            }
        }
        Command::Act {
            phrase,
            url,
            snapshot,
            json,
            session,
            top_k,
        } => {
            let provider = FileSnapshotProvider::load(&snapshot, url.as_deref())?;
            let retriever = Retriever::open(PipelineOptions::from_env())?;
            let query_options = QueryOptions {
                top_k,
                ..Default::default()
            };
            let resolution = retriever.act(
                &phrase,
                &provider,
                &DryRunExecutor,
                url.as_deref(),
                session.as_deref(),
                query_options,
                Deadline::unbounded(),
            );
            match resolution {
                Ok(res) => {
                    print_result(&res, &provider.snapshot, json, true);
                    Ok(())
                }
                Err(err) => {
                    let res = Resolution::failure(err.explanation());
                    print_result(&res, &provider.snapshot, json, true);
                    bail!(err.explanation())
                }
            }
        }
        Command::Cache { clear, stats } => {
            let retriever = Retriever::open(PipelineOptions::from_env())?;
            if clear {
                retriever.clear_caches()?;
                eprintln!("caches cleared");
            }
            if stats || !clear {
                let stats = retriever.cache_stats();
                println!("{}", serde_json::to_string_pretty(&stats)?);
            }
            Ok(())
        }
        Command::Version => {
            println!("her {}", her::VERSION);
            Ok(())
        }
    }
}

fn main() {
    // Logs go to stderr so stdout stays parseable JSON.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
