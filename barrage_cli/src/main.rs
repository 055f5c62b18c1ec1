mod cli;
mod urls;

use std::io;

use anyhow::{Context, Result};
use barrage::{
    Controller, HttpTransport, Reporter, RunSummary, SnapshotReport, Target,
    report::{ConsoleReporter, TableReporter},
};
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

/// What `--json` prints once the run is over.
#[derive(Serialize)]
struct FinalSummary {
    #[serde(flatten)]
    report: SnapshotReport,
    workers: usize,
    gave_up: usize,
    panicked: usize,
    stopped_early: bool,
}

impl From<RunSummary> for FinalSummary {
    fn from(summary: RunSummary) -> Self {
        Self {
            report: summary.snapshot.into(),
            workers: summary.workers,
            gave_up: summary.gave_up,
            panicked: summary.panicked,
            stopped_early: summary.stopped_early,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let targets = urls::read_targets(&cli.urls)?;
    if targets.is_empty() {
        tracing::warn!("No URLs in {}, nothing will be sent", cli.urls.display());
    }

    let template = cli.template().context("invalid request template")?;
    let transport = HttpTransport::new(&cli.http_config(), template)
        .context("cannot build the HTTP client")?;

    let summary = if cli.json {
        // Keep stdout for the JSON document.
        run(&cli, targets, transport, TableReporter::new(io::stderr())).await?
    } else {
        run(&cli, targets, transport, ConsoleReporter).await?
    };

    let summary = FinalSummary::from(summary);
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", summary.report.to_table());
        println!(
            "{} workers, {} gave up, {} panicked{}",
            summary.workers,
            summary.gave_up,
            summary.panicked,
            if summary.stopped_early {
                ", stopped early"
            } else {
                ""
            }
        );
    }
    Ok(())
}

async fn run<R: Reporter>(
    cli: &Cli,
    targets: Vec<Target>,
    transport: HttpTransport,
    reporter: R,
) -> Result<RunSummary> {
    let controller = Controller::new(cli.run_config(), transport, reporter);

    let stop = controller.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, stopping...");
            stop.stop();
        }
    });

    controller
        .run(targets)
        .await
        .context("run could not be started")
}
