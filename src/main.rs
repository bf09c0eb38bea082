use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crossloader::clock::SystemClock;
use crossloader::detector::StuckJobDetector;
use crossloader::job_store::PgJobStore;
use crossloader::orchestrator::CompletionOrchestrator;
use crossloader::queue::NotificationQueue;
use crossloader::report_store::{ObjectStoreFactory, StoreRegistry};
use crossloader::settings::AppConfig;
use crossloader::status_sink::HttpStatusSink;
use crossloader::sweeper::StuckJobSweeper;
use crossloader::trace;

#[derive(Parser, Debug)]
#[clap(version, about)]
/// Cross-load completion worker
struct Args {
    /// whether to be verbose
    #[arg(short = 'v')]
    verbose: bool,

    /// path to a TOML config file
    #[arg(short = 'c', long = "config")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let cfg = AppConfig::load(&args.config)?;
    trace::init(cfg.log_format);
    if args.verbose {
        info!(?args, "starting with arguments");
    }

    let status_sink = Arc::new(HttpStatusSink::new(&cfg.status_sink.base_url));
    let registry = StoreRegistry::new(Arc::new(ObjectStoreFactory::new(
        cfg.report_store.backend.clone(),
        cfg.report_store.path.clone(),
    )));
    let orchestrator = Arc::new(CompletionOrchestrator::new(status_sink, registry));

    let job_store = Arc::new(
        PgJobStore::connect(
            &cfg.job_store.connection_string,
            cfg.job_store.max_connections,
        )
        .await?,
    );
    let stuck_threshold = cfg.sweep.stuck_threshold_minutes();
    let detector = StuckJobDetector::new(job_store, stuck_threshold);
    let sweeper = StuckJobSweeper::new(
        detector,
        orchestrator.clone(),
        Arc::new(SystemClock),
        stuck_threshold,
        Duration::from_secs(cfg.sweep.sweep_interval_minutes() * 60),
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    info!("cross loader subscribing to completion queue");
    let queue = NotificationQueue::connect(&cfg.queue).await?;
    let queue_task = tokio::spawn(queue.run(orchestrator, shutdown_rx.clone()));

    info!("cross loader starting crashed jobs sweeper");
    let sweeper_task = tokio::spawn(sweeper.run(shutdown_rx));

    info!("started cross loader service");
    tokio::signal::ctrl_c().await?;

    info!("shutting down cross loader service");
    let _ = shutdown_tx.send(true);
    let _ = tokio::join!(queue_task, sweeper_task);
    Ok(())
}
