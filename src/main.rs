use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Result};
use clap::Parser;
use gridmap::export::{build_export, digest, write_export, GraphDigest};
use gridmap::{
    construct_graph, summarise_traffic, BucketCache, Config, FileSource, Loader, MetricsSource,
};
use gridmap_store::{Clock, MemoryStore};
use gridmap_types::Bucket;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "gridmap")]
#[command(about = "Rolling traffic windows and service maps from inter-service call counters")]
struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to a metrics submission JSON file
    #[arg(short, long, default_value = "metrics.json")]
    metrics: PathBuf,

    /// Poll interval for the metrics file (e.g., "1s", "500ms")
    #[arg(short, long, default_value = "1s")]
    refresh: String,

    /// Only summarise the bucket containing this unix time. In export mode
    /// the window is also evaluated as of the end of that bucket.
    #[arg(long)]
    at: Option<i64>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Ingest the metrics file once, export the window and graph as JSON, and exit
    #[arg(short, long)]
    export: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::load(args.config.as_deref())?;
    let poll = gridmap::duration::parse_duration(&args.refresh)?;
    info!(
        groups = config.groups.len(),
        retention = %gridmap::duration::format_duration(config.loader.retention),
        "loaded configuration"
    );

    let source = FileSource::new(&args.metrics);

    // One-shot export
    if let Some(export_path) = args.export {
        return export_to_file(&config, source, &export_path, args.at).await;
    }

    let store = Arc::new(MemoryStore::new());
    let loader = Arc::new(Loader::new(store.clone(), config.loader.clone()));
    run_watch(loader, store, &config, source, poll, args.at).await
}

/// Clock stopped at the end of the bucket containing `at`.
fn pinned_clock(at: i64) -> Result<Clock> {
    let end = Bucket::from_unix(at).end_unix().max(0) as u64;
    let t = UNIX_EPOCH
        .checked_add(Duration::from_secs(end))
        .ok_or_else(|| anyhow!("--at {at} is outside the clock range"))?;
    Ok(Arc::new(move || t))
}

async fn export_to_file(
    config: &Config,
    mut source: FileSource,
    export_path: &Path,
    at: Option<i64>,
) -> Result<()> {
    let clock: Clock = match at {
        Some(at) => pinned_clock(at)?,
        None => Arc::new(SystemTime::now),
    };
    let store = Arc::new(MemoryStore::with_clock(clock.clone()));
    let loader = Loader::new(store, config.loader.clone()).with_clock(clock);

    let submission = source.poll().ok_or_else(|| {
        anyhow!(
            "cannot ingest {}: {}",
            source.path().display(),
            source.error().unwrap_or("no data")
        )
    })?;
    loader.submit(&submission).await?;

    let mut cache = BucketCache::new();
    loader.refresh(&mut cache).await?;

    let metrics = loader.get_metric_log();
    let nodes = loader.get_nodes();
    let root = construct_graph(&config.groups, &metrics)?;
    let export = build_export(&metrics, &nodes, &root, at);
    write_export(export_path, &export)?;

    info!(
        path = %export_path.display(),
        records = metrics.len(),
        nodes = nodes.len(),
        "exported window"
    );
    Ok(())
}

async fn run_watch(
    loader: Arc<Loader>,
    store: Arc<MemoryStore>,
    config: &Config,
    mut source: FileSource,
    poll: Duration,
    at: Option<i64>,
) -> Result<()> {
    let handle = loader.clone().start();
    let mut ticker = tokio::time::interval(poll);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(source = source.description(), "watching for submissions");
    let mut last_digest: Option<GraphDigest> = None;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Some(submission) = source.poll() {
                    match loader.submit(&submission).await {
                        Ok(()) => info!(
                            metrics = submission.metrics.len(),
                            nodes = submission.node_info.len(),
                            "recorded submission"
                        ),
                        Err(e) => warn!(error = %e, "recording submission failed"),
                    }
                } else if let Some(err) = source.error() {
                    debug!(source = source.description(), error = err, "no submission");
                }
                store.purge_expired();

                let metrics = loader.get_metric_log();
                match construct_graph(&config.groups, &metrics) {
                    Ok(root) => {
                        let d = digest(&root);
                        if last_digest != Some(d) {
                            info!(
                                regions = d.regions,
                                groups = d.groups,
                                leaves = d.leaves,
                                arcs = d.arcs,
                                rows = summarise_traffic(&metrics, at).len(),
                                last_bucket = ?d.last_bucket.map(|b| b.unix()),
                                "graph updated"
                            );
                            last_digest = Some(d);
                        }
                    }
                    Err(e) => error!(error = %e, "building graph failed"),
                }
            }
            res = &mut shutdown => {
                res?;
                info!("shutting down");
                break;
            }
        }
    }

    handle.shutdown().await;
    Ok(())
}
