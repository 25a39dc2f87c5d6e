//! vdscan - standalone vulnerability-detection scanner.
//!
//! Reads newline-delimited JSON inventory events (from a file or stdin),
//! runs each through the scan orchestrator, and reports what was detected.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vdscan_cache::{OsDataCache, RemediationDataCache};
use vdscan_core::config::PolicyConfig;
use vdscan_core::cpe::OsCpeMap;
use vdscan_core::model::AgentInfo;
use vdscan_feed::cna::CnaMappings;
use vdscan_feed::manager::InMemoryFeed;
use vdscan_inventory::InventoryStore;
use vdscan_orchestrator::sinks::{
    InMemoryIndexer, InMemoryReportQueue, RecordingRescanQueue, StaticAgentList, StopFlag,
};
use vdscan_orchestrator::{ScanDependencies, ScannerType, VulnerabilityScanner};

#[derive(Parser)]
#[command(name = "vdscan", version, about = "Host vulnerability detection scanner")]
struct Cli {
    /// Policy document (JSON).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Advisory feed document (JSON).
    #[arg(long, global = true)]
    feed: Option<PathBuf>,

    /// CNA mapping document (JSON).
    #[arg(long, global = true)]
    cna_mappings: Option<PathBuf>,

    /// OS CPE template map (JSON).
    #[arg(long, global = true)]
    os_cpe: Option<PathBuf>,

    /// Store directory root.
    #[arg(long, global = true, default_value = "queue/vd")]
    queue_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process inventory events from a file ("-" for stdin).
    Run {
        /// Newline-delimited JSON events.
        #[arg(default_value = "-")]
        events: String,
    },
    /// Run a control operation against the inventory.
    Control {
        /// Scanner type, e.g. CleanupAllAgentData or ReScanSingleAgent.
        scanner_type: String,
        /// Agent id the operation targets, where applicable.
        #[arg(long)]
        agent_id: Option<String>,
    },
}

fn load_json(path: &Path) -> Result<serde_json::Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
}

fn build_scanner(cli: &Cli) -> Result<(VulnerabilityScanner, Arc<InMemoryReportQueue>, Arc<InMemoryIndexer>)> {
    let config = match &cli.config {
        Some(path) => PolicyConfig::from_file(path)?,
        None => PolicyConfig::default(),
    };
    let feed = match &cli.feed {
        Some(path) => InMemoryFeed::from_file(path)?,
        None => InMemoryFeed::new(),
    };
    let mappings = match &cli.cna_mappings {
        Some(path) => CnaMappings::from_json(&load_json(path)?)?,
        None => CnaMappings::default(),
    };
    let cpe_map = match &cli.os_cpe {
        Some(path) => OsCpeMap::from_json(&load_json(path)?)?,
        None => OsCpeMap::default(),
    };

    let store = Arc::new(InventoryStore::open(cli.queue_dir.join("inventory"))?);
    let reports = Arc::new(InMemoryReportQueue::new());
    let indexer = Arc::new(InMemoryIndexer::new());

    let lru_size = config.osdata_lru_size;
    let deps = ScanDependencies {
        feed: Arc::new(feed),
        mappings: Arc::new(mappings),
        config: Arc::new(config),
        store,
        os_cache: Arc::new(OsDataCache::new(lru_size)),
        remediation_cache: Arc::new(RemediationDataCache::new(lru_size)),
        indexer: indexer.clone(),
        reports: reports.clone(),
        agents: Arc::new(StaticAgentList::new(vec![])),
        rescan: Arc::new(RecordingRescanQueue::new()),
        stop: StopFlag::new(),
    };

    Ok((
        VulnerabilityScanner::new(deps, Arc::new(cpe_map)),
        reports,
        indexer,
    ))
}

fn run_events(scanner: &VulnerabilityScanner, events: &str) -> Result<()> {
    let reader: Box<dyn BufRead> = if events == "-" {
        Box::new(std::io::stdin().lock())
    } else {
        let file = std::fs::File::open(events)
            .with_context(|| format!("failed to open events file {events}"))?;
        Box::new(std::io::BufReader::new(file))
    };

    for (line_number, line) in reader.lines().enumerate() {
        let line = line.context("failed to read events input")?;
        if line.trim().is_empty() {
            continue;
        }
        let raw: serde_json::Value = match serde_json::from_str(&line) {
            Ok(value) => value,
            Err(err) => {
                warn!(line = line_number + 1, error = %err, "skipping unparseable event");
                continue;
            }
        };
        // A failed event is dropped, not fatal to the stream.
        if let Err(err) = scanner.handle_event(&raw) {
            warn!(line = line_number + 1, error = %err, "event dropped");
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let (scanner, reports, indexer) = build_scanner(&cli)?;

    match &cli.command {
        Command::Run { events } => {
            run_events(&scanner, events)?;
        }
        Command::Control {
            scanner_type,
            agent_id,
        } => {
            let scanner_type: ScannerType = scanner_type.parse()?;
            let agent = AgentInfo {
                agent_id: agent_id.clone().unwrap_or_default(),
                ..Default::default()
            };
            scanner.run_control(scanner_type, agent)?;
        }
    }

    let metrics = scanner.metrics();
    info!(
        processed = metrics.events_processed,
        dropped = metrics.events_dropped,
        detections = metrics.elements_indexed,
        alerts = metrics.alerts_emitted,
        "scan finished"
    );

    for alert in reports.drain() {
        println!("{alert}");
    }
    for document in indexer.documents() {
        println!("{document}");
    }
    for batch in indexer.bulk_batches() {
        for document in batch {
            println!("{document}");
        }
    }
    Ok(())
}
