use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tokio::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

use smrtlink_doctor::config::Overrides;
use smrtlink_doctor::report::{self, ReportOptions};
use smrtlink_doctor::{
    AppConfig, Coordinator, HttpTransport, MonitoredSystemState, RemoteEndpoint,
    SystemStatusClient, TotalPolicy, TransportClient,
};

#[derive(Parser, Debug)]
#[command(name = "smrtlink-doctor")]
#[command(about = "Health and job monitor for one or more SMRT Link servers")]
struct Args {
    /// Config file (TOML, YAML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// System to monitor (host:port). Repeatable; replaces configured systems
    #[arg(short, long = "system", value_name = "HOST:PORT")]
    systems: Vec<RemoteEndpoint>,

    /// Poll interval (e.g., "10s", "1m")
    #[arg(short, long)]
    interval: Option<String>,

    /// Per-request timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Job type to watch. Repeatable; replaces configured job types
    #[arg(short = 't', long = "job-type")]
    job_types: Vec<String>,

    /// Maximum number of recent failed jobs listed per job type
    #[arg(long)]
    max_failed: Option<usize>,

    /// Count running jobs once in job totals
    #[arg(long)]
    distinct_total: bool,

    /// Fetch everything once, export to a JSON file and exit
    #[arg(short, long, conflicts_with = "job")]
    export: Option<PathBuf>,

    /// Print a job and its events from the first system and exit
    #[arg(short, long)]
    job: Option<i64>,

    /// Seconds between printed reports
    #[arg(short, long, default_value = "10", value_parser = clap::value_parser!(u64).range(1..))]
    refresh: u64,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(&args)?;
    let options = ReportOptions {
        total_policy: config.summary_total,
        max_failed_jobs: config.max_failed_jobs,
    };

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_mode(&args, &config, &options))
}

async fn run_mode(args: &Args, config: &AppConfig, options: &ReportOptions) -> Result<()> {
    let transport: Arc<dyn TransportClient> =
        Arc::new(HttpTransport::builder().timeout(config.timeout()).build()?);
    let systems = config.to_watched_systems()?;
    let first = systems.first().map(|s| s.endpoint.clone());

    let deadline = config.timeout() + Duration::from_secs(1);
    let mut coordinator = Coordinator::with_systems(transport, deadline, systems);

    // Handle job detail mode (non-interactive)
    if let Some(job_id) = args.job {
        let client = first
            .as_ref()
            .and_then(|endpoint| coordinator.client(endpoint))
            .context("No system configured")?;
        return print_job(client, job_id).await;
    }

    // Handle export mode (non-interactive)
    if let Some(ref export_path) = args.export {
        return export_to_file(&mut coordinator, options, export_path, deadline * 2).await;
    }

    run(&mut coordinator, options, Duration::from_secs(args.refresh)).await
}

/// Layer command-line overrides on top of the file/environment config.
fn load_config(args: &Args) -> Result<AppConfig> {
    let overrides = Overrides {
        systems: args.systems.clone(),
        interval: args.interval.clone(),
        timeout_ms: args.timeout_ms,
        job_types: args.job_types.clone(),
        max_failed_jobs: args.max_failed,
        summary_total: args.distinct_total.then_some(TotalPolicy::Distinct),
    };
    AppConfig::load(args.config.as_deref())?.with_overrides(&overrides)
}

/// Poll until Ctrl-C, printing a report every `refresh`.
async fn run(coordinator: &mut Coordinator, options: &ReportOptions, refresh: Duration) -> Result<()> {
    coordinator.start();
    info!(
        systems = coordinator.endpoints().count(),
        "monitoring started, press Ctrl-C to stop"
    );

    let mut ticker = tokio::time::interval_at(Instant::now() + Duration::from_secs(1), refresh);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                result.context("Failed to listen for Ctrl-C")?;
                break;
            }
            _ = ticker.tick() => print_report(&coordinator.current_states(), options),
        }
    }

    coordinator.stop();
    info!("monitoring stopped");
    Ok(())
}

fn print_report(states: &[MonitoredSystemState], options: &ReportOptions) {
    println!("--- {} ---", Utc::now().format("%Y-%m-%d %H:%M:%S UTC"));
    for state in states {
        println!("{}", report::status_line(state));
        for line in report::alarm_lines(state) {
            println!("{}", line);
        }
        for line in report::job_lines(state, options) {
            println!("{}", line);
        }
    }
}

async fn print_job(client: &SystemStatusClient, job_id: i64) -> Result<()> {
    let detail = client
        .get_service_job_with_events(job_id)
        .await
        .with_context(|| format!("Failed to fetch job {} from {}", job_id, client.endpoint()))?;
    println!("{}", serde_json::to_string_pretty(&report::job_detail_json(&detail))?);
    Ok(())
}

/// Poll every system once and export the result to a JSON file
async fn export_to_file(
    coordinator: &mut Coordinator,
    options: &ReportOptions,
    export_path: &Path,
    wait: Duration,
) -> Result<()> {
    coordinator.start();
    let give_up = Instant::now() + wait;
    while !coordinator
        .current_states()
        .iter()
        .all(MonitoredSystemState::is_settled)
        && Instant::now() < give_up
    {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    coordinator.stop();

    let states = coordinator.current_states();
    let export = report::export_json(&states, options, Utc::now());

    let json = serde_json::to_string_pretty(&export)?;
    let mut file = std::fs::File::create(export_path)
        .with_context(|| format!("Failed to create {}", export_path.display()))?;
    file.write_all(json.as_bytes())?;

    println!(
        "Exported state of {} systems to: {}",
        states.len(),
        export_path.display()
    );
    Ok(())
}
