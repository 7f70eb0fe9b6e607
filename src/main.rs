use anyhow::{anyhow, Result};
use clap::Parser;
use proxy_sieve::{
    pipeline::{self, RunReport},
    proxy::{ChannelObserver, LogObserver, SinkMode, StopSignal, SuccessPredicate},
    tui::ProbeDashboard,
    AppConfig,
};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Check proxies for accessibility and rank the working ones by response time
#[derive(Parser)]
#[command(name = "proxy-sieve")]
#[command(about = "Check proxies for accessibility and rank the working ones by response time")]
struct Cli {
    /// YAML config file; command line flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Input file containing proxies
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output file for working proxies
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// File of proxies already known to work, skipped when probing
    #[arg(long)]
    known_good: Option<PathBuf>,

    /// Append newly working proxies instead of rewriting the output file
    #[arg(long)]
    append: bool,

    /// Number of concurrent probes
    #[arg(short = 'n', long)]
    workers: Option<usize>,

    /// Timeout for each request in seconds
    #[arg(long)]
    timeout: Option<f64>,

    /// URLs to test against, tried in order until one succeeds
    #[arg(long, num_args = 1..)]
    urls: Vec<String>,

    /// Status code a working proxy must return
    #[arg(long, conflicts_with = "require_header")]
    status: Option<u16>,

    /// Response header a working proxy must return
    #[arg(long)]
    require_header: Option<String>,

    /// Extra request header, NAME:VALUE (repeatable)
    #[arg(long = "header", value_parser = parse_header)]
    headers: Vec<(String, String)>,

    /// User agent sent with probe requests
    #[arg(long)]
    user_agent: Option<String>,

    /// Log level used when RUST_LOG is not set
    #[arg(long)]
    log_level: Option<String>,

    /// Show the live dashboard
    #[arg(long)]
    tui: bool,
}

impl Cli {
    fn into_config(self) -> Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::load_from_file(path)?,
            None => AppConfig::default(),
        };

        if let Some(input) = self.input {
            config.input_path = input;
        }
        if let Some(output) = self.output {
            config.output_path = output;
        }
        if let Some(known_good) = self.known_good {
            config.known_good_path = Some(known_good);
        }
        if self.append {
            config.mode = SinkMode::Append;
        }
        if let Some(workers) = self.workers {
            config.concurrency = workers;
        }
        if let Some(timeout) = self.timeout {
            config.timeout_seconds = timeout;
        }
        if !self.urls.is_empty() {
            config.target_urls = self.urls;
        }
        if let Some(status) = self.status {
            config.success = SuccessPredicate::Status(status);
        }
        if let Some(header) = self.require_header {
            config.success = SuccessPredicate::Header(header);
        }
        config.request_headers.extend(self.headers);
        if let Some(user_agent) = self.user_agent {
            config.user_agent = Some(user_agent);
        }
        if let Some(log_level) = self.log_level {
            config.log_level = log_level;
        }
        if self.tui {
            config.dashboard = true;
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_header(s: &str) -> Result<(String, String)> {
    let (name, value) = s
        .split_once(':')
        .ok_or_else(|| anyhow!("Invalid header: {}. Use NAME:VALUE", s))?;
    Ok((name.trim().to_string(), value.trim().to_string()))
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    // The dashboard owns the terminal while it runs
    if config.dashboard {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::sink)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn run_with_dashboard(config: &AppConfig, stop: StopSignal) -> Result<RunReport> {
    let (tx, rx) = mpsc::unbounded_channel();

    let task = tokio::spawn({
        let config = config.clone();
        let stop = stop.clone();
        async move {
            let observer = ChannelObserver::new(tx);
            let result = pipeline::run(&config, &observer, &stop).await;
            observer.finish(result.as_ref().err().map(|e| format!("{:#}", e)));
            result
        }
    });

    let mut dashboard = ProbeDashboard::new(rx, stop.clone());
    dashboard.run().await?;

    if stop.is_triggered() && !task.is_finished() {
        println!("Stopping: waiting for in-flight probes to finish...");
    }
    task.await?
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Cli::parse().into_config()?;
    init_tracing(&config);

    let stop = StopSignal::new();
    tokio::spawn({
        let stop = stop.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, no new proxies will be checked");
                stop.trigger();
            }
        }
    });

    let report = if config.dashboard {
        run_with_dashboard(&config, stop).await?
    } else {
        pipeline::run(&config, &LogObserver::new(), &stop).await?
    };

    if report.stopped {
        println!("Run stopped early; results cover the proxies checked so far.");
    }
    println!(
        "Found {} new working proxies out of {} tested ({} candidates, {} already known).",
        report.summary.succeeded,
        report.summary.probed,
        report.summary.considered,
        report.summary.already_known
    );
    info!("{}", report.summary);
    info!("Saved {} proxies to {:?}", report.written, config.output_path);

    Ok(())
}
