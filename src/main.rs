use std::io::Write;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use env_logger::Builder;
use log::{debug, error, info, LevelFilter};

use pricewatch::api::notifier::{LogNotifier, Notifier};
use pricewatch::api::sampler::{FixedSampler, Sampler};
use pricewatch::api::{build_notifier, build_sampler};
use pricewatch::monitor::decision::DecisionEngine;
use pricewatch::monitor::history::Ledger;
use pricewatch::monitor::runner::MonitorRunner;
use pricewatch::{MonitorConfig, MonitorError};

#[derive(Parser, Debug)]
#[command(version, about = "Samples a displayed price and alerts on significant moves")]
struct Args {
    /// Path to the monitor configuration (.toml or legacy .properties)
    config: Option<PathBuf>,

    /// Use this display price instead of the configured sampler
    #[arg(long)]
    price: Option<String>,

    /// Log notifications instead of sending them
    #[arg(long)]
    dry_run: bool,

    /// Debug logging for this crate
    #[arg(short, long)]
    verbose: bool,
}

fn init_logger(verbose: bool) {
    Builder::new()
        .filter_level(LevelFilter::Warn)
        .filter_module(
            "pricewatch",
            if verbose {
                LevelFilter::Debug
            } else {
                LevelFilter::Info
            },
        )
        .format(|buf, record| {
            let ts = chrono::Local::now().format("%H:%M:%S%.3f");
            writeln!(
                buf,
                "[{} {:<5} {}] {}",
                ts,
                record.level(),
                record.target(),
                record.args()
            )
        })
        .target(env_logger::Target::Stderr)
        .init();
}

async fn run(config_path: PathBuf, args: &Args) -> Result<(), MonitorError> {
    debug!("Loading configuration from {}", config_path.display());
    let config = MonitorConfig::load(&config_path)?;

    let sampler: Box<dyn Sampler> = match (&args.price, &config.sampler) {
        (Some(price), _) => Box::new(FixedSampler::new(price.as_str())),
        (None, Some(sampler)) => build_sampler(sampler, config.credentials()),
        (None, None) => {
            return Err(MonitorError::Config(
                "No [sampler] configured and no --price given".to_string(),
            ))
        }
    };
    let notifier: Box<dyn Notifier> = if args.dry_run {
        Box::new(LogNotifier)
    } else {
        build_notifier(&config.notifier)
    };

    let ledger = Ledger::new(&config.history);
    let engine = DecisionEngine::new(config.policy);
    debug!("Threshold policy: {:?}", engine.policy());
    let runner = MonitorRunner::new(engine);
    runner
        .run_cycle(sampler.as_ref(), &ledger, notifier.as_ref(), &config.dest)
        .await?;

    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logger(args.verbose);

    let Some(config_path) = args.config.clone() else {
        error!("Missing configuration file. Bye");
        return;
    };

    if let Err(e) = run(config_path, &args).await {
        // Notification failures have already been logged with provider detail.
        if !e.is_notify() {
            error!("Monitoring cycle aborted: {}", e);
        }
        process::exit(1);
    }

    info!("Cycle complete");
}
