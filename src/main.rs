use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use chrono::Local;
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use torgi_scrap::{
    filter::load_and_filter, info_time, logging::init_logging, run_fetch, FetchConfig, LotRow,
    ProgressReporter, ProgressTracker, BASE_URL, DEFAULT_CONCURRENCY, DEFAULT_PAGES, FILE_NAME,
    LOT_HOST, REQUEST_TIMEOUT_SECS, RETRY_ATTEMPTS, RETRY_BACKOFF_SECS,
};

#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    #[arg(long, env = "TORGI_LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch every page of the lot search and replace the dataset file.
    Fetch(FetchArgs),
    /// Print the lots of a dataset file with the given discount.
    Filter {
        /// Discount value, matched verbatim (e.g. `30%`).
        #[arg(short, long)]
        percentage: String,
        #[arg(short, long, env = "TORGI_DATASET", default_value = FILE_NAME)]
        file: PathBuf,
        #[arg(long, env = "TORGI_LOT_HOST", default_value = LOT_HOST)]
        host: String,
    },
}

#[derive(Debug, clap::Args)]
struct FetchArgs {
    #[arg(long, env = "TORGI_BASE_URL", default_value = BASE_URL)]
    base_url: String,
    #[arg(long, env = "TORGI_PAGES", default_value_t = DEFAULT_PAGES)]
    pages: u32,
    #[arg(long, env = "TORGI_CONCURRENCY", default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,
    /// Per request timeout in seconds.
    #[arg(long, env = "TORGI_TIMEOUT", default_value_t = REQUEST_TIMEOUT_SECS)]
    timeout: u64,
    #[arg(long, env = "TORGI_RETRIES", default_value_t = RETRY_ATTEMPTS)]
    retries: u32,
    /// Pause between attempts in seconds.
    #[arg(long, env = "TORGI_BACKOFF", default_value_t = RETRY_BACKOFF_SECS)]
    backoff: u64,
    #[arg(short, long, env = "TORGI_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,
    #[arg(long, env = "TORGI_FILE_NAME", default_value = FILE_NAME)]
    file_name: String,
}

impl From<FetchArgs> for FetchConfig {
    fn from(args: FetchArgs) -> Self {
        FetchConfig {
            base_url: args.base_url,
            pages: args.pages,
            concurrency: args.concurrency,
            timeout: Duration::from_secs(args.timeout),
            retry_attempts: args.retries,
            retry_backoff: Duration::from_secs(args.backoff),
            output_dir: args.output_dir,
            file_name: args.file_name,
            ..FetchConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let start_time = Local::now();
    let code = match cli.command {
        Command::Fetch(args) => fetch(args.into()).await,
        Command::Filter {
            percentage,
            file,
            host,
        } => filter(&file, &percentage, &host),
    };
    info_time!(start_time, "Full program time:");

    code
}

async fn fetch(config: FetchConfig) -> ExitCode {
    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("stop requested, letting in-flight pages finish");
                cancel.cancel();
            }
        }
    });

    let (reporter, progress_rx) = ProgressReporter::channel();
    let watch_handle = tokio::spawn(watch_progress(progress_rx, ProgressTracker::new(config.pages)));

    let res = run_fetch(config, Some(reporter), cancel).await;
    // `run_fetch` owned the last reporter, so the watcher drains and stops.
    let _ = watch_handle.await;

    match res {
        Ok(report) if report.dataset.is_some() => ExitCode::SUCCESS,
        Ok(report) => {
            tracing::error!(?report, "the run produced no updated dataset");
            ExitCode::FAILURE
        }
        Err(e) => {
            tracing::error!(error = %e, "fetch run aborted");
            ExitCode::FAILURE
        }
    }
}

/// Drains the progress channel once a second and logs the running total and ETA.
async fn watch_progress(mut progress_rx: mpsc::UnboundedReceiver<usize>, mut tracker: ProgressTracker) {
    let mut tick = tokio::time::interval(Duration::from_secs(1));
    loop {
        tick.tick().await;

        let mut received = 0;
        let mut closed = false;
        loop {
            match progress_rx.try_recv() {
                Ok(lots) => received += lots,
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    closed = true;
                    break;
                }
            }
        }

        if received > 0 {
            let snap = tracker.record(received);
            let (min, sec) = snap.eta_min_sec();
            tracing::info!(
                "loaded {} of {} records, ETA {min} min {sec} sec",
                snap.loaded,
                tracker.total_lots()
            );
        }
        if closed {
            break;
        }
    }
}

fn filter(file: &std::path::Path, percentage: &str, host: &str) -> ExitCode {
    let lots = load_and_filter(file, percentage);
    if lots.is_empty() {
        println!("no matching lots");
        return ExitCode::SUCCESS;
    }

    for lot in &lots {
        println!("{}", LotRow::from_lot(lot, host));
    }
    info_time!("{} lots with a {} discount", lots.len(), percentage);
    ExitCode::SUCCESS
}
