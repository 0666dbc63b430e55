use std::path::PathBuf;
use std::sync::Arc;

use chrono::Local;
use reqwest::Client;
use tokio::{
    sync::{mpsc, Semaphore},
    task::JoinSet,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::request::{fetch_page_outcome, PageOutcome};
use crate::store::{prepare_output_dir, write_dataset_async};
use crate::{info_time, FetchConfig, Lot, ProgressReporter, Result, PAGE_SIZE};

/// Summary of one fetch run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchReport {
    pub pages_requested: u32,
    /// Pages that answered with JSON, empty ones included.
    pub pages_ok: u32,
    pub pages_failed: u32,
    /// Pages never dispatched because the run was cancelled.
    pub pages_skipped: u32,
    pub lots: usize,
    /// Where the dataset was written, if it was.
    pub dataset: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PageStatus {
    Ok,
    Failed,
    Skipped,
}

impl FetchReport {
    fn count(&mut self, status: PageStatus) {
        match status {
            PageStatus::Ok => self.pages_ok += 1,
            PageStatus::Failed => self.pages_failed += 1,
            PageStatus::Skipped => self.pages_skipped += 1,
        }
    }
}

/// Fetches every configured page and replaces the dataset file with the result.
///
/// Only an unusable output directory is an error. Failed pages just contribute
/// nothing, a failed write is logged and leaves `dataset` unset, and a cancelled
/// run keeps the previous file.
pub async fn run_fetch(
    config: FetchConfig,
    progress: Option<ProgressReporter>,
    cancel: CancellationToken,
) -> Result<FetchReport> {
    let start_time = Local::now();
    prepare_output_dir(&config.output_dir)?;
    let client = reqwest::Client::new();

    info_time!("Started fetching {} pages", config.pages);

    let config = Arc::new(config);
    let (lots, mut report) = fetch_lots(client, config.clone(), progress, cancel.clone()).await?;
    info_time!(
        start_time,
        "Finished fetching ALL pages: {} ok, {} failed, {} skipped.",
        report.pages_ok,
        report.pages_failed,
        report.pages_skipped
    );

    if cancel.is_cancelled() {
        warn!(lots = lots.len(), "run was cancelled, keeping the previous dataset");
        return Ok(report);
    }

    let local_now = Local::now();
    match write_dataset_async(config.output_dir.clone(), config.file_name.clone(), lots).await {
        Ok(path) => {
            info_time!(local_now, "Wrote {} lots to file: {}", report.lots, path.display());
            report.dataset = Some(path);
        }
        Err(e) => error!(error = %e, "couldn't save the dataset"),
    }

    Ok(report)
}

/// Requests pages `1..=config.pages` through a worker pool of `config.concurrency` tasks
/// and collects their lots, ordered by page.
///
/// All page tasks are spawned up front. Once `cancel` fires, tasks still waiting for a
/// worker give up; requests already in flight run to completion.
pub async fn fetch_lots(
    client: Client,
    config: Arc<FetchConfig>,
    progress: Option<ProgressReporter>,
    cancel: CancellationToken,
) -> Result<(Vec<Lot>, FetchReport)> {
    let (lots_tx, lots_rx) = mpsc::channel(256);
    let collect_handle = tokio::spawn(async move { collect_lots(lots_rx).await });

    let permits = Arc::new(Semaphore::new(config.concurrency.max(1)));
    let mut task_set = JoinSet::new();
    for page in 1..=config.pages {
        task_set.spawn({
            // Client uses Arc so we can clone cheaply
            let client = client.clone();
            let config = config.clone();
            let permits = permits.clone();
            let progress = progress.clone();
            let cancel = cancel.clone();
            let lots_tx = lots_tx.clone();

            async move { run_page(client, config, page, permits, progress, cancel, lots_tx).await }
        });
    }
    // The collector stops once every task has dropped its sender.
    drop(lots_tx);

    let mut report = FetchReport {
        pages_requested: config.pages,
        ..FetchReport::default()
    };
    while let Some(task) = task_set.join_next().await {
        let status = match task {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                error!(error = %e, "page task failed");
                PageStatus::Failed
            }
            Err(e) => {
                error!(error = %e, "page task panicked");
                PageStatus::Failed
            }
        };
        report.count(status);
    }

    let lots = collect_handle.await?;
    report.lots = lots.len();
    Ok((lots, report))
}

/// Waits for a worker, fetches one page and hands its lots to the collector.
async fn run_page(
    client: Client,
    config: Arc<FetchConfig>,
    page: u32,
    permits: Arc<Semaphore>,
    progress: Option<ProgressReporter>,
    cancel: CancellationToken,
    lots_tx: mpsc::Sender<(u32, Vec<Lot>)>,
) -> Result<PageStatus> {
    let _permit = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Ok(PageStatus::Skipped),
        permit = permits.acquire_owned() => match permit {
            Ok(permit) => permit,
            Err(_) => return Ok(PageStatus::Skipped),
        },
    };

    match fetch_page_outcome(&client, &config, page, progress.as_ref()).await {
        PageOutcome::Lots(lots) => {
            if !lots.is_empty() {
                lots_tx.send((page, lots)).await?;
            }
            Ok(PageStatus::Ok)
        }
        _ => Ok(PageStatus::Failed),
    }
}

/// Uses a `mpsc` Receiver to collect the lots of every page into a single `Vec`,
/// sorted by page number.
async fn collect_lots(mut lots_rx: mpsc::Receiver<(u32, Vec<Lot>)>) -> Vec<Lot> {
    let start_time = Local::now();
    let mut pages = Vec::new();

    while let Some((page, lots)) = lots_rx.recv().await {
        tracing::debug!(page, len = lots.len(), "received a page");
        pages.push((page, lots));
    }

    pages.sort_unstable_by_key(|(page, _)| *page);
    let mut col = Vec::with_capacity(pages.len() * PAGE_SIZE);
    for (_, lots) in pages {
        col.extend(lots);
    }
    info_time!(start_time, "DONE: collected {} lots", col.len());

    col
}
