use reqwest::{header::CONTENT_TYPE, Client, Response};
use serde::Deserialize;
use serde_json::Value;
use tokio::time::sleep;
use tracing::warn;

use crate::{FetchConfig, Lot, ProgressReporter, Result, PAGE_SIZE};

/// How a single page request ended.
#[derive(Debug)]
pub enum PageOutcome {
    /// The page answered with JSON. The list may be empty.
    Lots(Vec<Lot>),
    /// The page answered, but not with JSON.
    InvalidContentType,
    /// The page claimed JSON but the body wasn't a search envelope.
    Malformed,
    /// Every attempt failed on the transport level, with a non-2xx status, or while reading the body.
    Exhausted { attempts: u32 },
}

impl PageOutcome {
    pub fn into_lots(self) -> Vec<Lot> {
        match self {
            PageOutcome::Lots(lots) => lots,
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    content: Option<Vec<Value>>,
}

impl Envelope {
    /// The lots of the page. Items that aren't objects are dropped one by one.
    fn into_lots(self, page: u32) -> Vec<Lot> {
        self.content
            .unwrap_or_default()
            .into_iter()
            .filter_map(|item| match Lot::try_from(item) {
                Ok(lot) => Some(lot),
                Err(e) => {
                    warn!(page, error = %e, "skipping a content item");
                    None
                }
            })
            .collect()
    }
}

/// Requests a page and returns its lots; every failure degrades to an empty list.
pub async fn fetch_page(
    client: &Client,
    config: &FetchConfig,
    page: u32,
    progress: Option<&ProgressReporter>,
) -> Vec<Lot> {
    fetch_page_outcome(client, config, page, progress)
        .await
        .into_lots()
}

/// Requests a page, retrying transport failures with a fixed backoff.
///
/// A transport failure is anything before the whole body arrived: connecting, a
/// non-2xx status, the timeout, or a connection dropped mid-body. Only the final
/// failure is logged.
///
/// Progress is reported once, with [`PAGE_SIZE`], for every page that answered with JSON.
pub async fn fetch_page_outcome(
    client: &Client,
    config: &FetchConfig,
    page: u32,
    progress: Option<&ProgressReporter>,
) -> PageOutcome {
    let attempts = config.retry_attempts.max(1);
    let mut last_err = None;

    for attempt in 1..=attempts {
        if attempt > 1 {
            sleep(config.retry_backoff).await;
        }

        let res = match send_page_request(client, config, page).await {
            Ok(res) => res,
            Err(e) => {
                last_err = Some(e);
                continue;
            }
        };

        if !is_json(&res) {
            let content_type = content_type(&res);
            let body = res.text().await.unwrap_or_default();
            warn!(
                page,
                content_type = %content_type,
                body = %preview(&body),
                "unexpected response, treating the page as empty"
            );
            return PageOutcome::InvalidContentType;
        }

        let body = match res.bytes().await {
            Ok(body) => body,
            Err(e) => {
                last_err = Some(e.into());
                continue;
            }
        };

        return match serde_json::from_slice::<Envelope>(&body) {
            Ok(envelope) => {
                if let Some(progress) = progress {
                    progress.report(PAGE_SIZE);
                }
                PageOutcome::Lots(envelope.into_lots(page))
            }
            Err(e) => {
                warn!(page, error = %e, "couldn't decode the page, treating it as empty");
                PageOutcome::Malformed
            }
        };
    }

    let error = last_err.map(|e| e.to_string()).unwrap_or_default();
    warn!(
        page,
        attempts,
        error = %error,
        "couldn't load the page after {attempts} attempts"
    );
    PageOutcome::Exhausted { attempts }
}

/// Sends one request, non-2xx statuses turned into errors.
async fn send_page_request(client: &Client, config: &FetchConfig, page: u32) -> Result<Response> {
    let res = client
        .get(&config.base_url)
        .query(&config.query.params(page))
        .timeout(config.timeout)
        .send()
        .await?
        .error_for_status()?;
    Ok(res)
}

fn content_type(res: &Response) -> String {
    res.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[inline]
fn is_json(res: &Response) -> bool {
    content_type(res).starts_with("application/json")
}

/// First 200 characters of a body, for diagnostics.
fn preview(body: &str) -> &str {
    match body.char_indices().nth(200) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
