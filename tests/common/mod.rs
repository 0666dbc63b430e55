#![allow(dead_code)]

use std::collections::HashMap;
use std::convert::Infallible;
use std::future::ready;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::Body,
    extract::{Query, RawQuery, State},
    http::header::CONTENT_TYPE,
    response::Response,
    routing::get,
    Router,
};
use futures::{stream, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use torgi_scrap::{FetchConfig, DISCOUNT_ATTRIBUTE};

pub const SEARCH_PATH: &str = "/new/api/public/lotcards/search";

/// A canned answer of the stub server.
#[derive(Debug, Clone)]
pub struct StubResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
    /// Pause before the response starts.
    pub delay: Duration,
    /// Send the first `n` body bytes, then pause before the rest.
    pub stall: Option<(usize, Duration)>,
}

impl StubResponse {
    pub fn json(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            content_type: "application/json;charset=UTF-8",
            body: body.into(),
            delay: Duration::ZERO,
            stall: None,
        }
    }

    pub fn html(body: impl Into<String>) -> Self {
        Self {
            content_type: "text/html; charset=utf-8",
            ..Self::json(body)
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            ..Self::json(r#"{"error": "unavailable"}"#)
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn stalled_after(mut self, bytes: usize, pause: Duration) -> Self {
        self.stall = Some((bytes, pause));
        self
    }

    fn into_response(self) -> Response {
        let mut builder = axum::http::Response::builder().status(self.status);
        if !self.content_type.is_empty() {
            builder = builder.header(CONTENT_TYPE, self.content_type);
        }

        let body = match self.stall {
            None => Body::from(self.body),
            Some((n, pause)) => {
                let n = n.min(self.body.len());
                let head = self.body[..n].to_string();
                let tail = self.body[n..].to_string();
                let chunks = stream::once(ready(Ok::<_, Infallible>(head))).chain(stream::once(
                    async move {
                        tokio::time::sleep(pause).await;
                        Ok(tail)
                    },
                ));
                Body::from_stream(chunks)
            }
        };
        builder.body(body).unwrap()
    }
}

type Handler = dyn Fn(u32, usize) -> StubResponse + Send + Sync;

#[derive(Default)]
struct Stats {
    hits: Mutex<HashMap<u32, usize>>,
    queries: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

/// Keeps a request counted as in flight until dropped, even when the
/// connection goes away mid-handler.
struct InFlight(Arc<Stats>);

impl InFlight {
    fn enter(stats: Arc<Stats>) -> Self {
        let now = stats.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        stats.peak.fetch_max(now, Ordering::SeqCst);
        Self(stats)
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Clone)]
struct StubState {
    stats: Arc<Stats>,
    handler: Arc<Handler>,
}

/// The lot search endpoint on a random local port. The handler gets the requested
/// page and the 1-based attempt count for that page.
pub struct StubServer {
    pub base_url: String,
    stats: Arc<Stats>,
}

impl StubServer {
    pub async fn start<F>(handler: F) -> Self
    where
        F: Fn(u32, usize) -> StubResponse + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let stats = Arc::new(Stats::default());

        let app = Router::new()
            .route(SEARCH_PATH, get(search))
            .with_state(StubState {
                stats: stats.clone(),
                handler: Arc::new(handler),
            });
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            base_url: format!("http://{addr}{SEARCH_PATH}"),
            stats,
        }
    }

    pub fn hits(&self, page: u32) -> usize {
        self.stats
            .hits
            .lock()
            .unwrap()
            .get(&page)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_hits(&self) -> usize {
        self.stats.hits.lock().unwrap().values().sum()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.stats.peak.load(Ordering::SeqCst)
    }

    /// Raw query strings, still percent-encoded.
    pub fn queries(&self) -> Vec<String> {
        self.stats.queries.lock().unwrap().clone()
    }
}

async fn search(
    State(state): State<StubState>,
    RawQuery(raw): RawQuery,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let page = params
        .get("page")
        .and_then(|p| p.parse::<u32>().ok())
        .unwrap_or(0);

    let attempt = {
        let mut hits = state.stats.hits.lock().unwrap();
        let n = hits.entry(page).or_default();
        *n += 1;
        *n
    };
    state
        .stats
        .queries
        .lock()
        .unwrap()
        .push(raw.unwrap_or_default());

    let _in_flight = InFlight::enter(state.stats.clone());
    let res = (state.handler)(page, attempt);
    tokio::time::sleep(res.delay).await;

    res.into_response()
}

/// Fast retries and a short timeout, everything else at its default.
pub fn test_config(base_url: &str, pages: u32, output_dir: &Path) -> FetchConfig {
    FetchConfig {
        base_url: base_url.to_string(),
        pages,
        concurrency: 5,
        timeout: Duration::from_secs(5),
        retry_backoff: Duration::from_millis(10),
        output_dir: output_dir.to_path_buf(),
        ..FetchConfig::default()
    }
}

/// The discount value of lot `i` on any page.
pub fn discount_of(i: usize) -> &'static str {
    ["30%", "60%", "90%"][i % 3]
}

pub fn lot_json(page: u32, i: usize) -> Value {
    json!({
        "id": format!("{page:05}-{i}"),
        "lotName": format!("Лот №{i} «страница {page}»"),
        "biddEndTime": "2030-01-01T10:00:00.000+03:00",
        "priceMin": 1000.5 + i as f64,
        "attributes": [
            {"fullName": "Вид собственности", "value": {"name": "Муниципальная"}},
            {"fullName": DISCOUNT_ATTRIBUTE, "value": {"name": discount_of(i), "code": i}}
        ]
    })
}

/// A search envelope with `n` lots for `page`.
pub fn lots_page(page: u32, n: usize) -> String {
    let content = (0..n).map(|i| lot_json(page, i)).collect::<Vec<_>>();
    json!({"content": content, "totalPages": 1000, "number": page}).to_string()
}

/// Sum of every increment sent so far. All senders must be gone.
pub fn drain_progress(rx: &mut mpsc::UnboundedReceiver<usize>) -> (usize, usize) {
    let mut signals = 0;
    let mut total = 0;
    while let Ok(n) = rx.try_recv() {
        signals += 1;
        total += n;
    }
    (signals, total)
}
