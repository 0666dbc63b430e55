//! Fetches the public lot catalogue of torgi.gov.ru page by page, keeps it in a
//! single JSON dataset, and filters that dataset by the discount a lot was reduced by.
//!
//! The fetch is a `JoinSet` of page tasks bounded by a worker pool. Every task sends
//! its lots through a `mpsc` channel into one collector, so the aggregated dataset
//! and the progress count each have a single writer.

mod macros;

pub mod config;
mod error;
pub mod filter;
pub mod logging;
pub mod lot;
pub mod process;
pub mod progress;
pub mod request;
pub mod store;

pub use config::{FetchConfig, LotStatus, SearchQuery};
pub use error::{Error, Result};
pub use lot::{Attribute, Freshness, Lot, LotRow};
pub use process::{run_fetch, FetchReport};
pub use progress::{ProgressReporter, ProgressSnapshot, ProgressTracker};

pub const BASE_URL: &str = "https://torgi.gov.ru/new/api/public/lotcards/search";
/// Host of the browsable lot pages.
pub const LOT_HOST: &str = "torgi.gov.ru";
pub const DEFAULT_PAGES: u32 = 1000;
/// The API serves fixed pages of this many lots, so a page is also the unit of progress.
pub const PAGE_SIZE: usize = 10;
pub const DEFAULT_CONCURRENCY: usize = 5;
pub const REQUEST_TIMEOUT_SECS: u64 = 60;
pub const RETRY_BACKOFF_SECS: u64 = 2;
/// Total attempts per page, the first one included.
pub const RETRY_ATTEMPTS: u32 = 3;
pub const FILE_NAME: &str = "all_lots.json";
/// Full name of the "discount percentage from starting price" attribute, as the API spells it.
pub const DISCOUNT_ATTRIBUTE: &str = "Размер снижения начальной цены";
