use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::{
    BASE_URL, DEFAULT_CONCURRENCY, DEFAULT_PAGES, FILE_NAME, PAGE_SIZE, REQUEST_TIMEOUT_SECS,
    RETRY_ATTEMPTS, RETRY_BACKOFF_SECS,
};

/// Lot states accepted by the `lotStatus` search filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LotStatus {
    Published,
    ApplicationsSubmission,
    DeterminingWinner,
    Succeed,
    Failed,
    Canceled,
}

impl LotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LotStatus::Published => "PUBLISHED",
            LotStatus::ApplicationsSubmission => "APPLICATIONS_SUBMISSION",
            LotStatus::DeterminingWinner => "DETERMINING_WINNER",
            LotStatus::Succeed => "SUCCEED",
            LotStatus::Failed => "FAILED",
            LotStatus::Canceled => "CANCELED",
        }
    }
}

impl fmt::Display for LotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Base query of the lot search. It is a template: every page request builds its
/// own parameter list from it through [`SearchQuery::params`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub lot_status: Vec<LotStatus>,
    pub match_phrase: bool,
    pub by_first_version: bool,
    pub with_facets: bool,
    pub size: usize,
    pub sort: String,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            lot_status: vec![LotStatus::Published, LotStatus::ApplicationsSubmission],
            match_phrase: false,
            by_first_version: true,
            with_facets: false,
            size: PAGE_SIZE,
            sort: "firstVersionPublicationDate,desc".into(),
        }
    }
}

impl SearchQuery {
    /// Query parameters for a single (1-based) page.
    pub fn params(&self, page: u32) -> Vec<(&'static str, String)> {
        let lot_status = self
            .lot_status
            .iter()
            .map(LotStatus::as_str)
            .collect::<Vec<_>>()
            .join(",");

        vec![
            ("lotStatus", lot_status),
            ("matchPhrase", self.match_phrase.to_string()),
            ("byFirstVersion", self.by_first_version.to_string()),
            ("withFacets", self.with_facets.to_string()),
            ("size", self.size.to_string()),
            ("sort", self.sort.clone()),
            ("page", page.to_string()),
        ]
    }
}

/// Everything one fetch run needs.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub base_url: String,
    pub query: SearchQuery,
    /// Pages `1..=pages` are requested.
    pub pages: u32,
    /// Size of the worker pool.
    pub concurrency: usize,
    pub timeout: Duration,
    /// Attempts per page, the first one included.
    pub retry_attempts: u32,
    pub retry_backoff: Duration,
    pub output_dir: PathBuf,
    pub file_name: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: BASE_URL.into(),
            query: SearchQuery::default(),
            pages: DEFAULT_PAGES,
            concurrency: DEFAULT_CONCURRENCY,
            timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            retry_attempts: RETRY_ATTEMPTS,
            retry_backoff: Duration::from_secs(RETRY_BACKOFF_SECS),
            output_dir: PathBuf::from("."),
            file_name: FILE_NAME.into(),
        }
    }
}

impl FetchConfig {
    pub fn dataset_path(&self) -> PathBuf {
        self.output_dir.join(&self.file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_params_match_the_search_endpoint() {
        let params = SearchQuery::default().params(7);
        let get = |key: &str| {
            params
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(get("lotStatus"), Some("PUBLISHED,APPLICATIONS_SUBMISSION"));
        assert_eq!(get("matchPhrase"), Some("false"));
        assert_eq!(get("byFirstVersion"), Some("true"));
        assert_eq!(get("withFacets"), Some("false"));
        assert_eq!(get("size"), Some("10"));
        assert_eq!(get("sort"), Some("firstVersionPublicationDate,desc"));
        assert_eq!(get("page"), Some("7"));
    }

    #[test]
    fn params_leave_the_template_untouched() {
        let query = SearchQuery::default();
        let first = query.params(1);
        let second = query.params(2);

        assert_ne!(first, second);
        assert_eq!(query, SearchQuery::default());
    }

    #[test]
    fn dataset_path_joins_dir_and_name() {
        let config = FetchConfig {
            output_dir: PathBuf::from("out"),
            ..FetchConfig::default()
        };
        assert_eq!(config.dataset_path(), PathBuf::from("out").join(FILE_NAME));
    }
}
