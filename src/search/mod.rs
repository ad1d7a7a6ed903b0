pub mod collector;
pub mod duckduckgo;
pub mod page;

use std::error::Error;
use std::fmt::{Display, Formatter};

pub use collector::{ProviderOrderJudge, ResultJudge, SearchCollector, SearchContext};
pub use duckduckgo::DuckDuckGoSearch;
pub use page::HttpPageFetcher;

/// Desktop browser identity; the DuckDuckGo HTML endpoint and many sites
/// refuse or degrade requests without one.
pub(crate) const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// One entry of a search engine result list. `rank` is the 0-based position
/// the provider returned it at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub rank: usize,
    pub url: String,
    pub title: String,
    pub description: String,
}

/// Outcome of checking one hit: the fetched text plus whether it survived
/// validation. Invalid results never reach prompt assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub rank: usize,
    pub url: String,
    pub title: String,
    pub extracted_text: String,
    pub valid: bool,
    pub rejection: Option<String>,
}

impl SearchResult {
    pub(crate) fn rejected(hit: &SearchHit, reason: impl Into<String>) -> Self {
        Self {
            rank: hit.rank,
            url: hit.url.clone(),
            title: hit.title.clone(),
            extracted_text: String::new(),
            valid: false,
            rejection: Some(reason.into()),
        }
    }

    pub fn into_snippet(self) -> Option<Snippet> {
        self.valid.then(|| Snippet {
            rank: self.rank,
            url: self.url,
            title: self.title,
            text: self.extracted_text,
        })
    }
}

/// Validated, length-capped page text used as grounding context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snippet {
    pub rank: usize,
    pub url: String,
    pub title: String,
    pub text: String,
}

/// The search provider could not be queried. Turns degrade to answering
/// without search context when this happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    HttpStatus { status: u16 },
    Transport(String),
    Parse(String),
}

impl Display for SearchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HttpStatus { status } => {
                write!(f, "search provider request failed with status {status}")
            }
            Self::Transport(msg) => write!(f, "search provider transport error: {msg}"),
            Self::Parse(msg) => write!(f, "search provider parse error: {msg}"),
        }
    }
}

impl Error for SearchError {}

pub trait SearchProvider {
    fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> impl Future<Output = Result<Vec<SearchHit>, SearchError>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub url: String,
    pub title: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageError {
    Transport(String),
    HttpStatus(u16),
    UnsupportedContentType(String),
    ErrorPage(String),
    Empty,
}

impl Display for PageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(msg) => write!(f, "fetch failed: {msg}"),
            Self::HttpStatus(status) => write!(f, "fetch returned status {status}"),
            Self::UnsupportedContentType(content_type) => {
                write!(f, "unsupported content type '{content_type}'")
            }
            Self::ErrorPage(title) => write!(f, "looks like an error page ('{title}')"),
            Self::Empty => write!(f, "page has no extractable text"),
        }
    }
}

impl Error for PageError {}

pub trait PageFetcher {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<FetchedPage, PageError>> + Send;
}

pub(crate) fn normalize_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}
