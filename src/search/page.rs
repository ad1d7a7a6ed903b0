use scraper::{ElementRef, Html, Selector};

use super::{BROWSER_USER_AGENT, FetchedPage, PageError, PageFetcher, normalize_whitespace};
use crate::http::HttpClient;

const ACCEPT: &str = "text/html,application/xhtml+xml,text/plain;q=0.9";
const TEXT_BLOCKS: &str = "h1, h2, h3, h4, p, li, pre, blockquote, td, th";
const ERROR_TITLE_MARKERS: [&str; 7] = [
    "404",
    "not found",
    "access denied",
    "forbidden",
    "page unavailable",
    "just a moment",
    "attention required",
];

/// Downloads result pages and reduces them to readable text.
#[derive(Debug, Clone)]
pub struct HttpPageFetcher {
    http: HttpClient,
}

impl HttpPageFetcher {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }
}

impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, PageError> {
        let resp = self
            .http
            .get(url, &[], &[("User-Agent", BROWSER_USER_AGENT), ("Accept", ACCEPT)])
            .await
            .map_err(|err| PageError::Transport(err.to_string()))?;

        if !resp.is_success() {
            return Err(PageError::HttpStatus(resp.status));
        }

        let content_type = resp
            .content_type
            .as_deref()
            .unwrap_or("text/html")
            .to_ascii_lowercase();
        let (title, text) = if content_type.contains("html") {
            extract_html_text(&resp.body)
        } else if content_type.starts_with("text/plain") {
            (String::new(), resp.body.trim().to_string())
        } else {
            return Err(PageError::UnsupportedContentType(content_type));
        };

        if looks_like_error_page(&title) {
            return Err(PageError::ErrorPage(title));
        }
        if text.is_empty() {
            return Err(PageError::Empty);
        }

        Ok(FetchedPage {
            url: url.to_string(),
            title,
            text,
        })
    }
}

/// Returns the document title and the whitespace-normalised text of its
/// readable blocks, one block per line. Blocks nested inside another block
/// are covered by their outer block.
pub fn extract_html_text(html: &str) -> (String, String) {
    let document = Html::parse_document(html);

    let title = Selector::parse("title")
        .ok()
        .and_then(|sel| {
            document
                .select(&sel)
                .next()
                .map(|el| normalize_whitespace(&el.text().collect::<Vec<_>>().join(" ")))
        })
        .unwrap_or_default();

    let Ok(blocks) = Selector::parse(TEXT_BLOCKS) else {
        return (title, String::new());
    };
    let text = document
        .select(&blocks)
        .filter(|el| {
            !el.ancestors()
                .filter_map(ElementRef::wrap)
                .any(|outer| blocks.matches(&outer))
        })
        .map(|el| normalize_whitespace(&el.text().collect::<Vec<_>>().join(" ")))
        .filter(|block| !block.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    (title, text)
}

fn looks_like_error_page(title: &str) -> bool {
    let title = title.to_ascii_lowercase();
    ERROR_TITLE_MARKERS
        .iter()
        .any(|marker| title.contains(marker))
}
