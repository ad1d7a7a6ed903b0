use reqwest::Url;
use scraper::{Html, Selector};

use super::{BROWSER_USER_AGENT, SearchError, SearchHit, SearchProvider, normalize_whitespace};
use crate::http::HttpClient;

const NO_DESCRIPTION: &str = "No description available";

/// Scrapes the DuckDuckGo HTML (no-JavaScript) result page.
#[derive(Debug, Clone)]
pub struct DuckDuckGoSearch {
    http: HttpClient,
    base_url: String,
}

impl DuckDuckGoSearch {
    pub fn new(http: HttpClient, base_url: String) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/html/", self.base_url)
    }
}

impl SearchProvider for DuckDuckGoSearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError> {
        let resp = self
            .http
            .get(
                &self.endpoint(),
                &[("q", query)],
                &[("User-Agent", BROWSER_USER_AGENT)],
            )
            .await
            .map_err(|err| SearchError::Transport(err.to_string()))?;

        if !resp.is_success() {
            return Err(SearchError::HttpStatus {
                status: resp.status,
            });
        }

        parse_results(&resp.body, &self.base_url, max_results)
    }
}

fn parse_results(
    html: &str,
    base_url: &str,
    max_results: usize,
) -> Result<Vec<SearchHit>, SearchError> {
    let result_sel = selector("div.result")?;
    let title_sel = selector("a.result__a")?;
    let snippet_sel = selector(".result__snippet")?;
    let base = Url::parse(base_url).map_err(|err| SearchError::Parse(err.to_string()))?;

    let document = Html::parse_document(html);
    let mut hits = Vec::new();

    for result in document.select(&result_sel) {
        if hits.len() >= max_results {
            break;
        }
        if result.value().classes().any(|class| class == "result--ad") {
            continue;
        }

        let Some(title_link) = result.select(&title_sel).next() else {
            continue;
        };
        let Some(url) = title_link
            .value()
            .attr("href")
            .and_then(|href| resolve_link(&base, href))
        else {
            continue;
        };

        let title = normalize_whitespace(&title_link.text().collect::<String>());
        let description = result
            .select(&snippet_sel)
            .next()
            .map(|el| normalize_whitespace(&el.text().collect::<String>()))
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| NO_DESCRIPTION.to_string());

        hits.push(SearchHit {
            rank: hits.len(),
            url,
            title,
            description,
        });
    }

    Ok(hits)
}

fn selector(css: &str) -> Result<Selector, SearchError> {
    Selector::parse(css).map_err(|err| SearchError::Parse(format!("selector {css}: {err}")))
}

/// Resolves a result href against the endpoint and unwraps DuckDuckGo's
/// `/l/?uddg=<target>` redirect links.
fn resolve_link(base: &Url, href: &str) -> Option<String> {
    let url = base.join(href.trim()).ok()?;
    let target = match url.query_pairs().find(|(key, _)| key == "uddg") {
        Some((_, target)) => Url::parse(&target).ok()?,
        None => url,
    };

    matches!(target.scheme(), "http" | "https").then(|| target.to_string())
}
