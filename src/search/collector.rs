#[cfg(test)]
use super::Snippet;
use super::{FetchedPage, PageFetcher, SearchError, SearchHit, SearchProvider, SearchResult};
use crate::config::SearchLimits;

/// What the user asked and what was actually sent to the search engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchContext {
    pub user_prompt: String,
    pub search_query: String,
}

/// Chooses which remaining hit to check next and whether a fetched page is
/// worth using.
pub trait ResultJudge {
    /// Index into `candidates`. Out-of-range values are clamped by the caller.
    fn pick_next(
        &self,
        candidates: &[SearchHit],
        ctx: &SearchContext,
    ) -> impl Future<Output = usize> + Send;

    fn accepts(&self, page: &FetchedPage, ctx: &SearchContext)
    -> impl Future<Output = bool> + Send;
}

/// Takes hits in provider order and accepts every page that fetched cleanly.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProviderOrderJudge;

impl ResultJudge for ProviderOrderJudge {
    async fn pick_next(&self, _candidates: &[SearchHit], _ctx: &SearchContext) -> usize {
        0
    }

    async fn accepts(&self, _page: &FetchedPage, _ctx: &SearchContext) -> bool {
        true
    }
}

/// Pull-based sequence of checked search results for one query.
///
/// Nothing past the initial search request happens until the caller asks for
/// the next item, and the sequence ends once `max_snippets` valid snippets
/// were produced, `max_page_attempts` pages were checked, or the hits ran out.
pub struct SearchCollector<'a, F, J> {
    fetcher: &'a F,
    judge: &'a J,
    ctx: SearchContext,
    limits: SearchLimits,
    candidates: Vec<SearchHit>,
    attempts: usize,
    produced: usize,
}

impl<'a, F: PageFetcher, J: ResultJudge> SearchCollector<'a, F, J> {
    pub async fn start<S: SearchProvider>(
        search: &S,
        fetcher: &'a F,
        judge: &'a J,
        ctx: SearchContext,
        limits: SearchLimits,
    ) -> Result<Self, SearchError> {
        let mut candidates = search
            .search(&ctx.search_query, limits.max_search_results)
            .await?;
        candidates.truncate(limits.max_search_results);
        // Snippets are ordered by rank downstream, so rank is the provider position.
        for (rank, hit) in candidates.iter_mut().enumerate() {
            hit.rank = rank;
        }

        Ok(Self {
            fetcher,
            judge,
            ctx,
            limits,
            candidates,
            attempts: 0,
            produced: 0,
        })
    }

    pub fn remaining_candidates(&self) -> &[SearchHit] {
        &self.candidates
    }

    fn exhausted(&self) -> bool {
        self.candidates.is_empty()
            || self.produced >= self.limits.max_snippets
            || self.attempts >= self.limits.max_page_attempts
    }

    /// Checks one more hit. Returns `None` once the sequence is exhausted.
    pub async fn next_checked(&mut self) -> Option<SearchResult> {
        if self.exhausted() {
            return None;
        }

        let picked = self.judge.pick_next(&self.candidates, &self.ctx).await;
        let hit = self
            .candidates
            .remove(picked.min(self.candidates.len() - 1));
        self.attempts += 1;

        let result = match self.fetcher.fetch(&hit.url).await {
            Err(err) => SearchResult::rejected(&hit, err.to_string()),
            Ok(page) if page.text.trim().is_empty() => {
                SearchResult::rejected(&hit, "page has no extractable text")
            }
            Ok(page) => {
                if self.judge.accepts(&page, &self.ctx).await {
                    let title = if page.title.is_empty() {
                        hit.title.clone()
                    } else {
                        page.title
                    };
                    SearchResult {
                        rank: hit.rank,
                        url: hit.url,
                        title,
                        extracted_text: truncate_chars(
                            page.text.trim(),
                            self.limits.max_snippet_chars,
                        ),
                        valid: true,
                        rejection: None,
                    }
                } else {
                    SearchResult::rejected(&hit, "page does not contain the needed data")
                }
            }
        };

        if result.valid {
            self.produced += 1;
        }
        Some(result)
    }

    /// Next validated snippet, skipping over dropped results.
    #[cfg(test)]
    pub async fn next_snippet(&mut self) -> Option<Snippet> {
        while let Some(result) = self.next_checked().await {
            if let Some(snippet) = result.into_snippet() {
                return Some(snippet);
            }
        }
        None
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => text[..cut].trim_end().to_string(),
        None => text.to_string(),
    }
}
