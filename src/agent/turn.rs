use std::error::Error;
use std::fmt::{Display, Formatter};

use crate::agent::generator::generate_response;
use crate::agent::judge::ModelJudge;
use crate::agent::prompt::build_final_prompt;
use crate::agent::router::{decide_search, generate_search_query};
use crate::config::{AppConfig, SearchLimits, SearchMode};
use crate::llm::{LlmError, LlmProvider};
use crate::search::{
    PageFetcher, SearchCollector, SearchContext, SearchError, SearchProvider, SearchResult, Snippet,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssistantConfig {
    pub search_mode: SearchMode,
    pub limits: SearchLimits,
    pub select_results_with_model: bool,
    pub validate_pages_with_model: bool,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            search_mode: SearchMode::Auto,
            limits: SearchLimits::default(),
            select_results_with_model: true,
            validate_pages_with_model: true,
        }
    }
}

impl From<&AppConfig> for AssistantConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            search_mode: config.search_mode,
            limits: config.limits,
            select_results_with_model: config.select_results_with_model,
            validate_pages_with_model: config.validate_pages_with_model,
        }
    }
}

/// Everything one user input produced. Dropped once it has been displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationTurn {
    pub query: String,
    pub needs_search: bool,
    pub search_query: Option<String>,
    pub search_snippets: Vec<Snippet>,
    pub prompt: String,
    pub response: String,
}

/// Progress notifications emitted while a turn runs, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnEvent<'a> {
    SearchDecision { needs_search: bool },
    SearchQuery(&'a str),
    SearchResults { count: usize },
    SearchUnavailable(&'a SearchError),
    PageChecked(&'a SearchResult),
    ResponseChunk(&'a str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnError {
    EmptyQuery,
    UpstreamUnavailable(LlmError),
    ModelUnavailable(LlmError),
}

impl Display for TurnError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyQuery => write!(f, "query is empty"),
            Self::UpstreamUnavailable(err) => {
                write!(f, "could not decide whether to search: {err}")
            }
            Self::ModelUnavailable(err) => write!(f, "could not generate a response: {err}"),
        }
    }
}

impl Error for TurnError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::EmptyQuery => None,
            Self::UpstreamUnavailable(err) | Self::ModelUnavailable(err) => Some(err),
        }
    }
}

pub type TurnResult<T> = std::result::Result<T, TurnError>;

/// The per-turn pipeline: classify, collect, build the prompt, generate.
pub struct Assistant<P, S, F> {
    llm: P,
    search: S,
    pages: F,
    config: AssistantConfig,
}

impl<P, S, F> Assistant<P, S, F>
where
    P: LlmProvider + Sync,
    S: SearchProvider,
    F: PageFetcher,
{
    pub fn new(llm: P, search: S, pages: F, config: AssistantConfig) -> Self {
        Self {
            llm,
            search,
            pages,
            config,
        }
    }

    pub async fn run_turn<E>(&self, query: &str, on_event: &mut E) -> TurnResult<ConversationTurn>
    where
        E: FnMut(TurnEvent<'_>) + Send,
    {
        let query = query.trim();
        if query.is_empty() {
            return Err(TurnError::EmptyQuery);
        }

        let needs_search = decide_search(&self.llm, self.config.search_mode, query)
            .await
            .map_err(TurnError::UpstreamUnavailable)?;
        on_event(TurnEvent::SearchDecision { needs_search });

        let (search_query, search_snippets) = if needs_search {
            let search_query = generate_search_query(&self.llm, query).await;
            on_event(TurnEvent::SearchQuery(&search_query));
            let snippets = self.collect_snippets(query, &search_query, on_event).await;
            (Some(search_query), snippets)
        } else {
            (None, Vec::new())
        };

        let prompt = build_final_prompt(query, needs_search, &search_snippets);
        let response = generate_response(&self.llm, &prompt, |chunk| {
            on_event(TurnEvent::ResponseChunk(chunk));
        })
        .await
        .map_err(TurnError::ModelUnavailable)?;

        Ok(ConversationTurn {
            query: query.to_string(),
            needs_search,
            search_query,
            search_snippets,
            prompt,
            response,
        })
    }

    async fn collect_snippets<E>(
        &self,
        query: &str,
        search_query: &str,
        on_event: &mut E,
    ) -> Vec<Snippet>
    where
        E: FnMut(TurnEvent<'_>) + Send,
    {
        let judge = ModelJudge::new(
            &self.llm,
            self.config.select_results_with_model,
            self.config.validate_pages_with_model,
        );
        let ctx = SearchContext {
            user_prompt: query.to_string(),
            search_query: search_query.to_string(),
        };

        let mut collector =
            match SearchCollector::start(&self.search, &self.pages, &judge, ctx, self.config.limits)
                .await
            {
                Ok(collector) => collector,
                Err(err) => {
                    on_event(TurnEvent::SearchUnavailable(&err));
                    return Vec::new();
                }
            };
        on_event(TurnEvent::SearchResults {
            count: collector.remaining_candidates().len(),
        });

        let mut snippets = Vec::new();
        while let Some(result) = collector.next_checked().await {
            on_event(TurnEvent::PageChecked(&result));
            if let Some(snippet) = result.into_snippet() {
                snippets.push(snippet);
            }
        }
        snippets
    }
}
