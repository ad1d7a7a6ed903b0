use crate::agent::prompt::{
    QUERY_GENERATOR_PROMPT, SEARCH_DECISION_PROMPT, query_generation_message,
};
use crate::config::SearchMode;
use crate::llm::{ChatInput, LlmProvider, LlmResult};

/// Decides whether `query` needs web search. Fixed modes never call the model.
pub async fn decide_search<P: LlmProvider>(
    llm: &P,
    mode: SearchMode,
    query: &str,
) -> LlmResult<bool> {
    match mode {
        SearchMode::Always => Ok(true),
        SearchMode::Never => Ok(false),
        SearchMode::Auto => {
            let output = llm
                .chat(ChatInput::new(SEARCH_DECISION_PROMPT, query))
                .await?;
            Ok(reply_is_true(&output.text))
        }
    }
}

/// Asks the model for a search-engine query, falling back to the raw user
/// query when the call fails or yields nothing usable.
pub async fn generate_search_query<P: LlmProvider>(llm: &P, query: &str) -> String {
    let generated = llm
        .chat(ChatInput::new(
            QUERY_GENERATOR_PROMPT,
            query_generation_message(query),
        ))
        .await
        .map(|output| clean_search_query(&output.text))
        .unwrap_or_default();

    if generated.is_empty() {
        query.trim().to_string()
    } else {
        generated
    }
}

pub(crate) fn reply_is_true(reply: &str) -> bool {
    reply.to_lowercase().contains("true")
}

fn clean_search_query(reply: &str) -> String {
    let line = reply.lines().find(|line| !line.trim().is_empty()).unwrap_or("");
    line.replace('"', "").trim().to_string()
}

/// First integer in a model reply, e.g. `"2"`, `"Index: 2"` or `"2."`.
pub(crate) fn parse_index(reply: &str) -> Option<usize> {
    let digits = reply
        .trim()
        .chars()
        .skip_while(|ch| !ch.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect::<String>();
    digits.parse().ok()
}
