use serde_json::json;

use crate::search::{SearchHit, Snippet};

const PAGE_TEXT_LIMIT: usize = 8_000;

pub const ASSISTANT_SYSTEM_PROMPT: &str = r#"You are an AI assistant that helps users by analyzing search results and user queries.

Rules:
1) When search results are provided before the user's question, ground your answer in them.
2) Combine the search data with clear explanations; do not invent facts the results do not support.
3) If no usable search results were found, say so and answer from your own knowledge.
4) Be precise and helpful."#;

pub const SEARCH_DECISION_PROMPT: &str = r#"You are a decision-making system. Analyze the user message and decide whether a web search would help provide a better response.

Answer "True" if a knowledgeable human would need to look something up online to answer properly (current events, prices, weather, recent releases, facts you are unsure of).
Answer "False" if the question can be answered well without searching.

Respond only with "True" or "False". Do not explain."#;

pub const QUERY_GENERATOR_PROMPT: &str = r#"You are a search query generator optimized for DuckDuckGo. Turn the user's question into one effective search query.

You may use DuckDuckGo syntax: site: to restrict domains, intitle: for page titles, filetype: for file types.
Keep the query focused and under 100 characters. Remove unnecessary words, keep key technical terms.
Output only the query string, with no explanation or extra text."#;

pub const RESULT_SELECTOR_PROMPT: &str = r#"You are not an assistant that responds to a user. You select the best search result from a list.

The best result is the link an expert search engine user would click first to find the data needed to respond to USER_PROMPT after searching for SEARCH_QUERY.
Every message has the format:
    SEARCH_RESULTS: [{"id": 0, ...}, ...]
    USER_PROMPT: "prompt sent to a web search enabled assistant"
    SEARCH_QUERY: "search query used to get the results"

Respond only with the id of the best result, a single integer."#;

pub const PAGE_VALIDATOR_PROMPT: &str = r#"You are not an assistant that responds to a user. You check whether text scraped from a web page contains the data another assistant needs.

Every message has the format:
    PAGE_TEXT: "text of the page"
    USER_PROMPT: "prompt sent to a web search enabled assistant"
    SEARCH_QUERY: "search query that found the page"

Respond only with "True" if PAGE_TEXT contains reliable data needed to answer USER_PROMPT, otherwise "False"."#;

const GROUNDED_INSTRUCTION: &str =
    "Answer the user's prompt using the search results below. Cite sources by their number when you use them.";

const NO_RESULTS_NOTE: &str = "NOTE: A web search was attempted for this prompt but produced no usable results. Answer from your own knowledge and tell the user that no search results could be used.";

pub fn query_generation_message(query: &str) -> String {
    format!("CREATE A SEARCH QUERY FOR THE FOLLOWING QUESTION:\n{query}")
}

/// `id` is the position in `candidates`, which shrinks as hits are checked.
pub fn result_selection_message(
    candidates: &[SearchHit],
    user_prompt: &str,
    search_query: &str,
) -> String {
    let results = candidates
        .iter()
        .enumerate()
        .map(|(id, hit)| {
            json!({
                "id": id,
                "link": hit.url,
                "search_description": hit.description,
            })
        })
        .collect::<Vec<_>>();

    format!(
        "SEARCH_RESULTS: {}\nUSER_PROMPT: \"{user_prompt}\"\nSEARCH_QUERY: \"{search_query}\"",
        serde_json::Value::Array(results)
    )
}

pub fn page_validation_message(page_text: &str, user_prompt: &str, search_query: &str) -> String {
    let page_text = match page_text.char_indices().nth(PAGE_TEXT_LIMIT) {
        Some((cut, _)) => &page_text[..cut],
        None => page_text,
    };
    format!(
        "PAGE_TEXT: \"{page_text}\"\nUSER_PROMPT: \"{user_prompt}\"\nSEARCH_QUERY: \"{search_query}\""
    )
}

/// Builds the user message sent to the generator for one turn.
///
/// Snippets are listed in provider rank order whatever order they were
/// collected in.
pub fn build_final_prompt(query: &str, needs_search: bool, snippets: &[Snippet]) -> String {
    if !needs_search {
        return query.to_string();
    }

    if snippets.is_empty() {
        return format!("USER_PROMPT: {query}\n\n{NO_RESULTS_NOTE}");
    }

    let mut ordered = snippets.iter().collect::<Vec<_>>();
    ordered.sort_by_key(|snippet| snippet.rank);

    let mut prompt = format!("{GROUNDED_INSTRUCTION}\n\nSEARCH_RESULTS:\n");
    for (n, snippet) in ordered.iter().enumerate() {
        prompt.push_str(&format!(
            "[{}] {} ({})\n{}\n\n",
            n + 1,
            snippet.title,
            snippet.url,
            snippet.text
        ));
    }
    prompt.push_str(&format!("USER_PROMPT: {query}"));
    prompt
}
