use crate::agent::prompt::{
    PAGE_VALIDATOR_PROMPT, RESULT_SELECTOR_PROMPT, page_validation_message,
    result_selection_message,
};
use crate::agent::router::{parse_index, reply_is_true};
use crate::llm::{ChatInput, LlmProvider};
use crate::search::{FetchedPage, ProviderOrderJudge, ResultJudge, SearchContext, SearchHit};

const SELECTION_ATTEMPTS: usize = 3;

/// Result judge backed by the chat model. A step that is switched off falls
/// back to [`ProviderOrderJudge`].
pub struct ModelJudge<'a, P> {
    llm: &'a P,
    select_with_model: bool,
    validate_with_model: bool,
}

impl<'a, P> ModelJudge<'a, P> {
    pub fn new(llm: &'a P, select_with_model: bool, validate_with_model: bool) -> Self {
        Self {
            llm,
            select_with_model,
            validate_with_model,
        }
    }
}

impl<P: LlmProvider + Sync> ResultJudge for ModelJudge<'_, P> {
    async fn pick_next(&self, candidates: &[SearchHit], ctx: &SearchContext) -> usize {
        if !self.select_with_model || candidates.len() < 2 {
            return ProviderOrderJudge.pick_next(candidates, ctx).await;
        }

        let message = result_selection_message(candidates, &ctx.user_prompt, &ctx.search_query);
        for _ in 0..SELECTION_ATTEMPTS {
            let Ok(output) = self
                .llm
                .chat(ChatInput::new(RESULT_SELECTOR_PROMPT, message.clone()))
                .await
            else {
                continue;
            };
            if let Some(index) = parse_index(&output.text) {
                return index.min(candidates.len() - 1);
            }
        }
        0
    }

    async fn accepts(&self, page: &FetchedPage, ctx: &SearchContext) -> bool {
        if !self.validate_with_model {
            return ProviderOrderJudge.accepts(page, ctx).await;
        }

        self.llm
            .chat(ChatInput::new(
                PAGE_VALIDATOR_PROMPT,
                page_validation_message(&page.text, &ctx.user_prompt, &ctx.search_query),
            ))
            .await
            .is_ok_and(|output| reply_is_true(&output.text))
    }
}
