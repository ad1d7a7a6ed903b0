use crate::agent::prompt::ASSISTANT_SYSTEM_PROMPT;
use crate::llm::{ChatInput, LlmError, LlmProvider, LlmResult};

/// Streams the reply to `prompt`, forwarding fragments to `on_chunk`, and
/// returns the full text exactly as the runtime produced it.
pub async fn generate_response<P, F>(llm: &P, prompt: &str, on_chunk: F) -> LlmResult<String>
where
    P: LlmProvider,
    F: FnMut(&str) + Send,
{
    let output = llm
        .chat_streaming(ChatInput::new(ASSISTANT_SYSTEM_PROMPT, prompt), on_chunk)
        .await?;
    if output.text.trim().is_empty() {
        return Err(LlmError::EmptyResponse);
    }
    Ok(output.text)
}

#[cfg(test)]
mod tests {
    use super::generate_response;
    use crate::agent::prompt::ASSISTANT_SYSTEM_PROMPT;
    use crate::llm::{ChatInput, ChatOutput, LlmError, LlmProvider, LlmResult};
    use std::sync::Mutex;

    struct ChunkedLlm {
        chunks: Vec<&'static str>,
        seen: Mutex<Option<ChatInput>>,
    }

    impl LlmProvider for ChunkedLlm {
        async fn chat(&self, _input: ChatInput) -> LlmResult<ChatOutput> {
            Err(LlmError::Runtime("non-streaming call not expected".to_string()))
        }

        async fn chat_streaming<F>(
            &self,
            input: ChatInput,
            mut on_chunk: F,
        ) -> LlmResult<ChatOutput>
        where
            F: FnMut(&str) + Send,
        {
            *self.seen.lock().expect("seen lock") = Some(input);
            for chunk in &self.chunks {
                on_chunk(chunk);
            }
            Ok(ChatOutput {
                text: self.chunks.concat(),
            })
        }
    }

    #[tokio::test]
    async fn streams_chunks_and_returns_verbatim_text() {
        let llm = ChunkedLlm {
            chunks: vec!["It is ", "sunny", " in Tokyo.\n"],
            seen: Mutex::new(None),
        };
        let mut streamed = Vec::new();

        let text = generate_response(&llm, "prompt body", |chunk| streamed.push(chunk.to_string()))
            .await
            .expect("response");

        assert_eq!(text, "It is sunny in Tokyo.\n");
        assert_eq!(streamed, vec!["It is ", "sunny", " in Tokyo.\n"]);
        let seen = llm.seen.lock().expect("seen lock").clone().expect("input sent");
        assert_eq!(seen.system_text(), Some(ASSISTANT_SYSTEM_PROMPT));
        assert_eq!(seen.last_user_text(), Some("prompt body"));
    }

    #[tokio::test]
    async fn whitespace_only_reply_is_an_error() {
        let llm = ChunkedLlm {
            chunks: vec!["  ", "\n"],
            seen: Mutex::new(None),
        };
        let err = generate_response(&llm, "prompt", |_| {})
            .await
            .expect_err("empty reply");
        assert_eq!(err, LlmError::EmptyResponse);
    }
}
