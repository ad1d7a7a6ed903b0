use crate::agent::{Assistant, TurnEvent};
use crate::cli::theme::Theme;
use crate::config::ThemeToken;
use crate::llm::LlmProvider;
use crate::search::{PageFetcher, SearchProvider};
use crate::trace::SessionTrace;
use anyhow::Result;
use std::io::{self, Write};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

const USER_LABEL: &str = "You:";
const ASSISTANT_LABEL: &str = "Assistant:";

pub struct ReplSettings<'a> {
    pub theme: &'a Theme,
    pub trace: &'a SessionTrace,
    pub show_search_steps: bool,
}

/// Reads one query per line until `exit`, `quit` or end of input. Turn
/// failures are reported and the loop keeps going; only I/O errors on the
/// terminal itself end it early.
pub async fn run_repl<P, S, F, R, W>(
    assistant: &Assistant<P, S, F>,
    input: R,
    output: &mut W,
    settings: &ReplSettings<'_>,
) -> Result<()>
where
    P: LlmProvider + Sync,
    S: SearchProvider,
    F: PageFetcher,
    R: AsyncBufRead + Unpin,
    W: Write + Send,
{
    let mut lines = input.lines();

    loop {
        writeln!(output, "{}", settings.theme.paint(ThemeToken::UserPrompt, USER_LABEL))?;
        output.flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if is_exit_command(line) {
            break;
        }
        if line.is_empty() {
            continue;
        }

        settings.trace.log_input(line);
        run_one_turn(assistant, line, output, settings).await?;
    }

    Ok(())
}

fn is_exit_command(line: &str) -> bool {
    line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit")
}

async fn run_one_turn<P, S, F, W>(
    assistant: &Assistant<P, S, F>,
    line: &str,
    output: &mut W,
    settings: &ReplSettings<'_>,
) -> io::Result<()>
where
    P: LlmProvider + Sync,
    S: SearchProvider,
    F: PageFetcher,
    W: Write + Send,
{
    let mut printer = TurnPrinter {
        output,
        settings,
        label_printed: false,
        io_error: None,
    };
    let result = assistant
        .run_turn(line, &mut |event| printer.on_event(event))
        .await;

    match result {
        Ok(turn) => {
            settings.trace.log_output(&turn.response);
            if !printer.label_printed {
                printer.print_label();
                printer.write(ThemeToken::AssistantText, &turn.response);
            }
            printer.write_plain("\n\n");
        }
        Err(err) => {
            let message = err.to_string();
            settings.trace.log_turn_error(&message);
            if printer.label_printed {
                printer.write_plain("\n");
            }
            printer.write(ThemeToken::SystemError, &format!("Error: {message}"));
            printer.write_plain("\n\n");
        }
    }

    match printer.io_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Renders turn progress as it happens. The first write error is kept and
/// later writes are skipped.
struct TurnPrinter<'o, 's, W> {
    output: &'o mut W,
    settings: &'s ReplSettings<'s>,
    label_printed: bool,
    io_error: Option<io::Error>,
}

impl<W: Write> TurnPrinter<'_, '_, W> {
    fn on_event(&mut self, event: TurnEvent<'_>) {
        let trace = self.settings.trace;
        match event {
            TurnEvent::SearchDecision { needs_search } => {
                trace.log_route(&format!("needs_search={needs_search}"));
                if needs_search {
                    self.step("Searching the web...");
                }
            }
            TurnEvent::SearchQuery(query) => {
                trace.log_search(&format!("query: {query}"));
                self.step(&format!("Search query: {query}"));
            }
            TurnEvent::SearchResults { count } => {
                trace.log_search(&format!("results: {count}"));
                self.step(&format!("Found {count} results"));
            }
            TurnEvent::SearchUnavailable(err) => {
                trace.log_search(&format!("unavailable: {err}"));
                self.write(
                    ThemeToken::SystemInfo,
                    &format!("Web search unavailable ({err}); answering without search results.\n"),
                );
            }
            TurnEvent::PageChecked(result) => {
                let verdict = match &result.rejection {
                    None => "used".to_string(),
                    Some(reason) => format!("skipped: {reason}"),
                };
                trace.log_search(&format!("page {} {verdict}", result.url));
                self.step(&format!("Checked {} ({verdict})", result.url));
            }
            TurnEvent::ResponseChunk(chunk) => {
                if !self.label_printed {
                    self.print_label();
                }
                self.write(ThemeToken::AssistantText, chunk);
            }
        }
    }

    fn step(&mut self, text: &str) {
        if self.settings.show_search_steps {
            self.write(ThemeToken::SearchStep, &format!("{text}\n"));
        }
    }

    fn print_label(&mut self) {
        self.label_printed = true;
        let label = self.settings.theme.paint(ThemeToken::AssistantLabel, ASSISTANT_LABEL);
        self.write_plain(&format!("{label}\n"));
    }

    fn write(&mut self, token: ThemeToken, text: &str) {
        let painted = self.settings.theme.paint(token, text);
        self.write_plain(&painted);
    }

    fn write_plain(&mut self, text: &str) {
        if self.io_error.is_some() {
            return;
        }
        if let Err(err) = self
            .output
            .write_all(text.as_bytes())
            .and_then(|()| self.output.flush())
        {
            self.io_error = Some(err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ReplSettings, is_exit_command, run_repl};
    use crate::agent::{Assistant, AssistantConfig};
    use crate::cli::theme::Theme;
    use crate::config::SearchMode;
    use crate::llm::{ChatInput, ChatOutput, LlmError, LlmProvider, LlmResult};
    use crate::search::{
        FetchedPage, PageError, PageFetcher, SearchError, SearchHit, SearchProvider,
    };
    use crate::trace::SessionTrace;
    use std::fs;

    /// Replies "unavailable" when the prompt mentions it, otherwise echoes.
    struct EchoLlm;

    impl LlmProvider for EchoLlm {
        async fn chat(&self, _input: ChatInput) -> LlmResult<ChatOutput> {
            Err(LlmError::Runtime("classification not expected".to_string()))
        }

        async fn chat_streaming<F>(
            &self,
            input: ChatInput,
            mut on_chunk: F,
        ) -> LlmResult<ChatOutput>
        where
            F: FnMut(&str) + Send,
        {
            let prompt = input.last_user_text().unwrap_or_default().to_string();
            if prompt.contains("unavailable") {
                return Err(LlmError::Transport("connection refused".to_string()));
            }
            let text = format!("echo: {prompt}");
            on_chunk("echo: ");
            on_chunk(&prompt);
            Ok(ChatOutput { text })
        }
    }

    struct NoSearch;

    impl SearchProvider for NoSearch {
        async fn search(&self, _query: &str, _max: usize) -> Result<Vec<SearchHit>, SearchError> {
            Err(SearchError::Transport("search not expected".to_string()))
        }
    }

    impl PageFetcher for NoSearch {
        async fn fetch(&self, _url: &str) -> Result<FetchedPage, PageError> {
            Err(PageError::Empty)
        }
    }

    fn assistant() -> Assistant<EchoLlm, NoSearch, NoSearch> {
        Assistant::new(
            EchoLlm,
            NoSearch,
            NoSearch,
            AssistantConfig {
                search_mode: SearchMode::Never,
                ..AssistantConfig::default()
            },
        )
    }

    #[test]
    fn exit_commands_are_case_insensitive() {
        assert!(is_exit_command("exit"));
        assert!(is_exit_command("QUIT"));
        assert!(!is_exit_command("exit now"));
    }

    #[tokio::test]
    async fn loop_reports_failures_and_keeps_reading() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let trace = SessionTrace::create_in_temp_dir("repl", tmp.path()).expect("trace");
        let theme = Theme::new(false);
        let settings = ReplSettings {
            theme: &theme,
            trace: &trace,
            show_search_steps: false,
        };
        let input: &[u8] = b"hello\n\n   \nunavailable please\nsecond\nquit\nnever read\n";
        let mut output = Vec::new();

        run_repl(&assistant(), input, &mut output, &settings)
            .await
            .expect("repl");

        let output = String::from_utf8(output).expect("utf8");
        insta::assert_snapshot!(output, @r"
        You:
        Assistant:
        echo: hello

        You:
        You:
        You:
        Error: could not generate a response: model runtime transport error: connection refused

        You:
        Assistant:
        echo: second

        You:
        ");

        let content = fs::read_to_string(trace.file_path()).expect("trace content");
        assert!(content.contains("user.in"));
        assert!(content.contains("echo: second"));
        assert!(content.contains("turn.err"));
        assert!(!content.contains("never read"));
    }

    #[tokio::test]
    async fn end_of_input_ends_the_loop() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let trace = SessionTrace::create_in_temp_dir("repl-eof", tmp.path()).expect("trace");
        let theme = Theme::new(false);
        let settings = ReplSettings {
            theme: &theme,
            trace: &trace,
            show_search_steps: true,
        };
        let mut output = Vec::new();

        run_repl(&assistant(), &b"only line"[..], &mut output, &settings)
            .await
            .expect("repl");

        let output = String::from_utf8(output).expect("utf8");
        assert!(output.contains("echo: only line"));
        assert!(output.ends_with("You:\n"));
    }
}
