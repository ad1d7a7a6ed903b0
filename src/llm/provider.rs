use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    System,
    User,
}

impl ChatRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatInput {
    pub messages: Vec<ChatMessage>,
}

impl ChatInput {
    /// The single-exchange shape every call in this crate uses: one system
    /// instruction followed by one user message.
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
        }
    }

    pub fn system_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|message| message.role == ChatRole::System)
            .map(|message| message.content.as_str())
    }

    pub fn last_user_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|message| message.role == ChatRole::User)
            .map(|message| message.content.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatOutput {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    HttpStatus { status: u16, body: String },
    Transport(String),
    Parse(String),
    Runtime(String),
    EmptyResponse,
}

impl Display for LlmError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HttpStatus { status, body } => {
                write!(f, "model runtime request failed with status {status}: {body}")
            }
            Self::Transport(msg) => write!(f, "model runtime transport error: {msg}"),
            Self::Parse(msg) => write!(f, "model runtime parse error: {msg}"),
            Self::Runtime(msg) => write!(f, "model runtime error: {msg}"),
            Self::EmptyResponse => write!(f, "model runtime returned empty response text"),
        }
    }
}

impl Error for LlmError {}

pub type LlmResult<T> = std::result::Result<T, LlmError>;

pub trait LlmProvider {
    /// Runs one exchange and returns the whole reply.
    fn chat(&self, input: ChatInput) -> impl Future<Output = LlmResult<ChatOutput>> + Send;

    /// Runs one exchange, handing each content fragment to `on_chunk` as it
    /// arrives. The returned output is the concatenation of all fragments.
    fn chat_streaming<F>(
        &self,
        input: ChatInput,
        on_chunk: F,
    ) -> impl Future<Output = LlmResult<ChatOutput>> + Send
    where
        F: FnMut(&str) + Send;
}
