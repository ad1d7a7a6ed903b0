pub mod generator;
pub mod judge;
pub mod prompt;
pub mod router;
pub mod turn;

pub use judge::ModelJudge;
pub use turn::{
    Assistant, AssistantConfig, ConversationTurn, TurnError, TurnEvent, TurnResult,
};
