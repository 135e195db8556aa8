pub mod conversation;
pub mod loaders;
pub mod question;

pub use conversation::{
    Conversation, ConversationId, ConversationState, HistoryTurn, RefinementEntry,
};
pub use loaders::load_question_state;
pub use question::{Difficulty, McqOption, QuestionSnapshot, QuestionState, QuestionType};
