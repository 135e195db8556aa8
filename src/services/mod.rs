pub mod interpreter;
pub mod llm_service;

pub use interpreter::{ChatBackend, Interpretation, Interpreter, LlmInterpreter};
pub use llm_service::{ChatMessage, ChatRole, LlmService};
