pub mod conversation_store;
pub mod keyed_lock;

pub use conversation_store::{ConversationStore, InMemoryConversationStore};
pub use keyed_lock::{ConversationGuard, ConversationLocks};
