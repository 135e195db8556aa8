pub mod state_loader;

pub use state_loader::load_question_state;
