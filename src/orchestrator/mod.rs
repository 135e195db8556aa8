//! 编排层（Orchestration Layer）
//!
//! ## 层次关系
//!
//! ```text
//! orchestrator::CanvasApp (对外操作集合)
//!     ↓
//! workflow::RefinementOrchestrator (处理单次修改)
//!     ↓
//! services (能力层：interpreter / llm)
//!     ↓
//! infrastructure (基础设施：ConversationStore / ConversationLocks)
//! ```
//!
//! 编排层只做组装和委托，不做具体业务判断。

pub mod canvas_app;

pub use canvas_app::{CanvasApp, ConversationHistory, QuestionSource};
