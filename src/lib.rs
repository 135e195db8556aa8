//! # Question Canvas
//!
//! 通过自然语言指令多轮修改题目（Canvas 流程）
//!
//! ## 架构设计
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有共享状态，只暴露能力
//! - `ConversationStore` - 会话存储（内存实现可替换为持久化实现）
//! - `ConversationLocks` - 按会话加锁，保证同一会话串行修改
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `LlmService` - 调用兼容 OpenAI 的接口
//! - `Interpreter` - 把（快照, 指令, 上下文）解释为新快照
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一次修改"的完整流程
//! - `RefinementOrchestrator` - 校验 → 加载 → 解释 → 提交
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/` - 对外操作集合 `CanvasApp`
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult, GenerationError, ValidationError};
pub use infrastructure::{ConversationStore, InMemoryConversationStore};
pub use models::{
    Conversation, ConversationId, Difficulty, HistoryTurn, McqOption, QuestionSnapshot,
    QuestionType, RefinementEntry,
};
pub use orchestrator::{CanvasApp, ConversationHistory, QuestionSource};
pub use services::{Interpretation, Interpreter, LlmInterpreter};
pub use workflow::{RefinementOrchestrator, RefinementRequest, RefinementResult};
