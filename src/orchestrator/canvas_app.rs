//! Canvas 应用 - 编排层
//!
//! ## 职责
//!
//! 对外暴露的操作集合，供 API 层或命令行直接调用：
//!
//! 1. `start_or_continue_refinement` - 开始或继续一次修改
//! 2. `get_conversation_history` - 查看会话历史
//! 3. `reset_conversation` - 重置会话
//!
//! ## 设计特点
//!
//! - **资源所有者**：持有存储与解释器，生命周期与应用一致
//! - **向下委托**：具体流程交给 `workflow::RefinementOrchestrator`

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::config::Config;
use crate::error::AppResult;
use crate::infrastructure::{ConversationStore, InMemoryConversationStore};
use crate::models::{
    Conversation, ConversationId, ConversationState, QuestionSnapshot, RefinementEntry,
};
use crate::services::{Interpreter, LlmInterpreter, LlmService};
use crate::workflow::{RefinementOrchestrator, RefinementRequest, RefinementResult};

/// 题目来源：新题目状态，或已有会话
#[derive(Debug, Clone)]
pub enum QuestionSource {
    State(QuestionSnapshot),
    Conversation(ConversationId),
}

impl From<QuestionSnapshot> for QuestionSource {
    fn from(snapshot: QuestionSnapshot) -> Self {
        QuestionSource::State(snapshot)
    }
}

impl From<ConversationId> for QuestionSource {
    fn from(id: ConversationId) -> Self {
        QuestionSource::Conversation(id)
    }
}

/// 会话历史视图
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationHistory {
    pub conversation_id: ConversationId,
    pub state: ConversationState,
    pub base_snapshot: QuestionSnapshot,
    pub turns: Vec<RefinementEntry>,
    pub current_state: QuestionSnapshot,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Conversation> for ConversationHistory {
    fn from(conv: Conversation) -> Self {
        let current_state = conv.current_snapshot().clone();
        Self {
            conversation_id: conv.id,
            state: conv.state(),
            base_snapshot: conv.base_snapshot,
            turns: conv.entries,
            current_state,
            created_at: conv.created_at,
            updated_at: conv.updated_at,
        }
    }
}

/// Canvas 应用
pub struct CanvasApp {
    orchestrator: RefinementOrchestrator,
}

impl CanvasApp {
    /// 使用内存存储与 LLM 解释器初始化
    pub fn initialize(config: &Config) -> Self {
        let interpreter = Arc::new(LlmInterpreter::new(LlmService::new(config)));
        let app = Self::with_interpreter(interpreter, config);

        info!("✓ Canvas 应用初始化完成 (模型: {})", config.llm_model_name);
        app
    }

    /// 使用按配置容量创建的内存存储与自定义解释器
    pub fn with_interpreter(interpreter: Arc<dyn Interpreter>, config: &Config) -> Self {
        let store = Arc::new(InMemoryConversationStore::with_capacity(
            config.max_conversations,
        ));
        Self::with_components(store, interpreter, config)
    }

    /// 使用自定义存储与解释器
    pub fn with_components(
        store: Arc<dyn ConversationStore>,
        interpreter: Arc<dyn Interpreter>,
        config: &Config,
    ) -> Self {
        Self {
            orchestrator: RefinementOrchestrator::new(store, interpreter, config),
        }
    }

    /// 开始或继续一次修改
    pub async fn start_or_continue_refinement(
        &self,
        instruction: impl Into<String>,
        source: impl Into<QuestionSource>,
    ) -> AppResult<RefinementResult> {
        let request = match source.into() {
            QuestionSource::State(snapshot) => RefinementRequest::start(instruction, snapshot),
            QuestionSource::Conversation(id) => RefinementRequest::resume(instruction, id),
        };
        self.orchestrator.refine(request).await
    }

    /// 处理原始请求（字段未经二选一校验）
    pub async fn refine(&self, request: RefinementRequest) -> AppResult<RefinementResult> {
        self.orchestrator.refine(request).await
    }

    /// 查看会话历史
    pub async fn get_conversation_history(
        &self,
        id: ConversationId,
    ) -> AppResult<ConversationHistory> {
        Ok(self.orchestrator.conversation(id).await?.into())
    }

    /// 重置会话
    pub async fn reset_conversation(&self, id: ConversationId) -> AppResult<()> {
        self.orchestrator.reset(id).await
    }
}
