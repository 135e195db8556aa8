//! 题目修改流程 - 流程层
//!
//! 核心职责：定义"一次修改"的完整处理流程
//!
//! 流程顺序：
//! 1. 校验请求（指令、题目来源二选一）
//! 2. 加载会话（继续）或使用请求中的题目状态（新建）
//! 3. 截取最近 N 轮上下文 → 调用解释器（带超时）
//! 4. 成功后提交：新会话先创建再追加，已有会话直接追加
//!
//! 同一会话的修改串行执行；任何失败都不会写入存储。

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, GenerationError, ValidationError};
use crate::infrastructure::{ConversationLocks, ConversationStore};
use crate::models::{
    Conversation, ConversationId, HistoryTurn, QuestionSnapshot, RefinementEntry,
};
use crate::services::{Interpretation, Interpreter};
use crate::utils::logging::truncate_text;
use crate::workflow::refinement_ctx::RefinementCtx;

/// 修改请求
///
/// `question_state` 与 `conversation_id` 必须且只能提供一个
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefinementRequest {
    pub instruction: String,
    #[serde(default)]
    pub question_state: Option<QuestionSnapshot>,
    #[serde(default)]
    pub conversation_id: Option<ConversationId>,
}

impl RefinementRequest {
    /// 以题目状态开始新会话
    pub fn start(instruction: impl Into<String>, question_state: QuestionSnapshot) -> Self {
        Self {
            instruction: instruction.into(),
            question_state: Some(question_state),
            conversation_id: None,
        }
    }

    /// 继续已有会话
    pub fn resume(instruction: impl Into<String>, conversation_id: ConversationId) -> Self {
        Self {
            instruction: instruction.into(),
            question_state: None,
            conversation_id: Some(conversation_id),
        }
    }
}

/// 修改结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefinementResult {
    pub conversation_id: ConversationId,
    pub snapshot: QuestionSnapshot,
    pub summary: String,
    pub confidence_score: f64,
    /// 提交后会话中的记录数
    pub history_length: u64,
}

/// 校验后的题目来源
enum Source {
    New(QuestionSnapshot),
    Existing(ConversationId),
}

/// 题目修改编排器
///
/// - 编排"校验 → 加载 → 解释 → 提交"流程
/// - 不持有存储细节，只依赖 `ConversationStore` 与 `Interpreter`
/// - 不重试，失败原样返回给调用方
pub struct RefinementOrchestrator {
    store: Arc<dyn ConversationStore>,
    interpreter: Arc<dyn Interpreter>,
    locks: ConversationLocks,
    history_window: usize,
    min_instruction_chars: usize,
    interpreter_timeout: Duration,
}

impl RefinementOrchestrator {
    /// 创建新的编排器
    pub fn new(
        store: Arc<dyn ConversationStore>,
        interpreter: Arc<dyn Interpreter>,
        config: &Config,
    ) -> Self {
        Self {
            store,
            interpreter,
            locks: ConversationLocks::new(),
            history_window: config.history_window,
            min_instruction_chars: config.min_instruction_chars,
            interpreter_timeout: config.interpreter_timeout(),
        }
    }

    /// 覆盖解释器超时（支持亚秒级，主要用于测试）
    pub fn with_interpreter_timeout(mut self, timeout: Duration) -> Self {
        self.interpreter_timeout = timeout;
        self
    }

    /// 执行一次修改
    pub async fn refine(&self, request: RefinementRequest) -> AppResult<RefinementResult> {
        let instruction = self.validate_instruction(&request.instruction)?;
        let source = match (request.question_state, request.conversation_id) {
            (Some(_), Some(_)) => return Err(ValidationError::AmbiguousQuestionSource.into()),
            (None, None) => return Err(ValidationError::MissingQuestionSource.into()),
            (Some(state), None) => Source::New(state),
            (None, Some(id)) => Source::Existing(id),
        };

        match source {
            Source::New(base) => self.refine_new(base, instruction).await,
            Source::Existing(id) => self.refine_existing(id, instruction).await,
        }
    }

    /// 查看会话
    pub async fn conversation(&self, id: ConversationId) -> AppResult<Conversation> {
        self.store.get(id).await
    }

    /// 重置会话：清空记录，保留基础快照
    pub async fn reset(&self, id: ConversationId) -> AppResult<()> {
        let _guard = self.locks.lock(id).await;
        self.store.reset(id).await?;
        info!("[会话 {}] 🔄 已重置", id);
        Ok(())
    }

    async fn refine_new(
        &self,
        base: QuestionSnapshot,
        instruction: &str,
    ) -> AppResult<RefinementResult> {
        let ctx = RefinementCtx::new_conversation();
        self.log_instruction(&ctx, instruction);

        let interpretation = self.interpret(&ctx, &base, instruction, &[]).await?;

        // 解释成功后才创建会话，失败时不留下空会话
        let id = self.store.create(base).await?;
        let ctx = RefinementCtx::existing(id, 1);
        let _guard = self.locks.lock(id).await;

        self.commit(id, &ctx, instruction, interpretation).await
    }

    async fn refine_existing(
        &self,
        id: ConversationId,
        instruction: &str,
    ) -> AppResult<RefinementResult> {
        let _guard = self.locks.lock(id).await;

        let conversation = self.store.get(id).await.map_err(|e| {
            warn!("[会话 {}] ⚠️ 无法加载会话: {}", id, e);
            e
        })?;

        let ctx = RefinementCtx::existing(id, conversation.next_sequence_number());
        self.log_instruction(&ctx, instruction);

        let history = conversation.recent_turns(self.history_window);
        let interpretation = self
            .interpret(&ctx, conversation.current_snapshot(), instruction, &history)
            .await?;

        self.commit(id, &ctx, instruction, interpretation).await
    }

    /// 调用解释器，超时转换为 `GenerationError::Timeout`
    async fn interpret(
        &self,
        ctx: &RefinementCtx,
        current: &QuestionSnapshot,
        instruction: &str,
        history: &[HistoryTurn],
    ) -> AppResult<Interpretation> {
        let call = self.interpreter.interpret(current, instruction, history);

        let result = match tokio::time::timeout(self.interpreter_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(GenerationError::Timeout {
                after: self.interpreter_timeout,
            }),
        };

        result.map_err(|e| {
            error!("{} ❌ 解释器调用失败: {}", ctx, e);
            AppError::from(e)
        })
    }

    /// 写入新记录
    async fn commit(
        &self,
        id: ConversationId,
        ctx: &RefinementCtx,
        instruction: &str,
        interpretation: Interpretation,
    ) -> AppResult<RefinementResult> {
        let entry = RefinementEntry {
            instruction: instruction.to_string(),
            resulting_snapshot: interpretation.snapshot.clone(),
            summary: interpretation.summary.clone(),
            confidence_score: interpretation.confidence_score,
            sequence_number: ctx.turn,
            created_at: Utc::now(),
        };

        self.store.append(id, entry).await.map_err(|e| {
            warn!("{} ⚠️ 提交失败: {}", ctx, e);
            e
        })?;

        info!(
            "{} ✓ 修改完成 (置信度: {:.2}): {}",
            ctx,
            interpretation.confidence_score,
            truncate_text(&interpretation.summary, 80)
        );

        Ok(RefinementResult {
            conversation_id: id,
            snapshot: interpretation.snapshot,
            summary: interpretation.summary,
            confidence_score: interpretation.confidence_score,
            history_length: ctx.turn,
        })
    }

    fn validate_instruction<'a>(&self, instruction: &'a str) -> Result<&'a str, ValidationError> {
        let trimmed = instruction.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyInstruction);
        }

        let chars = trimmed.chars().count();
        if chars < self.min_instruction_chars {
            return Err(ValidationError::InstructionTooShort {
                min: self.min_instruction_chars,
                actual: chars,
            });
        }

        Ok(trimmed)
    }

    fn log_instruction(&self, ctx: &RefinementCtx, instruction: &str) {
        info!("{} ✏️ 指令: {}", ctx, truncate_text(instruction, 80));
    }
}
