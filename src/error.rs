//! 错误类型
//!
//! 分类：
//! - `Validation` - 输入不合法（调用方修正后可重试）
//! - `NotFound` - 会话不存在（调用方需新建会话）
//! - `Generation` - 解释器（LLM）失败，可原样重试
//! - `Conflict` - 同一会话并发写入冲突，需重新读取后重试

use std::time::Duration;

use thiserror::Error;

use crate::models::ConversationId;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 输入校验错误
    #[error("校验错误: {0}")]
    Validation(#[from] ValidationError),

    /// 会话不存在
    #[error("会话不存在: {conversation_id}")]
    NotFound { conversation_id: ConversationId },

    /// 生成（解释器）错误
    #[error("生成错误: {0}")]
    Generation(#[from] GenerationError),

    /// 并发写入冲突
    #[error("会话 {conversation_id} 写入冲突: 期望序号 {expected}, 实际序号 {actual}")]
    Conflict {
        conversation_id: ConversationId,
        expected: u64,
        actual: u64,
    },

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    /// 文件错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
}

/// 输入校验错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// 指令为空
    #[error("指令不能为空")]
    EmptyInstruction,

    /// 指令过短
    #[error("指令过短: 至少需要 {min} 个字符, 实际 {actual} 个")]
    InstructionTooShort { min: usize, actual: usize },

    /// question_state 与 conversation_id 都未提供
    #[error("必须提供 question_state 或 conversation_id 之一")]
    MissingQuestionSource,

    /// question_state 与 conversation_id 同时提供
    #[error("question_state 与 conversation_id 不能同时提供")]
    AmbiguousQuestionSource,

    /// 题干为空
    #[error("题干不能为空")]
    EmptyQuestionText,

    /// 选择题选项不足
    #[error("选择题至少需要 2 个选项, 实际 {count} 个")]
    TooFewOptions { count: usize },

    /// 选项标签为空
    #[error("第 {index} 个选项的标签为空")]
    EmptyOptionLabel { index: usize },

    /// 选项标签重复
    #[error("选项标签重复: {label}")]
    DuplicateOptionLabel { label: String },

    /// 正确选项数量不为 1
    #[error("选择题必须恰好有 1 个正确选项, 实际 {count} 个")]
    CorrectOptionCount { count: usize },

    /// correct_answer 与正确选项标签不一致
    #[error("correct_answer '{correct_answer}' 与正确选项标签 '{label}' 不一致")]
    CorrectAnswerMismatch {
        correct_answer: String,
        label: String,
    },

    /// 开放题不应有选项
    #[error("开放题不应包含选项, 实际 {count} 个")]
    UnexpectedOptions { count: usize },
}

/// 解释器（LLM）错误
#[derive(Debug, Error)]
pub enum GenerationError {
    /// 调用超时
    #[error("解释器调用超时 ({after:?})")]
    Timeout { after: Duration },

    /// 返回结构无法通过题目结构校验
    #[error("LLM 返回结构不合法: {reason}")]
    Schema {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// 传输或服务方错误
    #[error("LLM 调用失败 (模型: {model}): {message}")]
    Upstream {
        model: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },

    /// 配置值不合法
    #[error("配置项 {name} 不合法: {reason}")]
    InvalidValue { name: String, reason: String },
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// 不支持的文件格式
    #[error("不支持的文件格式: {path}")]
    UnsupportedFormat { path: String },

    /// 文件内容解析失败
    #[error("解析文件失败 ({path}): {source}")]
    ParseFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建会话不存在错误
    pub fn not_found(conversation_id: ConversationId) -> Self {
        AppError::NotFound { conversation_id }
    }

    /// 调用方是否可以原样重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Generation(_) | AppError::Conflict { .. })
    }
}

impl GenerationError {
    /// 创建结构校验错误
    pub fn schema(reason: impl Into<String>) -> Self {
        GenerationError::Schema {
            reason: reason.into(),
            source: None,
        }
    }

    /// 创建带来源的结构校验错误
    pub fn schema_with_source(
        reason: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        GenerationError::Schema {
            reason: reason.into(),
            source: Some(Box::new(source)),
        }
    }

    /// 创建上游调用错误
    pub fn upstream(model: impl Into<String>, message: impl Into<String>) -> Self {
        GenerationError::Upstream {
            model: model.into(),
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的上游调用错误
    pub fn upstream_with_source(
        model: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        GenerationError::Upstream {
            model: model.into(),
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
