//! 修改处理上下文
//!
//! 封装"我正在处理哪个会话的第几轮"这一信息，主要用于日志

use std::fmt::Display;

use crate::models::ConversationId;

/// 修改处理上下文
#[derive(Debug, Clone)]
pub struct RefinementCtx {
    /// 会话标识（新会话在提交前为空）
    pub conversation_id: Option<ConversationId>,

    /// 本轮序号（从1开始）
    pub turn: u64,
}

impl RefinementCtx {
    /// 新会话的第一轮
    pub fn new_conversation() -> Self {
        Self {
            conversation_id: None,
            turn: 1,
        }
    }

    /// 已有会话的某一轮
    pub fn existing(conversation_id: ConversationId, turn: u64) -> Self {
        Self {
            conversation_id: Some(conversation_id),
            turn,
        }
    }
}

impl Display for RefinementCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.conversation_id {
            Some(id) => write!(f, "[会话 {} 轮次#{}]", id, self.turn),
            None => write!(f, "[新会话 轮次#{}]", self.turn),
        }
    }
}
