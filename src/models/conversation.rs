//! 会话记录
//!
//! 一个会话 = 基础快照 + 按顺序追加的修改记录

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::question::QuestionSnapshot;

/// 会话标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(Uuid);

impl ConversationId {
    /// 生成新的会话标识
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ConversationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

impl From<Uuid> for ConversationId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// 一次修改记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinementEntry {
    /// 用户的自然语言指令
    pub instruction: String,
    /// 修改后的快照
    pub resulting_snapshot: QuestionSnapshot,
    /// 修改说明
    pub summary: String,
    /// 模型对本次修改的置信度（0.0 ~ 1.0）
    pub confidence_score: f64,
    /// 会话内序号，从 1 开始
    pub sequence_number: u64,
    pub created_at: DateTime<Utc>,
}

impl RefinementEntry {
    /// 提示词上下文中使用的精简形式
    pub fn as_turn(&self) -> HistoryTurn {
        HistoryTurn {
            instruction: self.instruction.clone(),
            summary: self.summary.clone(),
        }
    }
}

/// 提示词上下文中的一轮（指令 + 修改说明）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub instruction: String,
    pub summary: String,
}

/// 会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    /// 尚无修改记录（新建或刚重置）
    Empty,
    /// 至少有一条修改记录
    HasHistory,
}

/// 会话
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    /// 修改前的原始快照
    pub base_snapshot: QuestionSnapshot,
    /// 修改记录（只追加）
    pub entries: Vec<RefinementEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(id: ConversationId, base_snapshot: QuestionSnapshot) -> Self {
        let now = Utc::now();
        Self {
            id,
            base_snapshot,
            entries: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// 当前快照：最后一条记录的结果，没有记录时为基础快照
    pub fn current_snapshot(&self) -> &QuestionSnapshot {
        self.entries
            .last()
            .map(|entry| &entry.resulting_snapshot)
            .unwrap_or(&self.base_snapshot)
    }

    /// 下一条记录应使用的序号
    pub fn next_sequence_number(&self) -> u64 {
        self.entries.len() as u64 + 1
    }

    pub fn state(&self) -> ConversationState {
        if self.entries.is_empty() {
            ConversationState::Empty
        } else {
            ConversationState::HasHistory
        }
    }

    /// 最近 `window` 轮的上下文，按时间顺序；更早的直接丢弃
    pub fn recent_turns(&self, window: usize) -> Vec<HistoryTurn> {
        let skip = self.entries.len().saturating_sub(window);
        self.entries
            .iter()
            .skip(skip)
            .map(RefinementEntry::as_turn)
            .collect()
    }
}
