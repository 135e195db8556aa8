//! 会话存储 - 基础设施层
//!
//! 持有全部会话，只暴露增、查、追加、重置能力。
//! 后端可替换（内存 / 持久化），编排逻辑只依赖 `ConversationStore` trait。

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{AppError, AppResult};
use crate::models::{Conversation, ConversationId, QuestionSnapshot, RefinementEntry};

/// 会话存储能力
///
/// 职责：
/// - 按会话标识保存基础快照和修改记录
/// - `append` 做乐观并发检查：序号必须等于 `len(entries) + 1`
/// - 不调用 LLM，不关心指令内容
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// 新建会话，返回新的标识
    async fn create(&self, base: QuestionSnapshot) -> AppResult<ConversationId>;

    /// 读取会话（副本）
    async fn get(&self, id: ConversationId) -> AppResult<Conversation>;

    /// 追加一条修改记录
    async fn append(&self, id: ConversationId, entry: RefinementEntry) -> AppResult<()>;

    /// 清空修改记录，保留基础快照
    async fn reset(&self, id: ConversationId) -> AppResult<()>;

    /// 当前快照
    async fn current_snapshot(&self, id: ConversationId) -> AppResult<QuestionSnapshot> {
        Ok(self.get(id).await?.current_snapshot().clone())
    }

    async fn contains(&self, id: ConversationId) -> bool;

    /// 会话数量
    async fn len(&self) -> usize;
}

/// 内存会话存储
///
/// 超过容量时淘汰最久未更新的会话；容量为 0 表示不限制。
pub struct InMemoryConversationStore {
    conversations: RwLock<HashMap<ConversationId, Conversation>>,
    max_conversations: usize,
}

impl InMemoryConversationStore {
    /// 创建不限容量的存储
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// 创建指定容量的存储
    pub fn with_capacity(max_conversations: usize) -> Self {
        Self {
            conversations: RwLock::new(HashMap::new()),
            max_conversations,
        }
    }
}

impl Default for InMemoryConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn create(&self, base: QuestionSnapshot) -> AppResult<ConversationId> {
        let mut conversations = self.conversations.write().await;

        if self.max_conversations > 0 {
            while conversations.len() >= self.max_conversations {
                let oldest = conversations
                    .values()
                    .min_by_key(|conv| conv.updated_at)
                    .map(|conv| conv.id);
                match oldest {
                    Some(oldest) => {
                        conversations.remove(&oldest);
                        info!("🧹 会话数达到上限 {}，淘汰会话 {}", self.max_conversations, oldest);
                    }
                    None => break,
                }
            }
        }

        let mut id = ConversationId::new();
        while conversations.contains_key(&id) {
            id = ConversationId::new();
        }

        conversations.insert(id, Conversation::new(id, base));
        debug!("新建会话 {}", id);

        Ok(id)
    }

    async fn get(&self, id: ConversationId) -> AppResult<Conversation> {
        self.conversations
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::not_found(id))
    }

    async fn append(&self, id: ConversationId, entry: RefinementEntry) -> AppResult<()> {
        let mut conversations = self.conversations.write().await;
        let conv = conversations
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(id))?;

        let expected = conv.next_sequence_number();
        if entry.sequence_number != expected {
            return Err(AppError::Conflict {
                conversation_id: id,
                expected,
                actual: entry.sequence_number,
            });
        }

        debug!("会话 {} 追加记录 #{}", id, entry.sequence_number);
        conv.entries.push(entry);
        conv.updated_at = Utc::now();

        Ok(())
    }

    async fn reset(&self, id: ConversationId) -> AppResult<()> {
        let mut conversations = self.conversations.write().await;
        let conv = conversations
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(id))?;

        debug!("会话 {} 重置，清除 {} 条记录", id, conv.entries.len());
        conv.entries.clear();
        conv.updated_at = Utc::now();

        Ok(())
    }

    async fn current_snapshot(&self, id: ConversationId) -> AppResult<QuestionSnapshot> {
        self.conversations
            .read()
            .await
            .get(&id)
            .map(|conv| conv.current_snapshot().clone())
            .ok_or_else(|| AppError::not_found(id))
    }

    async fn contains(&self, id: ConversationId) -> bool {
        self.conversations.read().await.contains_key(&id)
    }

    async fn len(&self) -> usize {
        self.conversations.read().await.len()
    }
}
