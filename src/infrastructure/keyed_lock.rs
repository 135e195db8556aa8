//! 按会话加锁
//!
//! 同一会话同一时刻只允许一个修改在进行，不同会话互不影响。

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{ready, Context, Poll};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::models::ConversationId;

/// 会话锁表
#[derive(Default, Debug)]
pub struct ConversationLocks {
    locks: Mutex<HashMap<ConversationId, Arc<AsyncMutex<()>>>>,
}

/// 持有期间独占该会话；释放时顺带清理无人使用的锁
#[derive(Debug)]
pub struct ConversationGuard<'a> {
    id: ConversationId,
    owner: &'a ConversationLocks,
    guard: Option<OwnedMutexGuard<()>>,
}

impl ConversationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取会话锁，必要时等待
    pub async fn lock(&self, id: ConversationId) -> ConversationGuard<'_> {
        let mutex = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks
                .entry(id)
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };

        let guard = PendingLock {
            id,
            owner: self,
            acquire: Some(Box::pin(mutex.lock_owned())),
        }
        .await;
        ConversationGuard {
            id,
            owner: self,
            guard: Some(guard),
        }
    }

    /// 当前登记的锁数量
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 只剩表里这一份引用时说明没有持有者和等待者，移除该锁
    fn release(&self, id: ConversationId) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(mutex) = locks.get(&id) {
            if Arc::strong_count(mutex) == 1 {
                locks.remove(&id);
            }
        }
    }
}

type Acquire = Pin<Box<dyn Future<Output = OwnedMutexGuard<()>> + Send>>;

/// 等待中的加锁；未拿到锁就被丢弃时同样清理
struct PendingLock<'a> {
    id: ConversationId,
    owner: &'a ConversationLocks,
    acquire: Option<Acquire>,
}

impl Future for PendingLock<'_> {
    type Output = OwnedMutexGuard<()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let Some(acquire) = this.acquire.as_mut() else {
            return Poll::Pending;
        };
        let guard = ready!(acquire.as_mut().poll(cx));
        this.acquire = None;
        Poll::Ready(guard)
    }
}

impl Drop for PendingLock<'_> {
    fn drop(&mut self) {
        if self.acquire.take().is_some() {
            self.owner.release(self.id);
        }
    }
}

impl Drop for ConversationGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.owner.release(self.id);
    }
}
