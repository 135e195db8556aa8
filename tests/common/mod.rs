#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use question_canvas::{
    CanvasApp, Config, Difficulty, GenerationError, HistoryTurn, InMemoryConversationStore,
    Interpretation, Interpreter, McqOption, QuestionSnapshot,
};

/// 解释器收到的一次调用
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub current: QuestionSnapshot,
    pub instruction: String,
    pub history: Vec<HistoryTurn>,
}

/// 按顺序返回预设结果的解释器
#[derive(Default)]
pub struct ScriptedInterpreter {
    replies: Mutex<VecDeque<Result<Interpretation, GenerationError>>>,
    calls: Mutex<Vec<RecordedCall>>,
    delay: Option<Duration>,
}

impl ScriptedInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 每次调用前先等待一段时间
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_ok(&self, snapshot: QuestionSnapshot, summary: &str) -> &Self {
        self.replies.lock().unwrap().push_back(Ok(Interpretation {
            snapshot,
            summary: summary.to_string(),
            confidence_score: 0.9,
        }));
        self
    }

    pub fn push_err(&self, err: GenerationError) -> &Self {
        self.replies.lock().unwrap().push_back(Err(err));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Interpreter for ScriptedInterpreter {
    async fn interpret(
        &self,
        current: &QuestionSnapshot,
        instruction: &str,
        history: &[HistoryTurn],
    ) -> Result<Interpretation, GenerationError> {
        self.calls.lock().unwrap().push(RecordedCall {
            current: current.clone(),
            instruction: instruction.to_string(),
            history: history.to_vec(),
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GenerationError::upstream("scripted", "no reply queued")))
    }
}

pub fn france_options() -> Vec<McqOption> {
    vec![
        McqOption::new("A", "Paris", true),
        McqOption::new("B", "London", false),
        McqOption::new("C", "Berlin", false),
        McqOption::new("D", "Madrid", false),
    ]
}

pub fn france(difficulty: Difficulty) -> QuestionSnapshot {
    QuestionSnapshot::mcq(
        "What is the capital of France?",
        difficulty,
        france_options(),
        "A",
        "Paris is the capital and largest city of France.",
    )
    .unwrap()
}

pub fn france_with_text(text: &str) -> QuestionSnapshot {
    QuestionSnapshot::mcq(
        text,
        Difficulty::Medium,
        france_options(),
        "A",
        "Paris is the capital and largest city of France.",
    )
    .unwrap()
}

/// 组装使用内存存储与脚本解释器的应用
pub fn app_with(
    interpreter: Arc<ScriptedInterpreter>,
    config: &Config,
) -> (CanvasApp, Arc<InMemoryConversationStore>) {
    let store = Arc::new(InMemoryConversationStore::new());
    let app = CanvasApp::with_components(store.clone(), interpreter, config);
    (app, store)
}
