//! 修改指令解释器 - 业务能力层
//!
//! 输入（当前快照, 自然语言指令, 最近几轮上下文），输出新快照 + 修改说明。
//! `Interpreter` 是编排层唯一依赖的抽象，测试中用假实现替换。

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use crate::error::GenerationError;
use crate::models::{
    Difficulty, HistoryTurn, McqOption, QuestionSnapshot, QuestionState, QuestionType,
};
use crate::services::llm_service::{ChatMessage, LlmService};

/// 解释结果
#[derive(Debug, Clone, PartialEq)]
pub struct Interpretation {
    pub snapshot: QuestionSnapshot,
    /// 修改说明
    pub summary: String,
    /// 置信度（0.0 ~ 1.0）
    pub confidence_score: f64,
}

/// 解释器能力
#[async_trait]
pub trait Interpreter: Send + Sync {
    async fn interpret(
        &self,
        current: &QuestionSnapshot,
        instruction: &str,
        history: &[HistoryTurn],
    ) -> Result<Interpretation, GenerationError>;
}

/// 对话后端，`LlmService` 是默认实现
#[async_trait]
pub trait ChatBackend: Send + Sync {
    fn model_name(&self) -> &str;

    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, GenerationError>;
}

#[async_trait]
impl ChatBackend for LlmService {
    fn model_name(&self) -> &str {
        LlmService::model_name(self)
    }

    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, GenerationError> {
        LlmService::chat(self, messages).await
    }
}

const REFINEMENT_SYSTEM_PROMPT: &str = r#"You are an expert question editor helping to refine educational assessment questions.

You will receive:
1. The current state of a question
2. A natural language instruction for how to modify it

Apply the requested changes while:
1. Maintaining question quality and clarity
2. Ensuring the question remains valid and answerable
3. Updating the explanation to match any changes
4. Keeping the same format unless instructed otherwise

Common refinement requests include:
- Changing the correct answer
- Making distractors more/less confusing
- Adjusting difficulty
- Changing numerical values
- Modifying wording for clarity

Respond with a single JSON object and nothing else, using exactly these fields:
{
  "question_text": string,
  "question_type": "mcq" | "open_ended",
  "difficulty": "easy" | "medium" | "hard" | "mixed",
  "topic": string or null,
  "explanation": string,
  "options": [{"label": string, "text": string, "is_correct": boolean}] or null,
  "correct_answer": string,
  "changes_made": string,
  "confidence_score": number between 0.0 and 1.0
}

For MCQ questions exactly one option must have "is_correct": true and "correct_answer" must be that option's label.
For open-ended questions "options" must be null and "correct_answer" is a model answer.
Always describe what changes you made in the "changes_made" field."#;

/// LLM 返回的结构
#[derive(Debug, Deserialize)]
struct RefinedQuestion {
    question_text: String,
    question_type: QuestionType,
    difficulty: Difficulty,
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    explanation: String,
    #[serde(default)]
    options: Option<Vec<McqOption>>,
    correct_answer: String,
    changes_made: String,
    confidence_score: f64,
}

/// 基于 LLM 的解释器
pub struct LlmInterpreter<B = LlmService> {
    backend: B,
}

impl<B: ChatBackend> LlmInterpreter<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl<B: ChatBackend> Interpreter for LlmInterpreter<B> {
    async fn interpret(
        &self,
        current: &QuestionSnapshot,
        instruction: &str,
        history: &[HistoryTurn],
    ) -> Result<Interpretation, GenerationError> {
        let messages = build_messages(current, instruction, history);
        debug!(
            "解释指令，模型: {}，上下文轮数: {}",
            self.backend.model_name(),
            history.len()
        );

        let response = self.backend.chat(&messages).await?;
        parse_interpretation(&response, current)
    }
}

/// 组装提示词：系统消息 → 历史（指令 / 修改说明交替）→ 本轮请求
fn build_messages(
    current: &QuestionSnapshot,
    instruction: &str,
    history: &[HistoryTurn],
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() * 2 + 2);
    messages.push(ChatMessage::system(REFINEMENT_SYSTEM_PROMPT));

    for turn in history {
        messages.push(ChatMessage::user(turn.instruction.clone()));
        messages.push(ChatMessage::assistant(format!("Changes: {}", turn.summary)));
    }

    messages.push(ChatMessage::user(format!(
        "Current question state:\n\n{}\n\n=== REFINEMENT INSTRUCTION ===\n{}\n\nApply the requested changes and provide the updated question.",
        current.render_for_prompt(),
        instruction
    )));

    messages
}

/// 取出 JSON 文本：本身是 JSON 时原样返回，整体被代码块包裹时去掉围栏
fn extract_json(response: &str) -> &str {
    static FENCE: OnceLock<Regex> = OnceLock::new();

    let trimmed = response.trim();
    if serde_json::from_str::<serde_json::Value>(trimmed).is_ok() {
        return trimmed;
    }

    if trimmed.starts_with("```") {
        let fence = FENCE.get_or_init(|| {
            Regex::new(r"(?is)^```(?:json)?\s*(.*)\s*```$").expect("fence regex is valid")
        });
        if let Some(inner) = fence.captures(trimmed).and_then(|c| c.get(1)) {
            return inner.as_str().trim();
        }
    }

    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => trimmed,
    }
}

/// 解析并校验 LLM 返回
fn parse_interpretation(
    response: &str,
    current: &QuestionSnapshot,
) -> Result<Interpretation, GenerationError> {
    let json = extract_json(response);
    let refined: RefinedQuestion = serde_json::from_str(json)
        .map_err(|e| GenerationError::schema_with_source("无法解析 LLM 返回的 JSON", e))?;

    if !(0.0..=1.0).contains(&refined.confidence_score) {
        return Err(GenerationError::schema(format!(
            "confidence_score {} 不在 [0, 1] 范围内",
            refined.confidence_score
        )));
    }

    let summary = refined.changes_made.trim().to_string();
    if summary.is_empty() {
        return Err(GenerationError::schema("changes_made 为空"));
    }

    // 未返回主题时沿用当前主题
    let topic = refined
        .topic
        .filter(|t| !t.trim().is_empty())
        .or_else(|| current.topic().map(str::to_string));

    let state = QuestionState {
        question_text: refined.question_text,
        question_type: refined.question_type,
        difficulty: refined.difficulty,
        topic,
        options: refined.options,
        correct_answer: refined.correct_answer,
        explanation: refined.explanation,
    };

    let snapshot = QuestionSnapshot::try_from(state)
        .map_err(|e| GenerationError::schema_with_source("返回的题目未通过校验", e))?;

    Ok(Interpretation {
        snapshot,
        summary,
        confidence_score: refined.confidence_score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn france() -> QuestionSnapshot {
        QuestionSnapshot::mcq(
            "What is the capital of France?",
            Difficulty::Medium,
            vec![
                McqOption::new("A", "Paris", true),
                McqOption::new("B", "London", false),
            ],
            "A",
            "Paris is the capital.",
        )
        .unwrap()
        .with_topic("Geography")
    }

    const HARDER: &str = r#"{
        "question_text": "Which city has been the capital of France since 987?",
        "question_type": "mcq",
        "difficulty": "hard",
        "topic": null,
        "explanation": "Paris became the capital under Hugh Capet.",
        "options": [
            {"label": "A", "text": "Paris", "is_correct": true},
            {"label": "B", "text": "Lyon", "is_correct": false}
        ],
        "correct_answer": "A",
        "changes_made": "Raised difficulty and replaced a distractor.",
        "confidence_score": 0.85
    }"#;

    /// 返回固定文本并记录收到的消息
    struct CannedBackend {
        reply: Result<String, String>,
        seen: Mutex<Vec<ChatMessage>>,
    }

    impl CannedBackend {
        fn ok(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatBackend for CannedBackend {
        fn model_name(&self) -> &str {
            "canned"
        }

        async fn chat(&self, messages: &[ChatMessage]) -> Result<String, GenerationError> {
            self.seen.lock().unwrap().extend_from_slice(messages);
            self.reply
                .clone()
                .map_err(|msg| GenerationError::upstream("canned", msg))
        }
    }

    #[test]
    fn test_build_messages_interleaves_history() {
        let history = vec![
            HistoryTurn {
                instruction: "make it harder".to_string(),
                summary: "raised difficulty".to_string(),
            },
            HistoryTurn {
                instruction: "shorten stem".to_string(),
                summary: "removed filler".to_string(),
            },
        ];
        let messages = build_messages(&france(), "change answer to B", &history);

        assert_eq!(messages.len(), 6);
        assert_eq!(messages[0].role, crate::services::llm_service::ChatRole::System);
        assert_eq!(messages[1], ChatMessage::user("make it harder"));
        assert_eq!(messages[2], ChatMessage::assistant("Changes: raised difficulty"));
        assert_eq!(messages[4], ChatMessage::assistant("Changes: removed filler"));

        let last = &messages[5].content;
        assert!(last.starts_with("Current question state:"));
        assert!(last.contains("A. Paris (correct)"));
        assert!(last.contains("=== REFINEMENT INSTRUCTION ===\nchange answer to B"));
    }

    #[test]
    fn test_extract_json_from_fenced_block() {
        let text = "Here you go:\n```json\n{\"a\": 1}\n```\nDone.";
        assert_eq!(extract_json(text), "{\"a\": 1}");

        let bare = "Sure! {\"a\": 2} hope that helps";
        assert_eq!(extract_json(bare), "{\"a\": 2}");
    }

    #[test]
    fn test_extract_json_uppercase_fence() {
        let text = "```JSON\n{\"a\": 1}\n```";
        assert_eq!(extract_json(text), "{\"a\": 1}");
    }

    #[test]
    fn test_extract_json_keeps_fences_inside_strings() {
        let raw = r#"{"explanation": "Run:\n```python\nprint(1)\n```\nthen check."}"#;
        assert_eq!(extract_json(raw), raw);

        let fenced = format!("```json\n{}\n```", raw);
        assert_eq!(extract_json(&fenced), raw);
    }

    #[test]
    fn test_parse_code_sample_in_explanation() {
        let reply = HARDER.replace(
            "Paris became the capital under Hugh Capet.",
            "Check with:\\n```python\\nprint('Paris')\\n```",
        );
        let result = parse_interpretation(&reply, &france()).unwrap();
        assert!(result.snapshot.explanation().contains("```python"));

        let fenced = format!("```JSON\n{}\n```", reply);
        let result = parse_interpretation(&fenced, &france()).unwrap();
        assert_eq!(result.snapshot.difficulty(), Difficulty::Hard);
    }

    #[test]
    fn test_parse_keeps_topic_when_missing() {
        let result = parse_interpretation(HARDER, &france()).unwrap();
        assert_eq!(result.snapshot.difficulty(), Difficulty::Hard);
        assert_eq!(result.snapshot.topic(), Some("Geography"));
        assert_eq!(result.snapshot.correct_answer(), "A");
        assert_eq!(result.summary, "Raised difficulty and replaced a distractor.");
        assert!((result.confidence_score - 0.85).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_rejects_invalid_snapshot() {
        let bad = HARDER.replace("\"correct_answer\": \"A\"", "\"correct_answer\": \"B\"");
        let err = parse_interpretation(&bad, &france()).unwrap_err();
        assert!(matches!(err, GenerationError::Schema { .. }));
    }

    #[test]
    fn test_parse_rejects_out_of_range_confidence() {
        let bad = HARDER.replace("0.85", "1.7");
        let err = parse_interpretation(&bad, &france()).unwrap_err();
        assert!(matches!(err, GenerationError::Schema { .. }));
    }

    #[test]
    fn test_parse_rejects_non_json() {
        let err = parse_interpretation("I could not do that.", &france()).unwrap_err();
        assert!(matches!(err, GenerationError::Schema { .. }));
    }

    #[tokio::test]
    async fn test_llm_interpreter_uses_backend() {
        let backend = CannedBackend::ok(&format!("```json\n{}\n```", HARDER));
        let interpreter = LlmInterpreter::new(backend);

        let result = interpreter
            .interpret(&france(), "increase difficulty to hard", &[])
            .await
            .unwrap();
        assert_eq!(result.snapshot.difficulty(), Difficulty::Hard);

        let seen = interpreter.backend.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
    }

    #[tokio::test]
    async fn test_llm_interpreter_propagates_upstream_error() {
        let backend = CannedBackend {
            reply: Err("rate limited".to_string()),
            seen: Mutex::new(Vec::new()),
        };
        let interpreter = LlmInterpreter::new(backend);

        let err = interpreter
            .interpret(&france(), "increase difficulty", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Upstream { .. }));
    }
}
