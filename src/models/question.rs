//! 题目快照
//!
//! `QuestionSnapshot` 是题目某一版本的完整内容，构造时校验，创建后不可变。
//! 每次修改都会产生新的快照。

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// 题型
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    /// 选择题
    #[default]
    Mcq,
    /// 开放题
    OpenEnded,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Mcq => "mcq",
            QuestionType::OpenEnded => "open_ended",
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 难度
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
    Mixed,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
            Difficulty::Mixed => "mixed",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 选择题选项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McqOption {
    /// 选项标签（A、B、C、D）
    pub label: String,
    /// 选项内容
    pub text: String,
    /// 是否为正确答案
    #[serde(default)]
    pub is_correct: bool,
}

impl McqOption {
    pub fn new(label: impl Into<String>, text: impl Into<String>, is_correct: bool) -> Self {
        Self {
            label: label.into(),
            text: text.into(),
            is_correct,
        }
    }
}

/// 题目状态（传输格式）
///
/// 未经校验的原始结构，来自 JSON/TOML 或 LLM 输出。
/// 通过 `QuestionSnapshot::try_from` 转换为快照。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionState {
    pub question_text: String,
    #[serde(default)]
    pub question_type: QuestionType,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<McqOption>>,
    #[serde(default)]
    pub correct_answer: String,
    #[serde(default)]
    pub explanation: String,
}

/// 题目快照
///
/// 字段私有，只能通过校验后的构造函数创建。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "QuestionState", into = "QuestionState")]
pub struct QuestionSnapshot {
    question_text: String,
    question_type: QuestionType,
    difficulty: Difficulty,
    topic: Option<String>,
    options: Vec<McqOption>,
    correct_answer: String,
    explanation: String,
}

impl QuestionSnapshot {
    /// 创建选择题快照
    pub fn mcq(
        question_text: impl Into<String>,
        difficulty: Difficulty,
        options: Vec<McqOption>,
        correct_answer: impl Into<String>,
        explanation: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        Self::try_from(QuestionState {
            question_text: question_text.into(),
            question_type: QuestionType::Mcq,
            difficulty,
            topic: None,
            options: Some(options),
            correct_answer: correct_answer.into(),
            explanation: explanation.into(),
        })
    }

    /// 创建开放题快照
    pub fn open_ended(
        question_text: impl Into<String>,
        difficulty: Difficulty,
        correct_answer: impl Into<String>,
        explanation: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        Self::try_from(QuestionState {
            question_text: question_text.into(),
            question_type: QuestionType::OpenEnded,
            difficulty,
            topic: None,
            options: None,
            correct_answer: correct_answer.into(),
            explanation: explanation.into(),
        })
    }

    /// 返回带有指定主题的新快照
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn question_text(&self) -> &str {
        &self.question_text
    }

    pub fn question_type(&self) -> QuestionType {
        self.question_type
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    /// 选项列表（开放题为空）
    pub fn options(&self) -> &[McqOption] {
        &self.options
    }

    pub fn correct_answer(&self) -> &str {
        &self.correct_answer
    }

    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    /// 正确选项（仅选择题）
    pub fn correct_option(&self) -> Option<&McqOption> {
        self.options.iter().find(|opt| opt.is_correct)
    }

    /// 生成用于提示词的文本
    pub fn render_for_prompt(&self) -> String {
        let mut lines = vec![
            format!("Question: {}", self.question_text),
            format!("Type: {}", self.question_type),
            format!("Difficulty: {}", self.difficulty),
        ];
        if let Some(topic) = &self.topic {
            lines.push(format!("Topic: {}", topic));
        }

        if !self.options.is_empty() {
            lines.push("\nOptions:".to_string());
            for opt in &self.options {
                let marker = if opt.is_correct { " (correct)" } else { "" };
                lines.push(format!("  {}. {}{}", opt.label, opt.text, marker));
            }
        }

        lines.push(format!("\nCorrect Answer: {}", self.correct_answer));
        lines.push(format!("\nExplanation: {}", self.explanation));

        lines.join("\n")
    }
}

impl TryFrom<QuestionState> for QuestionSnapshot {
    type Error = ValidationError;

    fn try_from(state: QuestionState) -> Result<Self, Self::Error> {
        if state.question_text.trim().is_empty() {
            return Err(ValidationError::EmptyQuestionText);
        }

        let options = state.options.unwrap_or_default();

        match state.question_type {
            QuestionType::Mcq => validate_mcq(&options, &state.correct_answer)?,
            QuestionType::OpenEnded => {
                if !options.is_empty() {
                    return Err(ValidationError::UnexpectedOptions {
                        count: options.len(),
                    });
                }
            }
        }

        Ok(Self {
            question_text: state.question_text,
            question_type: state.question_type,
            difficulty: state.difficulty,
            topic: state.topic,
            options,
            correct_answer: state.correct_answer,
            explanation: state.explanation,
        })
    }
}

impl From<QuestionSnapshot> for QuestionState {
    fn from(snapshot: QuestionSnapshot) -> Self {
        let options = match snapshot.question_type {
            QuestionType::Mcq => Some(snapshot.options),
            QuestionType::OpenEnded => None,
        };
        Self {
            question_text: snapshot.question_text,
            question_type: snapshot.question_type,
            difficulty: snapshot.difficulty,
            topic: snapshot.topic,
            options,
            correct_answer: snapshot.correct_answer,
            explanation: snapshot.explanation,
        }
    }
}

/// 选择题规则：至少 2 个选项、标签唯一、恰好一个正确选项且与 correct_answer 一致
fn validate_mcq(options: &[McqOption], correct_answer: &str) -> Result<(), ValidationError> {
    if options.len() < 2 {
        return Err(ValidationError::TooFewOptions {
            count: options.len(),
        });
    }

    let mut seen = HashSet::new();
    for (index, opt) in options.iter().enumerate() {
        if opt.label.trim().is_empty() {
            return Err(ValidationError::EmptyOptionLabel { index });
        }
        if !seen.insert(opt.label.as_str()) {
            return Err(ValidationError::DuplicateOptionLabel {
                label: opt.label.clone(),
            });
        }
    }

    let correct: Vec<&McqOption> = options.iter().filter(|opt| opt.is_correct).collect();
    if correct.len() != 1 {
        return Err(ValidationError::CorrectOptionCount {
            count: correct.len(),
        });
    }

    let label = &correct[0].label;
    if correct_answer != label {
        return Err(ValidationError::CorrectAnswerMismatch {
            correct_answer: correct_answer.to_string(),
            label: label.clone(),
        });
    }

    Ok(())
}

impl fmt::Display for QuestionSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{} | {}] {}",
            self.question_type,
            self.difficulty,
            crate::utils::logging::truncate_text(&self.question_text, 80)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn france_options() -> Vec<McqOption> {
        vec![
            McqOption::new("A", "Paris", true),
            McqOption::new("B", "London", false),
            McqOption::new("C", "Berlin", false),
            McqOption::new("D", "Madrid", false),
        ]
    }

    #[test]
    fn test_valid_mcq() {
        let snapshot = QuestionSnapshot::mcq(
            "What is the capital of France?",
            Difficulty::Medium,
            france_options(),
            "A",
            "Paris is the capital.",
        )
        .unwrap();

        assert_eq!(snapshot.options().len(), 4);
        assert_eq!(snapshot.correct_option().unwrap().label, "A");
        assert_eq!(snapshot.correct_answer(), "A");
    }

    #[test]
    fn test_mcq_without_correct_option_rejected() {
        let mut options = france_options();
        options[0].is_correct = false;

        let err = QuestionSnapshot::mcq("Q?", Difficulty::Easy, options, "A", "").unwrap_err();
        assert_eq!(err, ValidationError::CorrectOptionCount { count: 0 });
    }

    #[test]
    fn test_mcq_with_two_correct_options_rejected() {
        let mut options = france_options();
        options[1].is_correct = true;

        let err = QuestionSnapshot::mcq("Q?", Difficulty::Easy, options, "A", "").unwrap_err();
        assert_eq!(err, ValidationError::CorrectOptionCount { count: 2 });
    }

    #[test]
    fn test_mcq_answer_must_match_correct_label() {
        let err = QuestionSnapshot::mcq("Q?", Difficulty::Easy, france_options(), "B", "")
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::CorrectAnswerMismatch {
                correct_answer: "B".to_string(),
                label: "A".to_string(),
            }
        );
    }

    #[test]
    fn test_mcq_structure_rules() {
        let one = vec![McqOption::new("A", "Paris", true)];
        assert_eq!(
            QuestionSnapshot::mcq("Q?", Difficulty::Easy, one, "A", "").unwrap_err(),
            ValidationError::TooFewOptions { count: 1 }
        );

        let dup = vec![
            McqOption::new("A", "Paris", true),
            McqOption::new("A", "London", false),
        ];
        assert_eq!(
            QuestionSnapshot::mcq("Q?", Difficulty::Easy, dup, "A", "").unwrap_err(),
            ValidationError::DuplicateOptionLabel {
                label: "A".to_string()
            }
        );

        let blank = vec![
            McqOption::new("A", "Paris", true),
            McqOption::new(" ", "London", false),
        ];
        assert_eq!(
            QuestionSnapshot::mcq("Q?", Difficulty::Easy, blank, "A", "").unwrap_err(),
            ValidationError::EmptyOptionLabel { index: 1 }
        );
    }

    #[test]
    fn test_open_ended_rejects_options() {
        let state = QuestionState {
            question_text: "Explain photosynthesis.".to_string(),
            question_type: QuestionType::OpenEnded,
            difficulty: Difficulty::Hard,
            topic: None,
            options: Some(france_options()),
            correct_answer: "Plants convert light to energy.".to_string(),
            explanation: String::new(),
        };
        assert_eq!(
            QuestionSnapshot::try_from(state).unwrap_err(),
            ValidationError::UnexpectedOptions { count: 4 }
        );

        let ok = QuestionSnapshot::open_ended(
            "Explain photosynthesis.",
            Difficulty::Hard,
            "Plants convert light to energy.",
            "",
        )
        .unwrap();
        assert!(ok.options().is_empty());
    }

    #[test]
    fn test_blank_question_text_rejected() {
        let err = QuestionSnapshot::open_ended("   ", Difficulty::Easy, "x", "").unwrap_err();
        assert_eq!(err, ValidationError::EmptyQuestionText);
    }

    #[test]
    fn test_deserialize_validates() {
        let json = r#"{
            "question_text": "What is 2 + 2?",
            "question_type": "mcq",
            "difficulty": "easy",
            "correct_answer": "A",
            "options": [
                {"label": "A", "text": "4", "is_correct": true},
                {"label": "B", "text": "5", "is_correct": true}
            ]
        }"#;
        let result: Result<QuestionSnapshot, _> = serde_json::from_str(json);
        let err = result.unwrap_err().to_string();
        assert!(err.contains("恰好有 1 个正确选项"), "{}", err);
    }

    #[test]
    fn test_missing_type_and_difficulty_use_defaults() {
        let json = r#"{
            "question_text": "Pick one",
            "correct_answer": "A",
            "options": [
                {"label": "A", "text": "yes", "is_correct": true},
                {"label": "B", "text": "no"}
            ]
        }"#;
        let snapshot: QuestionSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.question_type(), QuestionType::Mcq);
        assert_eq!(snapshot.difficulty(), Difficulty::Medium);
    }

    #[test]
    fn test_serialize_uses_wire_names() {
        let snapshot = QuestionSnapshot::open_ended("Why?", Difficulty::Mixed, "Because.", "")
            .unwrap()
            .with_topic("Logic");
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["question_type"], "open_ended");
        assert_eq!(value["difficulty"], "mixed");
        assert_eq!(value["topic"], "Logic");
        assert!(value.get("options").is_none());
    }

    #[test]
    fn test_render_for_prompt_marks_correct_option() {
        let snapshot = QuestionSnapshot::mcq(
            "What is the capital of France?",
            Difficulty::Medium,
            france_options(),
            "A",
            "Paris is the capital.",
        )
        .unwrap();
        let text = snapshot.render_for_prompt();
        assert!(text.contains("Question: What is the capital of France?"));
        assert!(text.contains("  A. Paris (correct)"));
        assert!(text.contains("  B. London\n"));
        assert!(text.contains("Correct Answer: A"));
    }
}
