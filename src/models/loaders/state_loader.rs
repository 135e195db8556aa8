use crate::error::{AppResult, FileError};
use crate::models::question::{QuestionSnapshot, QuestionState};
use std::path::Path;
use tokio::fs;

/// 从 TOML 或 JSON 文件加载题目状态并校验为快照
///
/// 按扩展名选择格式（`.toml` / `.json`）
pub async fn load_question_state(path: &Path) -> AppResult<QuestionSnapshot> {
    let path_display = path.display().to_string();

    let content = fs::read_to_string(path)
        .await
        .map_err(|source| FileError::ReadFailed {
            path: path_display.clone(),
            source,
        })?;

    let state = parse_question_state(&content, path)?;
    tracing::info!("已加载题目状态: {}", path_display);

    Ok(QuestionSnapshot::try_from(state)?)
}

fn parse_question_state(content: &str, path: &Path) -> AppResult<QuestionState> {
    let display = path.display().to_string();
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase());

    let state: QuestionState = match extension.as_deref() {
        Some("toml") => toml::from_str(content).map_err(|e| FileError::ParseFailed {
            path: display,
            source: Box::new(e),
        })?,
        Some("json") => serde_json::from_str(content).map_err(|e| FileError::ParseFailed {
            path: display,
            source: Box::new(e),
        })?,
        _ => return Err(FileError::UnsupportedFormat { path: display }.into()),
    };

    Ok(state)
}
