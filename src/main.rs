use std::path::PathBuf;

use anyhow::{Context, Result};
use question_canvas::models::load_question_state;
use question_canvas::utils::logging;
use question_canvas::{CanvasApp, Config, ConversationId, QuestionSnapshot, QuestionSource};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

const USAGE: &str = "用法: question-canvas <题目文件.toml|.json>";

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::from_env().context("加载配置失败")?;

    // 初始化日志
    logging::init(config.verbose_logging);
    logging::log_startup(&config);

    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .context(USAGE)?;
    let question = load_question_state(&path).await?;
    info!("📄 初始题目: {}", question);

    let app = CanvasApp::initialize(&config);
    run_session(&app, question).await
}

/// 交互式会话：每行一条指令，`:history` 查看历史，`:reset` 重置，`:quit` 退出
async fn run_session(app: &CanvasApp, question: QuestionSnapshot) -> Result<()> {
    let mut conversation: Option<ConversationId> = None;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("输入修改指令（:history 查看历史, :reset 重置, :quit 退出）");

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line {
            ":quit" => break,
            ":history" => match conversation {
                Some(id) => {
                    let history = app.get_conversation_history(id).await?;
                    println!("{}", serde_json::to_string_pretty(&history)?);
                }
                None => println!("尚未开始会话"),
            },
            ":reset" => match conversation {
                Some(id) => {
                    app.reset_conversation(id).await?;
                    println!("会话 {} 已重置", id);
                }
                None => println!("尚未开始会话"),
            },
            instruction => {
                let source = match conversation {
                    Some(id) => QuestionSource::Conversation(id),
                    None => QuestionSource::State(question.clone()),
                };

                match app.start_or_continue_refinement(instruction, source).await {
                    Ok(result) => {
                        conversation = Some(result.conversation_id);
                        println!("\n—— 第 {} 轮 ——", result.history_length);
                        println!("修改说明: {}", result.summary);
                        println!("{}\n", result.snapshot.render_for_prompt());
                    }
                    Err(e) if e.is_retryable() => {
                        warn!("⚠️ 本轮失败，可重试: {}", e);
                    }
                    Err(e) => {
                        error!("❌ {}", e);
                    }
                }
            }
        }
    }

    info!("👋 会话结束");
    Ok(())
}
