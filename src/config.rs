use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 提示词中保留的最近修改轮数（更早的直接丢弃）
    pub history_window: usize,
    /// 指令最少字符数
    pub min_instruction_chars: usize,
    /// 解释器调用超时（秒）
    pub interpreter_timeout_secs: u64,
    /// 内存中最多保留的会话数（0 表示不限制）
    pub max_conversations: usize,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    pub llm_temperature: f32,
    pub llm_max_tokens: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            history_window: 10,
            min_instruction_chars: 5,
            interpreter_timeout_secs: 300,
            max_conversations: 1000,
            verbose_logging: false,
            llm_api_key: String::new(),
            llm_api_base_url: "https://openrouter.ai/api/v1".to_string(),
            llm_model_name: "google/gemini-3-pro-preview".to_string(),
            llm_temperature: 0.5,
            llm_max_tokens: 16384,
        }
    }
}

impl Config {
    /// 从环境变量加载配置，未设置的项使用默认值
    pub fn from_env() -> Result<Self, ConfigError> {
        let default = Self::default();
        let config = Self {
            history_window: env_parse("HISTORY_WINDOW", "usize", default.history_window)?,
            min_instruction_chars: env_parse(
                "MIN_INSTRUCTION_CHARS",
                "usize",
                default.min_instruction_chars,
            )?,
            interpreter_timeout_secs: env_parse(
                "INTERPRETER_TIMEOUT_SECS",
                "u64",
                default.interpreter_timeout_secs,
            )?,
            max_conversations: env_parse("MAX_CONVERSATIONS", "usize", default.max_conversations)?,
            verbose_logging: env_parse("VERBOSE_LOGGING", "bool", default.verbose_logging)?,
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or(default.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(default.llm_api_base_url),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(default.llm_model_name),
            llm_temperature: env_parse("LLM_TEMPERATURE", "f32", default.llm_temperature)?,
            llm_max_tokens: env_parse("LLM_MAX_TOKENS", "u32", default.llm_max_tokens)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// 检查取值范围
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interpreter_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                name: "interpreter_timeout_secs".to_string(),
                reason: "必须大于 0".to_string(),
            });
        }
        if !(0.0..=2.0).contains(&self.llm_temperature) {
            return Err(ConfigError::InvalidValue {
                name: "llm_temperature".to_string(),
                reason: format!("{} 不在 [0, 2] 范围内", self.llm_temperature),
            });
        }
        Ok(())
    }

    pub fn interpreter_timeout(&self) -> Duration {
        Duration::from_secs(self.interpreter_timeout_secs)
    }

    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }

    pub fn with_min_instruction_chars(mut self, min: usize) -> Self {
        self.min_instruction_chars = min;
        self
    }

    pub fn with_max_conversations(mut self, max: usize) -> Self {
        self.max_conversations = max;
        self
    }
}

fn env_parse<T: FromStr>(var_name: &str, expected_type: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(var_name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value,
                expected_type: expected_type.to_string(),
            }),
        Err(_) => Ok(default),
    }
}
