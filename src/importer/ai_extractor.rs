// ==========================================
// 表格数据导入引擎 - AI 文本抽取（可选兜底）
// ==========================================
// 职责: 自由文本 → 目标字段记录（调用外部文本生成模型）
// 约束: 任何失败都不上抛，统一折叠为 ExtractionOutcome
// ==========================================

use crate::config::ImportConfigReader;
use crate::domain::record::{FieldValue, Record};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// generateContent 接口根地址
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

// ==========================================
// 文本生成客户端
// ==========================================

/// 文本生成客户端错误
#[derive(Debug, thiserror::Error)]
pub enum AiClientError {
    /// 网络层失败（DNS / TLS / 连接等）
    #[error("HTTP 请求失败: {0}")]
    Request(#[from] reqwest::Error),

    /// 服务端返回非 2xx
    #[error("模型接口错误 ({status}): {body}")]
    Api { status: u16, body: String },

    /// 响应中没有可用文本
    #[error("模型未返回文本")]
    EmptyResponse,
}

/// 外部文本生成能力（prompt → 文本）
#[async_trait]
pub trait TextGenerationClient: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, AiClientError>;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

/// Gemini generateContent 客户端
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            base_url: GEMINI_BASE_URL.to_string(),
        }
    }

    /// 指定接口根地址（用于代理或私有部署）
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl TextGenerationClient for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, AiClientError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiClientError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response.json().await?;
        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(AiClientError::EmptyResponse);
        }
        Ok(text)
    }
}

// ==========================================
// 抽取结果
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionOutcome {
    /// 成功抽取（可能为空数组）
    Extracted(Vec<Record>),
    /// 未配置凭据，调用方应回退到按列导入
    NotConfigured,
    /// 调用或解析失败（含超时）
    Failed(String),
}

impl ExtractionOutcome {
    /// 折叠为记录列表；未配置/失败均为空
    pub fn into_records(self) -> Vec<Record> {
        match self {
            ExtractionOutcome::Extracted(records) => records,
            ExtractionOutcome::NotConfigured | ExtractionOutcome::Failed(_) => Vec::new(),
        }
    }
}

// ==========================================
// AiExtractor
// ==========================================
pub struct AiExtractor {
    client: Option<Arc<dyn TextGenerationClient>>,
    max_input_chars: usize,
    timeout: Duration,
}

impl AiExtractor {
    /// # 参数
    /// - client: 文本生成客户端；None 表示未配置
    /// - max_input_chars: 输入截断长度（字符）
    /// - timeout: 单次调用超时
    pub fn new(
        client: Option<Arc<dyn TextGenerationClient>>,
        max_input_chars: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            max_input_chars,
            timeout,
        }
    }

    /// 按配置构造（有凭据时使用 Gemini 客户端）
    pub async fn from_config(config: &dyn ImportConfigReader) -> Self {
        let max_input_chars = config
            .get_ai_max_input_chars()
            .await
            .unwrap_or(crate::config::defaults::AI_MAX_INPUT_CHARS);
        let timeout_secs = config
            .get_ai_timeout_secs()
            .await
            .unwrap_or(crate::config::defaults::AI_TIMEOUT_SECS);
        let model = config
            .get_ai_model()
            .await
            .unwrap_or_else(|_| crate::config::defaults::AI_MODEL.to_string());

        let client: Option<Arc<dyn TextGenerationClient>> = match config.get_ai_api_key().await {
            Ok(Some(key)) => Some(Arc::new(GeminiClient::new(key, model))),
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "读取 AI 凭据失败，视为未配置");
                None
            }
        };

        Self::new(client, max_input_chars, Duration::from_secs(timeout_secs))
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    fn build_prompt(&self, text: &str, target_fields: &[String]) -> String {
        let truncated: String = text.chars().take(self.max_input_chars).collect();
        format!(
            "I have the following raw data (CSV or text).\n\
             Please extract it into a JSON array of objects with the following keys: {}.\n\
             Only return the valid JSON array, no markdown.\n\n\
             Data:\n{}",
            target_fields.join(", "),
            truncated
        )
    }

    /// 从自由文本抽取记录
    ///
    /// # 返回
    /// - NotConfigured: 未配置凭据（不发起调用）
    /// - Failed: 调用失败 / 超时 / 返回内容不是 JSON 数组
    #[instrument(skip(self, text, target_fields), fields(text_len = text.len(), field_count = target_fields.len()))]
    pub async fn extract(&self, text: &str, target_fields: &[String]) -> ExtractionOutcome {
        let client = match &self.client {
            Some(client) => client,
            None => {
                warn!("AI 抽取未配置凭据，回退到按列导入");
                return ExtractionOutcome::NotConfigured;
            }
        };

        let prompt = self.build_prompt(text, target_fields);
        debug!(prompt_len = prompt.len(), "调用文本生成模型");

        let raw = match tokio::time::timeout(self.timeout, client.generate(&prompt)).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                error!(error = %e, "AI 抽取失败");
                return ExtractionOutcome::Failed(e.to_string());
            }
            Err(_) => {
                error!(timeout_secs = self.timeout.as_secs(), "AI 抽取超时");
                return ExtractionOutcome::Failed("AI 抽取超时".to_string());
            }
        };

        match parse_extracted(&raw) {
            Ok(records) => {
                info!(count = records.len(), "AI 抽取完成");
                ExtractionOutcome::Extracted(records)
            }
            Err(message) => {
                error!(error = %message, "AI 返回内容无法解析");
                ExtractionOutcome::Failed(message)
            }
        }
    }
}

/// 去掉 markdown 代码围栏
fn strip_code_fences(raw: &str) -> String {
    raw.replace("```json", "").replace("```", "").trim().to_string()
}

fn json_to_field_value(value: serde_json::Value) -> FieldValue {
    match value {
        serde_json::Value::Null => FieldValue::Empty,
        serde_json::Value::Bool(b) => FieldValue::Bool(b),
        serde_json::Value::Number(n) => n
            .as_f64()
            .map(FieldValue::Number)
            .unwrap_or_else(|| FieldValue::Text(n.to_string())),
        serde_json::Value::String(s) => FieldValue::Text(s),
        other => FieldValue::Text(other.to_string()),
    }
}

/// 解析模型输出: 必须是 JSON 数组；非对象元素跳过
fn parse_extracted(raw: &str) -> Result<Vec<Record>, String> {
    let cleaned = strip_code_fences(raw);
    let value: serde_json::Value =
        serde_json::from_str(&cleaned).map_err(|e| format!("JSON 解析失败: {}", e))?;

    let items = match value {
        serde_json::Value::Array(items) => items,
        _ => return Err("返回内容不是 JSON 数组".to_string()),
    };

    let mut records = Vec::with_capacity(items.len());
    for item in items {
        match item {
            serde_json::Value::Object(map) => records.push(
                map.into_iter()
                    .map(|(k, v)| (k, json_to_field_value(v)))
                    .collect(),
            ),
            other => warn!(item = %other, "跳过非对象元素"),
        }
    }
    Ok(records)
}
