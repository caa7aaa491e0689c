use std::env;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::app_config::env::{env_or_default, env_parse};
use crate::error::AppError;

/// 抽象：结构化文本生成方，决策引擎注入此接口
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// 单轮调用，返回 JSON 模式下的原始应答文本
    async fn complete_json(&self, system: &str, user: &str) -> Result<String>;
}

#[derive(Serialize, Deserialize, Debug)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize, Debug)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Serialize, Debug)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
    response_format: ResponseFormat,
}

#[derive(Deserialize, Debug)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize, Debug)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorBody {
    message: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorResponse {
    error: Option<ApiErrorBody>,
}

pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f64,
    timeout: Duration,
}

impl OpenAiClient {
    pub fn new(api_key: String) -> Self {
        OpenAiClient {
            client: Client::new(),
            api_key,
            base_url: env_or_default("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            model: env_or_default("AI_MODEL", "gpt-4o-mini"),
            temperature: env_parse("AI_TEMPERATURE", 0.8f64),
            timeout: Duration::from_secs(env_parse("AI_TIMEOUT_SECS", 20u64)),
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenAiClient {
    async fn complete_json(&self, system: &str, user: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            temperature: self.temperature,
            response_format: ResponseFormat {
                format_type: "json_object".to_string(),
            },
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .timeout(self.timeout)
            .body(serde_json::to_string(&request)?)
            .send()
            .await
            .map_err(|e| AppError::AiApiError(e.to_string()))?;

        let status_code = response.status();
        let response_body = response
            .text()
            .await
            .map_err(|e| AppError::AiApiError(e.to_string()))?;
        debug!("model:{},openai_response: {}", self.model, response_body);

        if status_code == StatusCode::OK {
            let parsed: ChatCompletionResponse = serde_json::from_str(&response_body)?;
            let content = parsed
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .unwrap_or_else(|| "{}".to_string());
            Ok(content)
        } else {
            let message = serde_json::from_str::<ApiErrorResponse>(&response_body)
                .ok()
                .and_then(|e| e.error)
                .and_then(|e| e.message)
                .unwrap_or(response_body);
            Err(AppError::AiApiError(format!("status={} {}", status_code, message)).into())
        }
    }
}

pub fn get_openai_client() -> OpenAiClient {
    let api_key = env::var("OPENAI_API_KEY").expect("OPENAI_API_KEY config is none");
    OpenAiClient::new(api_key)
}
