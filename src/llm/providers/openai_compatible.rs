use std::time::Duration;

use async_trait::async_trait;

use crate::errors::{BoxLensError, BoxLensResult};
use crate::llm::provider::VisionModel;
use crate::llm::types::{
    CallConfig, ChatMessage, ContentPart, ImageUrl, MessageContent, VisionRequest,
};

pub struct OpenAiCompatibleProvider {
    id: String,
    api_base: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(id: String, api_base: String, api_key: String, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "HTTP client build failed, using defaults");
                reqwest::Client::new()
            });
        Self {
            id,
            api_base,
            api_key,
            client,
        }
    }
}

pub fn build_body(request: &VisionRequest, cfg: &CallConfig) -> serde_json::Value {
    let messages = vec![ChatMessage {
        role: "user".to_string(),
        content: MessageContent::Parts(vec![
            ContentPart::Text {
                text: request.prompt.clone(),
            },
            ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: request.image.to_data_url(),
                },
            },
        ]),
    }];
    serde_json::json!({
        "model": cfg.model,
        "messages": messages,
        "stream": false,
        "temperature": cfg.temperature,
    })
}

/// Copy of `body` with image payloads replaced, for logging.
fn sanitized(body: &serde_json::Value) -> String {
    let mut log_body = body.clone();
    if let Some(msgs) = log_body.get_mut("messages").and_then(|m| m.as_array_mut()) {
        for msg in msgs {
            let Some(parts) = msg.get_mut("content").and_then(|c| c.as_array_mut()) else {
                continue;
            };
            for part in parts {
                if part.get("type").and_then(|t| t.as_str()) == Some("image_url") {
                    if let Some(url) = part.get_mut("image_url").and_then(|u| u.get_mut("url")) {
                        *url = serde_json::Value::String("<omitted_base64_image>".to_string());
                    }
                }
            }
        }
    }
    serde_json::to_string(&log_body).unwrap_or_default()
}

/// Pull `choices[0].message.content` out of a chat-completions reply.
pub fn response_text(json: &serde_json::Value) -> BoxLensResult<String> {
    match &json["choices"][0]["message"]["content"] {
        serde_json::Value::String(s) => Ok(s.clone()),
        // some servers return content as an array of text parts
        serde_json::Value::Array(parts) => Ok(parts
            .iter()
            .filter_map(|p| p["text"].as_str())
            .collect()),
        serde_json::Value::Null => Err(BoxLensError::LlmProvider(format!(
            "response has no message content: {json}"
        ))),
        other => Ok(other.to_string()),
    }
}

#[async_trait]
impl VisionModel for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.id
    }

    async fn generate(&self, request: &VisionRequest, cfg: &CallConfig) -> BoxLensResult<String> {
        let body = build_body(request, cfg);

        tracing::debug!(
            provider = %self.id,
            model = %cfg.model,
            "sending LLM request"
        );
        tracing::debug!(body = %sanitized(&body), "request body (sanitized, base64 omitted)");

        let mut req = self.client.post(&self.api_base).json(&body);
        if !self.api_key.is_empty() {
            req = req.bearer_auth(&self.api_key);
        }
        let response = req.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let err_body = response.text().await.unwrap_or_default();
            return Err(BoxLensError::LlmProvider(format!("{}: {}", status, err_body)));
        }

        let json: serde_json::Value = response.json().await?;
        let content = response_text(&json)?;
        tracing::info!(content_len = content.len(), "LLM JSON response received");
        Ok(content)
    }
}
