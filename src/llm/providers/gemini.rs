use std::time::Duration;

use async_trait::async_trait;

use crate::errors::{BoxLensError, BoxLensResult};
use crate::llm::provider::VisionModel;
use crate::llm::types::{
    CallConfig, GeminiContent, GeminiPart, GeminiRequest, GeminiResponse, GenerationConfig,
    InlineData, VisionRequest,
};

/// Google Gemini `generateContent` adapter.
pub struct GeminiProvider {
    id: String,
    api_base: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiProvider {
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

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.api_base.trim_end_matches('/'), model)
    }
}

pub fn build_request(request: &VisionRequest, cfg: &CallConfig) -> GeminiRequest {
    GeminiRequest {
        contents: vec![GeminiContent {
            role: Some("user".to_string()),
            parts: vec![
                GeminiPart::Text {
                    text: request.prompt.clone(),
                },
                GeminiPart::InlineData {
                    inline_data: InlineData {
                        mime_type: request.image.mime_type.clone(),
                        data: request.image.to_base64(),
                    },
                },
            ],
        }],
        generation_config: Some(GenerationConfig {
            temperature: cfg.temperature,
        }),
    }
}

/// Concatenate the text parts of the first candidate.
pub fn response_text(response: &GeminiResponse) -> BoxLensResult<String> {
    let Some(candidate) = response.candidates.first() else {
        let reason = response
            .prompt_feedback
            .as_ref()
            .map(|f| f.to_string())
            .unwrap_or_else(|| "no candidates returned".to_string());
        return Err(BoxLensError::LlmProvider(format!("empty response: {reason}")));
    };

    let text: String = candidate
        .content
        .iter()
        .flat_map(|c| c.parts.iter())
        .filter_map(|p| match p {
            GeminiPart::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect();

    if text.is_empty() {
        tracing::warn!(finish_reason = ?candidate.finish_reason, "candidate carried no text");
    }
    Ok(text)
}

#[async_trait]
impl VisionModel for GeminiProvider {
    fn name(&self) -> &str {
        &self.id
    }

    async fn generate(&self, request: &VisionRequest, cfg: &CallConfig) -> BoxLensResult<String> {
        if self.api_key.is_empty() {
            return Err(BoxLensError::Config(format!(
                "no API key for provider '{}'; pass --api-key or set GEMINI_API_KEY",
                self.id
            )));
        }

        let body = build_request(request, cfg);
        tracing::debug!(
            provider = %self.id,
            model = %cfg.model,
            image_bytes = request.image.bytes.len(),
            "sending Gemini request"
        );

        let response = self
            .client
            .post(self.endpoint(&cfg.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let err_body = response.text().await.unwrap_or_default();
            return Err(BoxLensError::LlmProvider(format!("{}: {}", status, err_body)));
        }

        let parsed: GeminiResponse = response.json().await?;
        let text = response_text(&parsed)?;
        tracing::info!(content_len = text.len(), "Gemini response received");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::EncodedImage;

    fn request() -> VisionRequest {
        VisionRequest {
            prompt: "find cats".to_string(),
            image: EncodedImage::png(vec![0xff, 0x00]),
        }
    }

    #[test]
    fn request_body_has_prompt_then_inline_image() {
        let cfg = CallConfig { model: "gemini-1.5-pro".to_string(), temperature: 0.2 };
        let v = serde_json::to_value(build_request(&request(), &cfg)).unwrap();
        let parts = &v["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], "find cats");
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/png");
        assert_eq!(parts[1]["inline_data"]["data"], "/wA=");
        assert_eq!(v["generationConfig"]["temperature"], 0.2);
    }

    #[test]
    fn endpoint_joins_base_and_model() {
        let p = GeminiProvider::new(
            "gemini".into(),
            "https://example.test/v1beta/".into(),
            "k".into(),
            Duration::from_secs(5),
        );
        assert_eq!(p.endpoint("m-1"), "https://example.test/v1beta/models/m-1:generateContent");
    }

    #[test]
    fn text_parts_are_concatenated() {
        let resp: GeminiResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"{\"cat\": "},{"text":"[1, 2, 3, 4]}"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(response_text(&resp).unwrap(), r#"{"cat": [1, 2, 3, 4]}"#);
    }

    #[test]
    fn blocked_prompt_is_an_error() {
        let resp: GeminiResponse =
            serde_json::from_str(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap();
        let err = response_text(&resp).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[tokio::test]
    async fn missing_key_fails_before_sending() {
        let p = GeminiProvider::new(
            "gemini".into(),
            "http://127.0.0.1:9".into(),
            String::new(),
            Duration::from_secs(1),
        );
        let cfg = CallConfig { model: "m".to_string(), temperature: 0.1 };
        let err = p.generate(&request(), &cfg).await.unwrap_err();
        assert!(matches!(err, BoxLensError::Config(_)));
    }
}
