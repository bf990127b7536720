use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// An image ready to be sent to a model.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl EncodedImage {
    pub fn png(bytes: Vec<u8>) -> Self {
        Self {
            mime_type: "image/png".to_string(),
            bytes,
        }
    }

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }
}

#[derive(Debug, Clone)]
pub struct VisionRequest {
    pub prompt: String,
    pub image: EncodedImage,
}

/// Per-call model selection.
#[derive(Debug, Clone)]
pub struct CallConfig {
    pub model: String,
    pub temperature: f64,
}

// ── OpenAI-compatible chat completions ──────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

// ── Gemini generateContent ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiRequest {
    pub contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GeminiPart {
    Text { text: String },
    InlineData { inline_data: InlineData },
    Other(serde_json::Value),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub temperature: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiResponse {
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
    #[serde(rename = "promptFeedback", default)]
    pub prompt_feedback: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiCandidate {
    pub content: Option<GeminiContent>,
    #[serde(rename = "finishReason", default)]
    pub finish_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_url_carries_mime_and_base64() {
        let img = EncodedImage::png(vec![1, 2, 3]);
        assert_eq!(img.to_data_url(), "data:image/png;base64,AQID");
    }

    #[test]
    fn content_parts_serialise_with_type_tags() {
        let msg = ChatMessage {
            role: "user".to_string(),
            content: MessageContent::Parts(vec![
                ContentPart::Text { text: "hi".to_string() },
                ContentPart::ImageUrl {
                    image_url: ImageUrl { url: "data:x".to_string() },
                },
            ]),
        };
        let v = serde_json::to_value(&msg).unwrap();
        assert_eq!(v["content"][0]["type"], "text");
        assert_eq!(v["content"][1]["type"], "image_url");
        assert_eq!(v["content"][1]["image_url"]["url"], "data:x");
    }

    #[test]
    fn gemini_parts_deserialise_untagged() {
        let resp: GeminiResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"a"},{"functionCall":{}}]},"finishReason":"STOP"}]}"#,
        )
        .unwrap();
        let parts = &resp.candidates[0].content.as_ref().unwrap().parts;
        assert!(matches!(&parts[0], GeminiPart::Text { text } if text == "a"));
        assert!(matches!(&parts[1], GeminiPart::Other(_)));
    }
}
