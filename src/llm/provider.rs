use async_trait::async_trait;

use crate::errors::BoxLensResult;
use crate::llm::types::{CallConfig, VisionRequest};

/// A hosted vision-language model. Implementations only need to turn a prompt
/// plus image into the model's reply text; what the text means is decided later.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Returns the provider's identifier (matches the config.toml key).
    fn name(&self) -> &str;

    async fn generate(&self, request: &VisionRequest, cfg: &CallConfig) -> BoxLensResult<String>;
}
