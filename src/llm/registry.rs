use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{AppConfig, LlmConfig, ProviderEntry};
use crate::errors::{BoxLensError, BoxLensResult};
use crate::llm::provider::VisionModel;
use crate::llm::providers::gemini::GeminiProvider;
use crate::llm::providers::openai_compatible::OpenAiCompatibleProvider;
use crate::llm::types::CallConfig;

const GEMINI_KEY_VAR: &str = "GEMINI_API_KEY";

/// Registry of all available vision models, keyed by their config.toml identifier.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn VisionModel>>,
    active: String,
    /// Provider entries, for default models and temperatures.
    llm_config: LlmConfig,
}

impl ProviderRegistry {
    pub fn register(&mut self, provider: Arc<dyn VisionModel>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn get(&self, name: &str) -> BoxLensResult<Arc<dyn VisionModel>> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| BoxLensError::Config(format!("Provider '{name}' not registered")))
    }

    /// Resolve provider and call settings. `model` overrides the provider's
    /// default model; models outside the provider's list are allowed with a warning.
    pub fn call_config(
        &self,
        provider: Option<&str>,
        model: Option<&str>,
    ) -> BoxLensResult<(Arc<dyn VisionModel>, CallConfig)> {
        let name = provider.unwrap_or(&self.active);
        let handle = self.get(name)?;
        let entry = self.llm_config.providers.get(name);

        let (default_model, temperature) = entry
            .map(|p| (p.model.clone(), p.temperature))
            .unwrap_or_else(|| (String::new(), 0.1));
        let model = model.map(str::to_string).unwrap_or(default_model);
        if model.is_empty() {
            return Err(BoxLensError::Config(format!("Provider '{name}' has no model configured")));
        }
        if let Some(entry) = entry {
            if !entry.models.is_empty() && !entry.models.contains(&model) && entry.model != model {
                tracing::warn!(provider = name, model = %model, "model not in the provider's model list");
            }
        }

        tracing::debug!(provider = name, model = %model, temperature, "resolved call config");
        Ok((handle, CallConfig { model, temperature }))
    }

    /// Build a registry from the loaded app config.
    ///
    /// `api_key_override` (from `--api-key`) only reaches `selected`, or the
    /// active provider when none is selected. Other providers fall back to
    /// their environment variables and config.toml keys.
    pub fn from_config(
        config: &AppConfig,
        selected: Option<&str>,
        api_key_override: Option<&str>,
    ) -> Self {
        let selected = selected.unwrap_or(&config.llm.active_provider);
        let mut registry = Self {
            providers: HashMap::new(),
            active: config.llm.active_provider.clone(),
            llm_config: config.llm.clone(),
        };
        let timeout = Duration::from_secs(config.llm.request_timeout_secs);
        for (id, entry) in &config.llm.providers {
            let api_key = resolve_api_key(id, entry, selected, api_key_override, |name| {
                std::env::var(name).ok()
            });
            let provider: Arc<dyn VisionModel> = match entry.adapter.as_deref() {
                Some("gemini") => Arc::new(GeminiProvider::new(
                    id.clone(),
                    entry.api_base.clone(),
                    api_key,
                    timeout,
                )),
                Some(other) => {
                    tracing::warn!(provider = %id, adapter = other, "unknown adapter, treating as OpenAI-compatible");
                    Arc::new(OpenAiCompatibleProvider::new(
                        id.clone(),
                        entry.api_base.clone(),
                        api_key,
                        timeout,
                    ))
                }
                None => Arc::new(OpenAiCompatibleProvider::new(
                    id.clone(),
                    entry.api_base.clone(),
                    api_key,
                    timeout,
                )),
            };
            registry.register(provider);
        }
        registry
    }
}

/// Key for one provider, first non-empty of:
///
/// 1. `cli_key`, when `id` is the `selected` provider
/// 2. `GEMINI_API_KEY`, for `adapter = "gemini"` entries only
/// 3. `BOXLENS_<ID>_API_KEY`
/// 4. `api_key` in config.toml
fn resolve_api_key(
    id: &str,
    entry: &ProviderEntry,
    selected: &str,
    cli_key: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> String {
    let non_empty = |k: &String| !k.is_empty();
    if id == selected {
        if let Some(key) = cli_key.filter(|k| !k.is_empty()) {
            return key.to_string();
        }
    }
    if entry.adapter.as_deref() == Some("gemini") {
        if let Some(key) = env(GEMINI_KEY_VAR).filter(non_empty) {
            return key;
        }
    }
    env(&format!("BOXLENS_{}_API_KEY", id.to_uppercase()))
        .filter(non_empty)
        .or_else(|| entry.api_key.clone().filter(non_empty))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.llm.providers.insert(
            "local".to_string(),
            ProviderEntry {
                display_name: "Local".to_string(),
                api_base: "http://localhost:8000/v1/chat/completions".to_string(),
                model: "llava".to_string(),
                models: vec![],
                temperature: 0.0,
                adapter: None,
                api_key: Some("from-config".to_string()),
            },
        );
        cfg
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn registers_every_configured_provider() {
        let registry = ProviderRegistry::from_config(&config(), None, None);
        assert_eq!(registry.get("gemini").unwrap().name(), "gemini");
        assert_eq!(registry.get("local").unwrap().name(), "local");
    }

    #[test]
    fn call_config_defaults_to_provider_model() {
        let registry = ProviderRegistry::from_config(&config(), None, None);
        let (provider, cfg) = registry.call_config(None, None).unwrap();
        assert_eq!(provider.name(), "gemini");
        assert_eq!(cfg.model, "gemini-1.5-pro");

        let (provider, cfg) = registry.call_config(Some("local"), Some("bakllava")).unwrap();
        assert_eq!(provider.name(), "local");
        assert_eq!(cfg.model, "bakllava");
        assert_eq!(cfg.temperature, 0.0);
    }

    #[test]
    fn unknown_provider_is_a_config_error() {
        let registry = ProviderRegistry::from_config(&config(), None, None);
        assert!(matches!(registry.call_config(Some("nope"), None), Err(BoxLensError::Config(_))));
        assert!(matches!(registry.get("nope"), Err(BoxLensError::Config(_))));
    }

    #[test]
    fn override_key_wins_over_config() {
        let cfg = config();
        let entry = &cfg.llm.providers["local"];
        assert_eq!(resolve_api_key("local", entry, "local", Some("cli"), no_env), "cli");
        assert_eq!(resolve_api_key("local", entry, "local", None, no_env), "from-config");
        assert_eq!(resolve_api_key("local", entry, "local", Some(""), no_env), "from-config");
    }

    #[test]
    fn gemini_env_key_stays_with_gemini_providers() {
        let cfg = config();
        let env = |name: &str| match name {
            "GEMINI_API_KEY" => Some("gemini-secret".to_string()),
            "BOXLENS_LOCAL_API_KEY" => Some("local-env".to_string()),
            _ => None,
        };
        assert_eq!(resolve_api_key("gemini", &cfg.llm.providers["gemini"], "gemini", None, env), "gemini-secret");
        assert_eq!(resolve_api_key("local", &cfg.llm.providers["local"], "gemini", None, env), "local-env");
        assert_eq!(
            resolve_api_key("local", &cfg.llm.providers["local"], "local", None, |n: &str| {
                (n == "GEMINI_API_KEY").then(|| "gemini-secret".to_string())
            }),
            "from-config"
        );
    }

    #[test]
    fn per_provider_env_key_beats_config() {
        let cfg = config();
        let env = |name: &str| (name == "BOXLENS_LOCAL_API_KEY").then(|| "local-env".to_string());
        assert_eq!(resolve_api_key("local", &cfg.llm.providers["local"], "gemini", None, env), "local-env");
    }

    #[test]
    fn cli_key_only_reaches_the_selected_provider() {
        let cfg = config();
        let (gemini, local) = (&cfg.llm.providers["gemini"], &cfg.llm.providers["local"]);
        let cli = Some("cli-secret");

        assert_eq!(resolve_api_key("gemini", gemini, "gemini", cli, no_env), "cli-secret");
        // a provider that was not picked keeps its own key
        assert_eq!(resolve_api_key("local", local, "gemini", cli, no_env), "from-config");
        assert_eq!(resolve_api_key("local", local, "local", cli, no_env), "cli-secret");
        assert_eq!(resolve_api_key("gemini", gemini, "local", cli, no_env), "");
    }
}
