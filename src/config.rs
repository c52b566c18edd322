use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "codellama:latest";

/// How the leading system instruction is picked for each turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PromptPolicy {
    /// Debugging instruction when the conversation mentions errors or debugging,
    /// code-generation instruction otherwise.
    #[default]
    Adaptive,
    /// Always the code-generation instruction.
    Fixed,
}

impl FromStr for PromptPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "adaptive" => Ok(PromptPolicy::Adaptive),
            "fixed" => Ok(PromptPolicy::Fixed),
            other => Err(format!("Unknown prompt policy: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub ollama_base_url: String,
    pub default_model: String,
    pub upstream_timeout: Duration,
    pub health_timeout: Duration,
    pub num_ctx: Option<u32>,
    pub top_p: Option<f32>,
    pub prompt_policy: PromptPolicy,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            ollama_base_url: DEFAULT_OLLAMA_BASE_URL.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            upstream_timeout: Duration::from_secs(120),
            health_timeout: Duration::from_secs(5),
            num_ctx: Some(4096),
            top_p: Some(0.9),
            prompt_policy: PromptPolicy::Adaptive,
        }
    }
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup; unset keys keep their
    /// defaults and unparseable ones are logged and ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(host) = lookup("HOST") {
            config.host = host;
        }
        if let Some(port) = parsed(&lookup, "PORT") {
            config.port = port;
        }
        if let Some(url) = lookup("OLLAMA_API_BASE_URL") {
            config.ollama_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(model) = lookup("DEFAULT_MODEL").filter(|m| !m.trim().is_empty()) {
            config.default_model = model;
        }
        if let Some(secs) = parsed::<u64>(&lookup, "UPSTREAM_TIMEOUT_SECS") {
            config.upstream_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parsed::<u64>(&lookup, "HEALTH_TIMEOUT_SECS") {
            config.health_timeout = Duration::from_secs(secs);
        }
        if let Some(num_ctx) = parsed(&lookup, "NUM_CTX") {
            config.num_ctx = Some(num_ctx).filter(|n| *n > 0);
        }
        if let Some(top_p) = parsed(&lookup, "TOP_P") {
            config.top_p = Some(top_p);
        }
        if let Some(policy) = parsed(&lookup, "SYSTEM_PROMPT_MODE") {
            config.prompt_policy = policy;
        }

        config
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparseable configuration value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_local_ollama() {
        let config = GatewayConfig::from_lookup(|_| None);
        assert_eq!(config.ollama_base_url, "http://localhost:11434");
        assert_eq!(config.default_model, "codellama:latest");
        assert_eq!(config.upstream_timeout, Duration::from_secs(120));
        assert_eq!(config.health_timeout, Duration::from_secs(5));
        assert_eq!(config.prompt_policy, PromptPolicy::Adaptive);
        assert_eq!(config.bind_addr(), "0.0.0.0:8000");
    }

    #[test]
    fn overrides_are_applied() {
        let config = GatewayConfig::from_lookup(lookup_from(&[
            ("OLLAMA_API_BASE_URL", "http://gpu-box:11434/"),
            ("PORT", "9000"),
            ("UPSTREAM_TIMEOUT_SECS", "30"),
            ("SYSTEM_PROMPT_MODE", "Fixed"),
            ("NUM_CTX", "0"),
        ]));
        assert_eq!(config.ollama_base_url, "http://gpu-box:11434");
        assert_eq!(config.port, 9000);
        assert_eq!(config.upstream_timeout, Duration::from_secs(30));
        assert_eq!(config.prompt_policy, PromptPolicy::Fixed);
        assert_eq!(config.num_ctx, None);
    }

    #[test]
    fn bad_values_keep_defaults() {
        let config = GatewayConfig::from_lookup(lookup_from(&[
            ("PORT", "eighty"),
            ("TOP_P", "high"),
            ("SYSTEM_PROMPT_MODE", "random"),
        ]));
        assert_eq!(config.port, 8000);
        assert_eq!(config.top_p, Some(0.9));
        assert_eq!(config.prompt_policy, PromptPolicy::Adaptive);
    }
}
