//! Load and validate runtime configuration.
//!
//! Non-secret settings live in `config.yaml`; API keys come from the
//! environment (optionally via `.env`).

use anyhow::{bail, Context};
use directories::ProjectDirs;
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::utils::sanitize_symbol;

/// Environment variable overriding the journal location.
pub const JOURNAL_PATH_ENV: &str = "OPTIONPILOT_JOURNAL";

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MarketDataCfg {
    pub base_url: String,
    pub timeout_sec: u64,
}

impl Default for MarketDataCfg {
    fn default() -> Self {
        Self {
            base_url: "https://www.alphavantage.co/query".to_string(),
            timeout_sec: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AiCfg {
    pub base_url: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub timeout_sec: u64,
}

impl Default for AiCfg {
    fn default() -> Self {
        Self {
            base_url: "https://openrouter.ai/api/v1/chat/completions".to_string(),
            model: "google/gemini-2.5-flash-lite".to_string(),
            temperature: 0.3,
            max_tokens: 300,
            timeout_sec: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct JournalCfg {
    /// Falls back to the platform data directory when unset.
    pub path: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SymbolsCfg {
    pub supported: Vec<String>,
}

impl Default for SymbolsCfg {
    fn default() -> Self {
        Self {
            supported: ["NVDA", "TSLA", "HOOD", "CRCL"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub market_data: MarketDataCfg,
    pub ai: AiCfg,
    pub journal: JournalCfg,
    pub symbols: SymbolsCfg,
}

/// External services that need an API key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    AlphaVantage,
    OpenRouter,
}

impl Service {
    pub fn env_var(self) -> &'static str {
        match self {
            Service::AlphaVantage => "ALPHA_VANTAGE_API_KEY",
            Service::OpenRouter => "OPENROUTER_API_KEY",
        }
    }
}

/// Read the API key for `service` from the environment.
pub fn api_key(service: Service) -> anyhow::Result<String> {
    let var = service.env_var();
    match std::env::var(var) {
        Ok(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => bail!("Missing {} in environment variables", var),
    }
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let s = fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        Self::from_yaml(&s).with_context(|| format!("parse config {}", path.display()))
    }

    /// Like [`AppConfig::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_yaml(s: &str) -> anyhow::Result<Self> {
        let cfg: Self = serde_yaml::from_str(s)?;
        Ok(cfg)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.market_data.timeout_sec == 0 || self.ai.timeout_sec == 0 {
            bail!("timeouts must be at least one second");
        }
        if self.symbols.supported.iter().all(|s| s.trim().is_empty()) {
            bail!("No supported symbols configured");
        }
        if !(0.0..=2.0).contains(&self.ai.temperature) {
            bail!("ai.temperature {} outside 0.0..=2.0", self.ai.temperature);
        }
        if self.ai.max_tokens == 0 {
            bail!("ai.max_tokens must be positive");
        }
        Ok(())
    }

    pub fn is_supported(&self, symbol: &str) -> bool {
        let sym = sanitize_symbol(symbol);
        self.symbols
            .supported
            .iter()
            .any(|s| sanitize_symbol(s) == sym)
    }

    /// Journal location: `env_override`, then `journal.path`, then the platform data dir.
    pub fn journal_path(&self, env_override: Option<String>) -> anyhow::Result<PathBuf> {
        if let Some(p) = env_override.filter(|p| !p.trim().is_empty()) {
            return Ok(PathBuf::from(p));
        }
        if let Some(p) = &self.journal.path {
            return Ok(PathBuf::from(p));
        }
        let dirs = ProjectDirs::from("", "", "optionpilot")
            .context("no home directory to place the journal in")?;
        Ok(dirs.data_dir().join("journal.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_gives_defaults() {
        let cfg = AppConfig::from_yaml("{}").unwrap();
        assert_eq!(cfg.market_data.timeout_sec, 30);
        assert_eq!(cfg.ai.max_tokens, 300);
        assert_eq!(cfg.symbols.supported.len(), 4);
        cfg.validate().unwrap();
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = AppConfig::from_yaml(
            r#"
ai:
  model: "openai/gpt-4o-mini"
journal:
  path: "/tmp/journal.json"
symbols:
  supported: ["aapl", "SPY"]
"#,
        )
        .unwrap();
        assert_eq!(cfg.ai.model, "openai/gpt-4o-mini");
        assert_eq!(cfg.ai.temperature, 0.3);
        assert!(cfg.is_supported("AAPL"));
        assert!(cfg.is_supported(" spy "));
        assert!(!cfg.is_supported("NVDA"));
        assert_eq!(
            cfg.journal_path(None).unwrap(),
            PathBuf::from("/tmp/journal.json")
        );
        assert_eq!(
            cfg.journal_path(Some("/data/j.json".into())).unwrap(),
            PathBuf::from("/data/j.json")
        );
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut cfg = AppConfig::default();
        cfg.market_data.timeout_sec = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = AppConfig::default();
        cfg.symbols.supported.clear();
        assert!(cfg.validate().is_err());

        let mut cfg = AppConfig::default();
        cfg.ai.temperature = 3.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn unknown_yaml_type_is_an_error() {
        assert!(AppConfig::from_yaml("market_data:\n  timeout_sec: soon\n").is_err());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = AppConfig::load_or_default("/nonexistent/optionpilot.yaml").unwrap();
        assert_eq!(cfg.market_data.base_url, MarketDataCfg::default().base_url);
        assert!(AppConfig::load("/nonexistent/optionpilot.yaml").is_err());
    }
}
