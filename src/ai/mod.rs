//! AI summarization through third-party providers.
//!
//! One entry point per concern: [`AiClient::summarize`] maps a prompt onto
//! the provider's request shape and pulls the text back out,
//! [`AiClient::fetch_provider_models`] lists selectable models, and
//! [`format_summary_html`] turns the plain-text answer into the HTML that
//! replaces the article body.
//!
//! For Ollama and LM Studio the "API key" slot holds the server base URL.

mod client;
mod format;

pub use client::{AiClient, Endpoints};
pub use format::{build_summary_prompt, format_summary_html};

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Article text beyond this many characters is not sent to the provider.
pub const MAX_SUMMARY_INPUT_CHARS: usize = 12_000;

/// Output token cap sent with every summarize request.
pub const MAX_OUTPUT_TOKENS: u32 = 1800;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    #[default]
    None,
    Anthropic,
    Gemini,
    Perplexity,
    Ollama,
    Lmstudio,
}

impl AiProvider {
    pub const ALL: [AiProvider; 6] = [
        AiProvider::None,
        AiProvider::Anthropic,
        AiProvider::Gemini,
        AiProvider::Perplexity,
        AiProvider::Ollama,
        AiProvider::Lmstudio,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AiProvider::None => "none",
            AiProvider::Anthropic => "anthropic",
            AiProvider::Gemini => "gemini",
            AiProvider::Perplexity => "perplexity",
            AiProvider::Ollama => "ollama",
            AiProvider::Lmstudio => "lmstudio",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == value)
    }

    pub fn label(self) -> &'static str {
        match self {
            AiProvider::None => "None",
            AiProvider::Anthropic => "Anthropic",
            AiProvider::Gemini => "Gemini",
            AiProvider::Perplexity => "Perplexity",
            AiProvider::Ollama => "Ollama",
            AiProvider::Lmstudio => "LM Studio",
        }
    }

    /// Local providers take a server URL instead of a secret key.
    pub fn uses_base_url(self) -> bool {
        matches!(self, AiProvider::Ollama | AiProvider::Lmstudio)
    }

    /// The provider after this one, wrapping around.
    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|p| *p == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }
}

impl fmt::Display for AiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A model a provider offers, as shown in the model picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelOption {
    pub id: String,
    pub label: String,
}

impl ModelOption {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AiError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    /// Non-2xx answer; `message` comes from the provider's error body when present.
    #[error("{message}")]
    Provider { status: u16, message: String },
    #[error("Provider returned no summary text")]
    EmptyResponse,
    #[error("No AI provider selected")]
    UnsupportedProvider,
    #[error("Invalid provider URL: {0}")]
    InvalidUrl(String),
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_serde_names() {
        assert_eq!(
            serde_json::to_string(&AiProvider::Lmstudio).unwrap(),
            "\"lmstudio\""
        );
        let parsed: AiProvider = serde_json::from_str("\"gemini\"").unwrap();
        assert_eq!(parsed, AiProvider::Gemini);
        assert!(serde_json::from_str::<AiProvider>("\"openai\"").is_err());
    }

    #[test]
    fn test_provider_cycle_wraps() {
        assert_eq!(AiProvider::None.next(), AiProvider::Anthropic);
        assert_eq!(AiProvider::Lmstudio.next(), AiProvider::None);
    }

    #[test]
    fn test_parse_matches_as_str() {
        for provider in AiProvider::ALL {
            assert_eq!(AiProvider::parse(provider.as_str()), Some(provider));
        }
        assert_eq!(AiProvider::parse("openai"), None);
    }
}
