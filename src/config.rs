use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Complete configuration for tracing episodes and sampling counterfactuals.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TracerConfig {
    pub sampling: SamplingConfig,
    pub episode: EpisodeConfig,
    pub chain: ChainConfig,
}

/// Branch-point sampling configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Name of the sampling strategy (default: "random").
    pub method: String,
    /// Seed for the branch sampler; entropy-seeded when absent.
    pub seed: Option<u64>,
}

/// Episode execution configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EpisodeConfig {
    /// Upper bound on steps per episode (default: 1000).
    pub max_steps: usize,
}

/// Reference chain environment configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Terminal state of the chain (default: 3).
    pub goal: u32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            method: "random".into(),
            seed: None,
        }
    }
}

impl Default for EpisodeConfig {
    fn default() -> Self {
        Self { max_steps: 1000 }
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self { goal: 3 }
    }
}

impl TracerConfig {
    /// Load a configuration from a JSON file. Missing sections fall back to
    /// their defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = TracerConfig::default();
        assert_eq!(config.sampling.method, "random");
        assert_eq!(config.sampling.seed, None);
        assert_eq!(config.episode.max_steps, 1000);
        assert_eq!(config.chain.goal, 3);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"sampling": {{"seed": 42}}, "chain": {{"goal": 5}}}}"#).unwrap();

        let config = TracerConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.sampling.seed, Some(42));
        assert_eq!(config.sampling.method, "random");
        assert_eq!(config.chain.goal, 5);
        assert_eq!(config.episode.max_steps, 1000);
    }

    #[test]
    fn unreadable_file_reports_path() {
        let err = TracerConfig::load_from_file(Path::new("/nonexistent/tracer.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/tracer.json"));
    }

    #[test]
    fn malformed_file_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(TracerConfig::load_from_file(file.path()).is_err());
    }
}
