use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::ClientOptions;
use crate::failure::HandlerOptions;
use crate::orchestrator::OrchestratorOptions;
use crate::retry::RetryPolicy;

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt (total attempts = max_retries + 1).
    pub max_retries: u32,
    /// Base delay in seconds for exponential backoff.
    pub base_delay_secs: f64,
    /// Optional ceiling on a single backoff delay, in seconds. Unset = uncapped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_delay_secs: Option<f64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_secs: 30.0,
            max_delay_secs: None,
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> Result<RetryPolicy> {
        let base_delay = secs_to_duration("retry.base_delay_secs", self.base_delay_secs)?;
        let max_delay = self
            .max_delay_secs
            .map(|s| secs_to_duration("retry.max_delay_secs", s))
            .transpose()?;
        Ok(RetryPolicy {
            max_retries: self.max_retries,
            base_delay,
            max_delay,
        })
    }
}

/// Batch lifecycle parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Seconds between status polls of a submitted batch.
    pub poll_interval_secs: f64,
    /// Maximum submission rounds (first batch plus retry batches).
    pub max_rounds: u32,
    /// Failure count above which a recovery strategy is marked high priority.
    pub high_priority_threshold: usize,
    /// Prefix stripped from request ids to get the item id.
    pub request_id_prefix: String,
    /// Suffix appended to request ids of retried requests.
    pub retry_suffix: String,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30.0,
            max_rounds: 3,
            high_priority_threshold: 10,
            request_id_prefix: "storyline-".to_string(),
            retry_suffix: "-retry".to_string(),
        }
    }
}

impl BatchConfig {
    pub fn handler_options(&self) -> HandlerOptions {
        HandlerOptions {
            high_priority_threshold: self.high_priority_threshold,
            request_id_prefix: self.request_id_prefix.clone(),
            retry_suffix: self.retry_suffix.clone(),
        }
    }

    pub fn orchestrator_options(&self) -> Result<OrchestratorOptions> {
        if self.max_rounds == 0 {
            bail!("batch.max_rounds must be at least 1");
        }
        Ok(OrchestratorOptions {
            poll_interval: secs_to_duration("batch.poll_interval_secs", self.poll_interval_secs)?,
            max_rounds: self.max_rounds,
            skip_recovered: true,
        })
    }
}

/// Batch API endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub api_version: String,
    /// Environment variable holding the API key (the key itself never goes in the file).
    pub api_key_env: String,
    pub connect_timeout_secs: u64,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.anthropic.com/".to_string(),
            api_version: "2023-06-01".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            connect_timeout_secs: 15,
            timeout_secs: 120,
        }
    }
}

impl ApiConfig {
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            base_url: self.base_url.clone(),
            api_version: self.api_version.clone(),
            api_key_env: self.api_key_env.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

/// Global configuration loaded from `~/.config/lorebatch/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LorebatchConfig {
    /// Directory that holds `partial_results/`; CLI `--output` overrides it.
    pub output_dir: PathBuf,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

impl Default for LorebatchConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("storyline_output"),
            retry: None,
            batch: BatchConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

impl LorebatchConfig {
    pub fn retry_policy(&self) -> Result<RetryPolicy> {
        self.retry.clone().unwrap_or_default().to_policy()
    }
}

fn secs_to_duration(field: &str, secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs).with_context(|| {
        format!("{field} must be a finite, non-negative number of seconds (got {secs})")
    })
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("lorebatch")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<LorebatchConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = LorebatchConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from_path(&path)
}

/// Load configuration from an explicit path (no defaults written).
pub fn load_from_path(path: &Path) -> Result<LorebatchConfig> {
    let data =
        fs::read_to_string(path).with_context(|| format!("read config: {}", path.display()))?;
    let cfg: LorebatchConfig =
        toml::from_str(&data).with_context(|| format!("parse config: {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = LorebatchConfig::default();
        assert_eq!(cfg.output_dir, PathBuf::from("storyline_output"));
        assert!(cfg.retry.is_none());
        assert_eq!(cfg.batch.max_rounds, 3);
        assert_eq!(cfg.batch.high_priority_threshold, 10);
        assert_eq!(cfg.batch.request_id_prefix, "storyline-");
        assert_eq!(cfg.batch.retry_suffix, "-retry");
        assert_eq!(cfg.api.api_key_env, "ANTHROPIC_API_KEY");
    }

    #[test]
    fn default_retry_policy_matches_builtin() {
        let policy = LorebatchConfig::default().retry_policy().unwrap();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.base_delay, Duration::from_secs(30));
        assert!(policy.max_delay.is_none());
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = LorebatchConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: LorebatchConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.output_dir, cfg.output_dir);
        assert_eq!(parsed.batch.poll_interval_secs, cfg.batch.poll_interval_secs);
        assert_eq!(parsed.api.base_url, cfg.api.base_url);
    }

    #[test]
    fn config_toml_minimal_uses_section_defaults() {
        let toml = r#"
            output_dir = "/tmp/out"
        "#;
        let cfg: LorebatchConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.output_dir, PathBuf::from("/tmp/out"));
        assert!(cfg.retry.is_none());
        assert_eq!(cfg.batch.max_rounds, 3);
        assert_eq!(cfg.api.timeout_secs, 120);
    }

    #[test]
    fn config_toml_retry_and_batch_sections() {
        let toml = r#"
            output_dir = "out"

            [retry]
            max_retries = 5
            base_delay_secs = 0.5
            max_delay_secs = 60.0

            [batch]
            poll_interval_secs = 10.0
            max_rounds = 2
            high_priority_threshold = 4
            request_id_prefix = "gov-"
            retry_suffix = "-again"
        "#;
        let cfg: LorebatchConfig = toml::from_str(toml).unwrap();
        let policy = cfg.retry_policy().unwrap();
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.base_delay, Duration::from_millis(500));
        assert_eq!(policy.max_delay, Some(Duration::from_secs(60)));

        let opts = cfg.batch.orchestrator_options().unwrap();
        assert_eq!(opts.poll_interval, Duration::from_secs(10));
        assert_eq!(opts.max_rounds, 2);

        let handler = cfg.batch.handler_options();
        assert_eq!(handler.high_priority_threshold, 4);
        assert_eq!(handler.request_id_prefix, "gov-");
        assert_eq!(handler.retry_suffix, "-again");
    }

    #[test]
    fn config_toml_partial_sections_fill_missing_fields() {
        let toml = r#"
            output_dir = "out"

            [retry]
            max_retries = 1

            [batch]
            max_rounds = 5

            [api]
            base_url = "http://127.0.0.1:8080/"
        "#;
        let cfg: LorebatchConfig = toml::from_str(toml).unwrap();
        let policy = cfg.retry_policy().unwrap();
        assert_eq!(policy.max_retries, 1);
        assert_eq!(policy.base_delay, Duration::from_secs(30));

        assert_eq!(cfg.batch.max_rounds, 5);
        assert_eq!(cfg.batch.poll_interval_secs, 30.0);
        assert_eq!(cfg.batch.request_id_prefix, "storyline-");

        assert_eq!(cfg.api.base_url, "http://127.0.0.1:8080/");
        assert_eq!(cfg.api.api_version, "2023-06-01");
        assert_eq!(cfg.api.timeout_secs, 120);
    }

    #[test]
    fn negative_delay_is_rejected() {
        let retry = RetryConfig {
            max_retries: 1,
            base_delay_secs: -1.0,
            max_delay_secs: None,
        };
        let err = retry.to_policy().unwrap_err();
        assert!(err.to_string().contains("retry.base_delay_secs"));
    }

    #[test]
    fn zero_rounds_is_rejected() {
        let batch = BatchConfig {
            max_rounds: 0,
            ..BatchConfig::default()
        };
        assert!(batch.orchestrator_options().is_err());
    }

    #[test]
    fn load_from_path_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "output_dir = \"governors\"\n").unwrap();
        let cfg = load_from_path(&path).unwrap();
        assert_eq!(cfg.output_dir, PathBuf::from("governors"));
    }
}
