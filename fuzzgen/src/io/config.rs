//! Harness configuration stored in `fuzzgen.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::conversation::HistoryScope;
use crate::core::naming::{DEFAULT_ARTIFACT_SUFFIX, DEFAULT_TEST_UNIT_SUFFIX};
use crate::core::types::SourceUnit;
use crate::harness::RunSettings;
use crate::io::validator::ARTIFACT_PLACEHOLDER;

pub const DEFAULT_CONFIG_FILE: &str = "fuzzgen.toml";

/// Harness configuration (TOML).
///
/// Missing fields default to the values the generator has always used.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HarnessConfig {
    /// Suffix inserted before the extension of each companion artifact.
    pub artifact_suffix: String,

    /// Suffix appended to a unit name to name its test contract.
    pub test_unit_suffix: String,

    /// Repairs allowed per unit before the run stops.
    pub max_repair_attempts: u32,

    pub history_scope: HistoryScope,

    /// Extra instructional messages, one file per system message.
    pub seed_files: Vec<PathBuf>,

    /// Units to process when none are given on the command line.
    pub units: Vec<SourceUnit>,

    pub model: ModelConfig,

    pub validator: ValidatorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    /// Base URL of an OpenAI-compatible API (without `/chat/completions`).
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    pub request_timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4-turbo".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            temperature: None,
            request_timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Command that checks an artifact (e.g. `["crytic-compile","{artifact}","--ignore-compile"]`).
    pub command: Vec<String>,
    pub timeout_secs: u64,
    /// Truncate captured validator output beyond this many bytes.
    pub output_limit_bytes: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            command: vec![
                "crytic-compile".to_string(),
                ARTIFACT_PLACEHOLDER.to_string(),
                "--ignore-compile".to_string(),
            ],
            timeout_secs: 10 * 60,
            output_limit_bytes: 100_000,
        }
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            artifact_suffix: DEFAULT_ARTIFACT_SUFFIX.to_string(),
            test_unit_suffix: DEFAULT_TEST_UNIT_SUFFIX.to_string(),
            max_repair_attempts: 10,
            history_scope: HistoryScope::default(),
            seed_files: Vec::new(),
            units: Vec::new(),
            model: ModelConfig::default(),
            validator: ValidatorConfig::default(),
        }
    }
}

impl HarnessConfig {
    pub fn validate(&self) -> Result<()> {
        if self.artifact_suffix.is_empty() {
            return Err(anyhow!("artifact_suffix must not be empty"));
        }
        if self.test_unit_suffix.is_empty() {
            return Err(anyhow!("test_unit_suffix must not be empty"));
        }
        if self.max_repair_attempts == 0 {
            return Err(anyhow!("max_repair_attempts must be > 0"));
        }
        if self.model.base_url.trim().is_empty() {
            return Err(anyhow!("model.base_url must not be empty"));
        }
        if self.model.model.trim().is_empty() {
            return Err(anyhow!("model.model must not be empty"));
        }
        if self.model.api_key_env.trim().is_empty() {
            return Err(anyhow!("model.api_key_env must not be empty"));
        }
        if self.model.request_timeout_secs == 0 {
            return Err(anyhow!("model.request_timeout_secs must be > 0"));
        }
        if self.validator.command.is_empty() || self.validator.command[0].trim().is_empty() {
            return Err(anyhow!("validator.command must be a non-empty array"));
        }
        if self.validator.timeout_secs == 0 {
            return Err(anyhow!("validator.timeout_secs must be > 0"));
        }
        if self.validator.output_limit_bytes == 0 {
            return Err(anyhow!("validator.output_limit_bytes must be > 0"));
        }
        for unit in &self.units {
            if unit.name.trim().is_empty() {
                return Err(anyhow!(
                    "unit name must not be empty ({})",
                    unit.source_path.display()
                ));
            }
        }
        Ok(())
    }

    pub fn run_settings(&self) -> RunSettings {
        RunSettings {
            artifact_suffix: self.artifact_suffix.clone(),
            test_unit_suffix: self.test_unit_suffix.clone(),
            max_repair_attempts: self.max_repair_attempts,
            history_scope: self.history_scope,
        }
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `HarnessConfig::default()`.
pub fn load_config(path: &Path) -> Result<HarnessConfig> {
    if !path.exists() {
        let cfg = HarnessConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: HarnessConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &HarnessConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, HarnessConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("fuzzgen.toml");
        let cfg = HarnessConfig {
            history_scope: HistoryScope::PerUnit,
            units: vec![SourceUnit::new("Deposit", "contracts/Deposit.sol")],
            ..HarnessConfig::default()
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("fuzzgen.toml");
        fs::write(
            &path,
            r#"
max_repair_attempts = 3
history_scope = "per_unit"

[validator]
command = ["solc", "--stop-after", "parsing"]

[[units]]
name = "Vault"
source_path = "src/Vault.sol"
"#,
        )
        .expect("write toml");

        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.max_repair_attempts, 3);
        assert_eq!(cfg.history_scope, HistoryScope::PerUnit);
        assert_eq!(cfg.validator.command[0], "solc");
        assert_eq!(cfg.validator.timeout_secs, 600);
        assert_eq!(cfg.model, ModelConfig::default());
        assert_eq!(cfg.units, vec![SourceUnit::new("Vault", "src/Vault.sol")]);
    }

    #[test]
    fn zero_repair_budget_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("fuzzgen.toml");
        fs::write(&path, "max_repair_attempts = 0\n").expect("write toml");

        let err = load_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("max_repair_attempts must be > 0"));
    }

    #[test]
    fn empty_validator_command_is_rejected() {
        let cfg = HarnessConfig {
            validator: ValidatorConfig {
                command: Vec::new(),
                ..ValidatorConfig::default()
            },
            ..HarnessConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
