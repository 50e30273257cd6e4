// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Engine Configuration Types
//
// Kubernetes-style manifest (apiVersion/kind/metadata/spec) for the lifecycle
// engine, covering:
// - Underwriting defaults applied at lead creation
// - Needs-attention thresholds
// - Built-in automation rule parameters
// - Side-effect channel capacities
// - Jurisdiction profile location
// - Logging settings

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::domain::identity::OrgId;
use crate::domain::underwriting::{DEFAULT_DESIRED_FEE, DEFAULT_INVESTOR_MULTIPLIER};

pub const API_VERSION: &str = "dealflow/v1";
pub const KIND: &str = "EngineConfig";

/// Top-level engine configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfigManifest {
    /// API version (must be "dealflow/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "EngineConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: EngineConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfigSpec {
    #[serde(default)]
    pub underwriting: UnderwritingConfig,

    #[serde(default)]
    pub attention: AttentionThresholds,

    #[serde(default)]
    pub automation: AutomationConfig,

    #[serde(default)]
    pub side_effects: SideEffectsConfig,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub jurisdictions: Option<JurisdictionsConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observability: Option<ObservabilityConfig>,
}

/// Defaults applied when a lead is created without explicit parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnderwritingConfig {
    #[serde(default = "default_investor_multiplier")]
    pub default_investor_multiplier: Decimal,

    #[serde(default = "default_desired_fee")]
    pub default_desired_fee: Decimal,
}

impl Default for UnderwritingConfig {
    fn default() -> Self {
        Self {
            default_investor_multiplier: default_investor_multiplier(),
            default_desired_fee: default_desired_fee(),
        }
    }
}

/// Day thresholds for needs-attention signals
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttentionThresholds {
    #[serde(default = "default_no_activity_days")]
    pub no_activity_days: i64,

    #[serde(default = "default_stage_unchanged_days")]
    pub stage_unchanged_days: i64,

    #[serde(default = "default_old_issue_days")]
    pub old_issue_days: i64,

    /// Upper bound (inclusive) of days remaining for `close_date_approaching`
    #[serde(default = "default_close_date_warning_days")]
    pub close_date_warning_days: i64,
}

impl Default for AttentionThresholds {
    fn default() -> Self {
        Self {
            no_activity_days: default_no_activity_days(),
            stage_unchanged_days: default_stage_unchanged_days(),
            old_issue_days: default_old_issue_days(),
            close_date_warning_days: default_close_date_warning_days(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationConfig {
    /// ARV at or above which deal creation is flagged as high value
    #[serde(default = "default_high_value_arv_threshold")]
    pub high_value_arv_threshold: Decimal,

    #[serde(default = "default_stale_lead_days")]
    pub stale_lead_days: i64,

    /// Organizations opted into the stale-lead rule
    #[serde(default)]
    pub stale_lead_orgs: Vec<OrgId>,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            high_value_arv_threshold: default_high_value_arv_threshold(),
            stale_lead_days: default_stale_lead_days(),
            stale_lead_orgs: vec![],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideEffectsConfig {
    #[serde(default = "default_channel_capacity")]
    pub realtime_capacity: usize,

    #[serde(default = "default_channel_capacity")]
    pub notification_capacity: usize,

    #[serde(default = "default_event_queue_capacity")]
    pub event_queue_capacity: usize,

    #[serde(default = "default_event_flush_batch_size")]
    pub event_flush_batch_size: usize,
}

impl Default for SideEffectsConfig {
    fn default() -> Self {
        Self {
            realtime_capacity: default_channel_capacity(),
            notification_capacity: default_channel_capacity(),
            event_queue_capacity: default_event_queue_capacity(),
            event_flush_batch_size: default_event_flush_batch_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JurisdictionsConfig {
    /// YAML file with jurisdiction profiles
    pub profiles_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "trace")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format ("json" or "text")
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_investor_multiplier() -> Decimal {
    DEFAULT_INVESTOR_MULTIPLIER
}

fn default_desired_fee() -> Decimal {
    DEFAULT_DESIRED_FEE
}

fn default_no_activity_days() -> i64 {
    14
}

fn default_stage_unchanged_days() -> i64 {
    21
}

fn default_old_issue_days() -> i64 {
    30
}

fn default_close_date_warning_days() -> i64 {
    7
}

fn default_high_value_arv_threshold() -> Decimal {
    Decimal::from(500_000)
}

fn default_stale_lead_days() -> i64 {
    30
}

fn default_channel_capacity() -> usize {
    1000
}

fn default_event_queue_capacity() -> usize {
    4096
}

fn default_event_flush_batch_size() -> usize {
    64
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for EngineConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "dealflow".to_string(),
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: EngineConfigSpec::default(),
        }
    }
}

impl EngineConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. DEALFLOW_CONFIG_PATH environment variable
    /// 2. ./dealflow-config.yaml (working directory)
    /// 3. ~/.dealflow/config.yaml (user home)
    /// 4. /etc/dealflow/config.yaml (system, Unix) or C:\ProgramData\Dealflow\config.yaml (Windows)
    pub fn discover_config() -> Option<PathBuf> {
        Self::candidate_paths().into_iter().find(|path| path.exists())
    }

    /// Every location `discover_config` checks, in order
    pub fn candidate_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Ok(path) = std::env::var("DEALFLOW_CONFIG_PATH") {
            paths.push(PathBuf::from(path));
        }
        paths.push(PathBuf::from("./dealflow-config.yaml"));
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".dealflow").join("config.yaml"));
        }
        #[cfg(unix)]
        paths.push(PathBuf::from("/etc/dealflow/config.yaml"));
        #[cfg(windows)]
        paths.push(PathBuf::from("C:\\ProgramData\\Dealflow\\config.yaml"));
        paths
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("DEALFLOW_HIGH_VALUE_ARV_THRESHOLD") {
            match val.trim().parse::<Decimal>() {
                Ok(threshold) if threshold > Decimal::ZERO => {
                    tracing::info!("Environment override: DEALFLOW_HIGH_VALUE_ARV_THRESHOLD={}", threshold);
                    self.spec.automation.high_value_arv_threshold = threshold;
                }
                _ => {
                    tracing::warn!(
                        "Invalid value for DEALFLOW_HIGH_VALUE_ARV_THRESHOLD: '{}'. Expected a positive amount. Ignoring.",
                        val
                    );
                }
            }
        }

        if let Ok(val) = std::env::var("DEALFLOW_STALE_LEAD_DAYS") {
            match val.trim().parse::<i64>() {
                Ok(days) if days > 0 => {
                    tracing::info!("Environment override: DEALFLOW_STALE_LEAD_DAYS={}", days);
                    self.spec.automation.stale_lead_days = days;
                }
                _ => {
                    tracing::warn!(
                        "Invalid value for DEALFLOW_STALE_LEAD_DAYS: '{}'. Expected a positive integer. Ignoring.",
                        val
                    );
                }
            }
        }

        if let Ok(level) = std::env::var("DEALFLOW_LOG_LEVEL") {
            tracing::info!("Environment override: DEALFLOW_LOG_LEVEL={}", level);
            let observability = self.spec.observability.get_or_insert(ObservabilityConfig { logging: None });
            let logging = observability.logging.get_or_insert(LoggingConfig {
                level: default_log_level(),
                format: default_log_format(),
            });
            logging.level = level;
        }
    }

    /// Configured log level, if any
    pub fn log_level(&self) -> Option<&str> {
        self.spec
            .observability
            .as_ref()
            .and_then(|o| o.logging.as_ref())
            .map(|l| l.level.as_str())
    }

    pub fn log_format(&self) -> Option<&str> {
        self.spec
            .observability
            .as_ref()
            .and_then(|o| o.logging.as_ref())
            .map(|l| l.format.as_str())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        let underwriting = &self.spec.underwriting;
        if underwriting.default_investor_multiplier <= Decimal::ZERO
            || underwriting.default_investor_multiplier > Decimal::ONE
        {
            anyhow::bail!(
                "spec.underwriting.default_investor_multiplier must be in (0, 1], got {}",
                underwriting.default_investor_multiplier
            );
        }
        if underwriting.default_desired_fee < Decimal::ZERO {
            anyhow::bail!("spec.underwriting.default_desired_fee cannot be negative");
        }

        let attention = &self.spec.attention;
        for (name, days) in [
            ("no_activity_days", attention.no_activity_days),
            ("stage_unchanged_days", attention.stage_unchanged_days),
            ("old_issue_days", attention.old_issue_days),
        ] {
            if days <= 0 {
                anyhow::bail!("spec.attention.{} must be positive, got {}", name, days);
            }
        }
        if attention.close_date_warning_days < 0 {
            anyhow::bail!("spec.attention.close_date_warning_days cannot be negative");
        }

        if self.spec.automation.high_value_arv_threshold <= Decimal::ZERO {
            anyhow::bail!("spec.automation.high_value_arv_threshold must be positive");
        }
        if self.spec.automation.stale_lead_days <= 0 {
            anyhow::bail!("spec.automation.stale_lead_days must be positive");
        }

        let side_effects = &self.spec.side_effects;
        for (name, value) in [
            ("realtime_capacity", side_effects.realtime_capacity),
            ("notification_capacity", side_effects.notification_capacity),
            ("event_queue_capacity", side_effects.event_queue_capacity),
            ("event_flush_batch_size", side_effects.event_flush_batch_size),
        ] {
            if value == 0 {
                anyhow::bail!("spec.side_effects.{} must be positive", name);
            }
        }

        if let Some(format) = self.log_format() {
            if format != "text" && format != "json" {
                anyhow::bail!("Invalid log format: '{}'. Must be 'text' or 'json'", format);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_manifest() {
        let manifest = EngineConfigManifest::default();
        assert_eq!(manifest.api_version, "dealflow/v1");
        assert_eq!(manifest.kind, "EngineConfig");
        assert_eq!(manifest.spec.underwriting.default_investor_multiplier, dec!(0.70));
        assert_eq!(manifest.spec.underwriting.default_desired_fee, dec!(10000));
        assert_eq!(manifest.spec.attention.no_activity_days, 14);
        assert_eq!(manifest.spec.attention.stage_unchanged_days, 21);
        assert!(manifest.spec.automation.stale_lead_orgs.is_empty());
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = r#"
apiVersion: dealflow/v1
kind: EngineConfig
metadata:
  name: staging
spec:
  attention:
    no_activity_days: 10
  automation:
    high_value_arv_threshold: 750000
  observability:
    logging:
      level: debug
"#;
        let manifest = EngineConfigManifest::from_yaml_str(yaml).unwrap();
        assert_eq!(manifest.metadata.name, "staging");
        assert_eq!(manifest.spec.attention.no_activity_days, 10);
        assert_eq!(manifest.spec.attention.old_issue_days, 30);
        assert_eq!(manifest.spec.automation.high_value_arv_threshold, dec!(750000));
        assert_eq!(manifest.spec.automation.stale_lead_days, 30);
        assert_eq!(manifest.spec.side_effects.event_flush_batch_size, 64);
        assert_eq!(manifest.log_level(), Some("debug"));
        assert_eq!(manifest.log_format(), Some("text"));
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_yaml_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dealflow-config.yaml");

        let mut manifest = EngineConfigManifest::default();
        manifest.metadata.name = "roundtrip".to_string();
        manifest.spec.automation.stale_lead_orgs = vec![OrgId::new()];
        manifest.to_yaml_file(&path).unwrap();

        let parsed = EngineConfigManifest::from_yaml_file(&path).unwrap();
        assert_eq!(parsed.metadata.name, "roundtrip");
        assert_eq!(parsed.spec.automation, manifest.spec.automation);
        assert_eq!(parsed.spec.underwriting, manifest.spec.underwriting);
    }

    #[test]
    fn test_explicit_missing_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.yaml");
        assert!(EngineConfigManifest::load_or_default(Some(missing)).is_err());
    }

    #[test]
    fn test_validation() {
        let mut manifest = EngineConfigManifest::default();
        assert!(manifest.validate().is_ok());

        manifest.api_version = "wrong/v1".to_string();
        assert!(manifest.validate().is_err());
        manifest.api_version = API_VERSION.to_string();

        manifest.kind = "NodeConfig".to_string();
        assert!(manifest.validate().is_err());
        manifest.kind = KIND.to_string();

        manifest.metadata.name = "".to_string();
        assert!(manifest.validate().is_err());
        manifest.metadata.name = "dealflow".to_string();

        manifest.spec.underwriting.default_investor_multiplier = dec!(1.2);
        assert!(manifest.validate().is_err());
        manifest.spec.underwriting.default_investor_multiplier = dec!(0.65);

        manifest.spec.attention.stage_unchanged_days = 0;
        assert!(manifest.validate().is_err());
        manifest.spec.attention.stage_unchanged_days = 21;

        manifest.spec.side_effects.event_queue_capacity = 0;
        assert!(manifest.validate().is_err());
        manifest.spec.side_effects.event_queue_capacity = 16;

        assert!(manifest.validate().is_ok());
    }
}
