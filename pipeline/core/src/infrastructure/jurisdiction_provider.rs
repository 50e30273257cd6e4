// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! YAML-backed jurisdiction profile provider.
//!
//! The file is a list of profiles:
//!
//! ```yaml
//! - state: TX
//!   required_fields:
//!     ASSIGNED: [assignment.assigneeName]
//! - state: TX
//!   county: Harris
//!   required_fields:
//!     CLOSED: [title.titleCompany, title.escrowNumber]
//!   flags:
//!     attorney_closing: true
//! ```
//!
//! Field paths are checked against the known metadata fields while parsing,
//! so a typo fails at load time instead of silently never blocking.

use anyhow::Context;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

use crate::domain::jurisdiction::{JurisdictionProfile, JurisdictionRuleProvider};
use crate::domain::repository::RepositoryError;

type ProfileKey = (String, Option<String>);

fn key(state: &str, county: Option<&str>) -> ProfileKey {
    (
        state.trim().to_uppercase(),
        county
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty()),
    )
}

#[derive(Default)]
pub struct YamlJurisdictionProvider {
    profiles: RwLock<HashMap<ProfileKey, JurisdictionProfile>>,
}

impl YamlJurisdictionProvider {
    /// Provider with no profiles; every location is permissive
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let provider = Self::empty();
        provider.replace_all(Self::parse(yaml)?);
        Ok(provider)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read jurisdiction profiles at {:?}", path))?;
        let provider = Self::from_yaml_str(&content)
            .with_context(|| format!("Invalid jurisdiction profiles in {:?}", path))?;
        info!(path = ?path, count = provider.len(), "Loaded jurisdiction profiles");
        Ok(provider)
    }

    /// Replace every profile with the file's contents. On error the current
    /// profiles stay in place.
    pub fn reload(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let content = std::fs::read_to_string(path.as_ref())?;
        self.replace_all(Self::parse(&content)?);
        Ok(())
    }

    pub fn insert(&self, profile: JurisdictionProfile) {
        let k = key(&profile.state, profile.county.as_deref());
        self.profiles.write().insert(k, profile);
    }

    pub fn len(&self) -> usize {
        self.profiles.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn parse(yaml: &str) -> anyhow::Result<HashMap<ProfileKey, JurisdictionProfile>> {
        let list: Vec<JurisdictionProfile> = serde_yaml::from_str(yaml)?;
        let mut profiles = HashMap::with_capacity(list.len());
        for profile in list {
            if profile.state.trim().len() != 2 {
                anyhow::bail!("Invalid state '{}': expected a two-letter code", profile.state);
            }
            let k = key(&profile.state, profile.county.as_deref());
            let location = profile.location();
            if profiles.insert(k, profile).is_some() {
                anyhow::bail!("Duplicate jurisdiction profile for {}", location);
            }
        }
        Ok(profiles)
    }

    fn replace_all(&self, profiles: HashMap<ProfileKey, JurisdictionProfile>) {
        *self.profiles.write() = profiles;
    }
}

#[async_trait]
impl JurisdictionRuleProvider for YamlJurisdictionProvider {
    async fn get_profile(
        &self,
        state: &str,
        county: Option<&str>,
    ) -> Result<Option<JurisdictionProfile>, RepositoryError> {
        let profiles = self.profiles.read();
        let county_key = key(state, county);
        if county_key.1.is_some() {
            if let Some(profile) = profiles.get(&county_key) {
                return Ok(Some(profile.clone()));
            }
        }
        let found = profiles.get(&key(state, None)).cloned();
        debug!(state, county, found = found.is_some(), "Jurisdiction profile lookup");
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::legal_stage::LegalStage;
    use std::io::Write;

    const PROFILES: &str = r#"
- state: TX
  required_fields:
    ASSIGNED: [assignment.assigneeName]
- state: tx
  county: Harris
  required_fields:
    CLOSED: [title.titleCompany]
  flags:
    attorney_closing: true
"#;

    #[tokio::test]
    async fn test_county_profile_preferred_then_state() {
        let provider = YamlJurisdictionProvider::from_yaml_str(PROFILES).unwrap();
        assert_eq!(provider.len(), 2);

        let harris = provider.get_profile("TX", Some("harris ")).await.unwrap().unwrap();
        assert!(harris.flags.attorney_closing);
        assert_eq!(harris.required_for(LegalStage::Closed).len(), 1);

        let dallas = provider.get_profile("tx", Some("Dallas")).await.unwrap().unwrap();
        assert!(!dallas.flags.attorney_closing);
        assert_eq!(dallas.required_for(LegalStage::Assigned).len(), 1);

        assert!(provider.get_profile("OH", None).await.unwrap().is_none());
    }

    #[test]
    fn test_invalid_documents_rejected() {
        assert!(YamlJurisdictionProvider::from_yaml_str(
            "- state: TX\n  required_fields:\n    CLOSED: [title.color]\n"
        )
        .is_err());
        assert!(YamlJurisdictionProvider::from_yaml_str("- state: TX\n- state: tx\n").is_err());
        assert!(YamlJurisdictionProvider::from_yaml_str("- state: Texas\n").is_err());
    }

    #[tokio::test]
    async fn test_reload_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(PROFILES.as_bytes()).unwrap();

        let provider = YamlJurisdictionProvider::empty();
        provider.reload(file.path()).unwrap();
        assert_eq!(provider.len(), 2);

        let loaded = YamlJurisdictionProvider::from_yaml_file(file.path()).unwrap();
        assert!(loaded.get_profile("TX", None).await.unwrap().is_some());
    }
}
