use std::collections::BTreeMap;

use idp_bridge_sdk::{ClaimTranslator, ExternalProfile, PrincipalRecord, TranslationError};
use serde::Deserialize;
use serde_json::Value;

use crate::config_error::ConfigError;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Options {
    /// claim name -> SAML attribute name
    mappings: BTreeMap<String, String>,
}

/// Renames selected claims to SAML attribute names. Unmapped claims are
/// not released by this translator.
#[derive(Debug, Clone)]
pub struct AttributeMappingTranslator {
    mappings: BTreeMap<String, String>,
}

impl AttributeMappingTranslator {
    pub const ID: &'static str = "attribute-mapping";

    #[must_use]
    pub fn new(mappings: BTreeMap<String, String>) -> Self {
        Self { mappings }
    }

    /// Build from registry options: `{ "mappings": { "email": "mail" } }`.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidTranslatorOptions`] if the options do not
    /// parse or map a claim to an empty attribute name.
    pub fn from_options(options: &Value) -> Result<Self, ConfigError> {
        let parsed = Options::deserialize(options).map_err(|e| {
            ConfigError::InvalidTranslatorOptions {
                id: Self::ID.to_owned(),
                message: e.to_string(),
            }
        })?;
        if let Some((claim, _)) = parsed.mappings.iter().find(|(_, to)| to.trim().is_empty()) {
            return Err(ConfigError::InvalidTranslatorOptions {
                id: Self::ID.to_owned(),
                message: format!("claim '{claim}' maps to an empty attribute name"),
            });
        }
        Ok(Self::new(parsed.mappings))
    }
}

impl ClaimTranslator for AttributeMappingTranslator {
    fn name(&self) -> &str {
        Self::ID
    }

    fn translate(&self, profile: &ExternalProfile) -> Result<PrincipalRecord, TranslationError> {
        let mut record = PrincipalRecord::bare(profile.subject_id.clone());
        for (claim, attribute) in &self.mappings {
            if let Some(value) = profile.claims.get(claim) {
                record.add_values(attribute.clone(), value.values());
            }
        }
        Ok(record)
    }
}
