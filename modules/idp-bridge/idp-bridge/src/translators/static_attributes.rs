use std::collections::BTreeMap;

use idp_bridge_sdk::{ClaimTranslator, ExternalProfile, PrincipalRecord, TranslationError};
use serde::Deserialize;
use serde_json::Value;

use crate::config_error::ConfigError;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Options {
    attributes: BTreeMap<String, Vec<String>>,
}

/// Adds a fixed set of attributes to every principal.
#[derive(Debug, Clone)]
pub struct StaticAttributesTranslator {
    attributes: BTreeMap<String, Vec<String>>,
}

impl StaticAttributesTranslator {
    pub const ID: &'static str = "static-attributes";

    /// Attributes with no values are discarded up front.
    #[must_use]
    pub fn new(attributes: BTreeMap<String, Vec<String>>) -> Self {
        Self {
            attributes: attributes
                .into_iter()
                .filter(|(_, values)| !values.is_empty())
                .collect(),
        }
    }

    /// Build from registry options: `{ "attributes": { "o": ["acme"] } }`.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidTranslatorOptions`] if the options do not parse.
    pub fn from_options(options: &Value) -> Result<Self, ConfigError> {
        let parsed = Options::deserialize(options).map_err(|e| {
            ConfigError::InvalidTranslatorOptions {
                id: Self::ID.to_owned(),
                message: e.to_string(),
            }
        })?;
        Ok(Self::new(parsed.attributes))
    }
}

impl ClaimTranslator for StaticAttributesTranslator {
    fn name(&self) -> &str {
        Self::ID
    }

    fn translate(&self, profile: &ExternalProfile) -> Result<PrincipalRecord, TranslationError> {
        let mut record = PrincipalRecord::bare(profile.subject_id.clone());
        for (name, values) in &self.attributes {
            record.add_values(name.clone(), values.iter().cloned());
        }
        Ok(record)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_adds_fixed_attributes() {
        let translator = StaticAttributesTranslator::from_options(&json!({
            "attributes": { "o": ["acme"], "empty": [] }
        }))
        .unwrap();

        let record = translator.translate(&ExternalProfile::new("user-1")).unwrap();
        assert_eq!(record.principal_name, "user-1");
        assert_eq!(record.attributes["o"], vec!["acme"]);
        assert!(!record.attributes.contains_key("empty"));
    }

    #[test]
    fn test_rejects_non_list_values() {
        assert!(matches!(
            StaticAttributesTranslator::from_options(&json!({ "attributes": { "o": "acme" } })),
            Err(ConfigError::InvalidTranslatorOptions { .. })
        ));
    }
}
