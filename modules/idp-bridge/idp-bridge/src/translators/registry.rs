use std::collections::HashMap;
use std::sync::Arc;

use idp_bridge_sdk::ClaimTranslator;
use serde_json::Value;

use crate::config::TranslatorEntry;
use crate::config_error::ConfigError;

use super::{AttributeMappingTranslator, StaticAttributesTranslator, TranslatorChain};

/// Builds a translator from its configured options.
pub type TranslatorConstructor = fn(&Value) -> Result<Arc<dyn ClaimTranslator>, ConfigError>;

/// Static registry of translator constructors, keyed by identifier.
pub struct TranslatorRegistry {
    constructors: HashMap<String, TranslatorConstructor>,
}

impl Default for TranslatorRegistry {
    /// Registry with the built-in extra translators.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(AttributeMappingTranslator::ID, |options| {
            Ok(Arc::new(AttributeMappingTranslator::from_options(options)?))
        });
        registry.register(StaticAttributesTranslator::ID, |options| {
            Ok(Arc::new(StaticAttributesTranslator::from_options(options)?))
        });
        registry
    }
}

impl TranslatorRegistry {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Register a constructor, replacing any previous one with the same id.
    pub fn register(&mut self, id: impl Into<String>, constructor: TranslatorConstructor) {
        let id = id.into();
        if self.contains(&id) {
            tracing::warn!(translator = %id, "Replacing claim translator constructor");
        }
        self.constructors.insert(id, constructor);
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.constructors.contains_key(id)
    }

    /// Construct one translator.
    ///
    /// # Errors
    /// Returns [`ConfigError::UnknownTranslator`] for an unregistered id, or the
    /// constructor's own error.
    pub fn construct(&self, entry: &TranslatorEntry) -> Result<Arc<dyn ClaimTranslator>, ConfigError> {
        let constructor = self
            .constructors
            .get(&entry.id)
            .ok_or_else(|| ConfigError::UnknownTranslator(entry.id.clone()))?;
        constructor(&entry.options)
    }

    /// Build the chain: the default translator first, then each configured
    /// entry in order. An entry that fails to construct is logged and skipped.
    #[must_use]
    pub fn build_chain(&self, entries: &[TranslatorEntry]) -> TranslatorChain {
        let extras = entries
            .iter()
            .filter_map(|entry| match self.construct(entry) {
                Ok(translator) => {
                    tracing::debug!(translator = %entry.id, "Registered claim translator");
                    Some(translator)
                }
                Err(e) => {
                    tracing::error!(
                        translator = %entry.id,
                        error = %e,
                        "Failed to load claim translator, skipping"
                    );
                    None
                }
            })
            .collect();

        let chain = TranslatorChain::with_extras(extras);
        tracing::info!(translators = ?chain.names(), "Claim translator chain initialized");
        chain
    }
}
