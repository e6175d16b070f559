//! Claim translator chain.
//!
//! The default translator always runs first and its failure fails the
//! translation. Extra translators contribute attributes on top; one that
//! fails is logged and skipped.

pub mod attribute_mapping;
pub mod authenticated_name;
pub mod registry;
pub mod static_attributes;

use std::sync::Arc;

use idp_bridge_sdk::{ClaimTranslator, ExternalProfile, PrincipalRecord, TranslationError};

pub use attribute_mapping::AttributeMappingTranslator;
pub use authenticated_name::AuthenticatedNameTranslator;
pub use registry::{TranslatorConstructor, TranslatorRegistry};
pub use static_attributes::StaticAttributesTranslator;

/// Ordered, read-only set of translators built once at startup.
pub struct TranslatorChain {
    default: Arc<dyn ClaimTranslator>,
    extras: Vec<Arc<dyn ClaimTranslator>>,
}

impl Default for TranslatorChain {
    fn default() -> Self {
        Self::with_extras(Vec::new())
    }
}

impl TranslatorChain {
    #[must_use]
    pub fn with_extras(extras: Vec<Arc<dyn ClaimTranslator>>) -> Self {
        Self {
            default: Arc::new(AuthenticatedNameTranslator),
            extras,
        }
    }

    /// Translator names in execution order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        std::iter::once(self.default.name())
            .chain(self.extras.iter().map(|t| t.name()))
            .collect()
    }

    /// Run every translator and merge their outputs.
    ///
    /// The principal name comes from the default translator. Attribute-bearing
    /// outputs are unioned; a bare-name output only survives if nothing in the
    /// chain produced attributes, in which case the result is that bare name.
    ///
    /// # Errors
    /// Returns [`TranslationError::InvalidProfile`] when the profile has no
    /// subject id, or the default translator's error.
    pub fn translate(&self, profile: &ExternalProfile) -> Result<PrincipalRecord, TranslationError> {
        if !profile.has_subject() {
            return Err(TranslationError::InvalidProfile(
                "missing subject id".into(),
            ));
        }

        let mut merged = self.default.translate(profile)?;
        for translator in &self.extras {
            match translator.translate(profile) {
                Ok(record) if record.is_bare() => {}
                Ok(record) => merged.merge(record),
                Err(e) => tracing::warn!(
                    translator = translator.name(),
                    subject = %profile.subject_id,
                    error = %e,
                    "Claim translator failed, skipping its contribution"
                ),
            }
        }
        Ok(merged)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use idp_bridge_sdk::ClaimValue;
    use std::collections::BTreeMap;

    struct Failing;

    impl ClaimTranslator for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn translate(&self, _: &ExternalProfile) -> Result<PrincipalRecord, TranslationError> {
            Err(TranslationError::Translator {
                translator: "failing".into(),
                message: "directory unreachable".into(),
            })
        }
    }

    struct Renamer;

    impl ClaimTranslator for Renamer {
        fn name(&self) -> &str {
            "renamer"
        }

        fn translate(&self, _: &ExternalProfile) -> Result<PrincipalRecord, TranslationError> {
            Ok(PrincipalRecord::bare("someone-else"))
        }
    }

    #[test]
    fn test_empty_claims_degrade_to_bare_principal() {
        let chain = TranslatorChain::default();
        let record = chain.translate(&ExternalProfile::new("user-1")).unwrap();
        assert_eq!(record, PrincipalRecord::bare("user-1"));
    }

    #[test]
    fn test_missing_subject_fails_before_any_translator() {
        let chain = TranslatorChain::with_extras(vec![Arc::new(Failing)]);
        let err = chain.translate(&ExternalProfile::new("")).unwrap_err();
        assert!(matches!(err, TranslationError::InvalidProfile(_)));
    }

    #[test]
    fn test_extras_union_attributes() {
        let chain = TranslatorChain::with_extras(vec![Arc::new(StaticAttributesTranslator::new(
            BTreeMap::from([("o".to_owned(), vec!["acme".to_owned()])]),
        ))]);
        let profile =
            ExternalProfile::new("user-1").with_claim("email", ClaimValue::Single("a@b.c".into()));

        let record = chain.translate(&profile).unwrap();
        assert_eq!(record.principal_name, "user-1");
        assert_eq!(record.attributes["email"], vec!["a@b.c"]);
        assert_eq!(record.attributes["o"], vec!["acme"]);
    }

    #[test]
    fn test_attributes_supersede_bare_output() {
        let chain = TranslatorChain::with_extras(vec![
            Arc::new(Renamer),
            Arc::new(StaticAttributesTranslator::new(BTreeMap::from([(
                "o".to_owned(),
                vec!["acme".to_owned()],
            )]))),
        ]);

        let record = chain.translate(&ExternalProfile::new("user-1")).unwrap();
        assert_eq!(record.principal_name, "user-1");
        assert_eq!(record.attributes.len(), 1);
    }

    #[test]
    fn test_failing_extra_is_skipped() {
        let chain = TranslatorChain::with_extras(vec![Arc::new(Failing)]);
        let record = chain.translate(&ExternalProfile::new("user-1")).unwrap();
        assert_eq!(record, PrincipalRecord::bare("user-1"));
        assert_eq!(chain.names(), vec!["authenticated-name", "failing"]);
    }
}
