use idp_bridge_sdk::{ClaimTranslator, ExternalProfile, PrincipalRecord, TranslationError};

/// Default translator: the subject id becomes the principal name and every
/// claim becomes a same-named attribute.
///
/// Claims that resolve to no values are dropped with a warning.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthenticatedNameTranslator;

impl AuthenticatedNameTranslator {
    pub const ID: &'static str = "authenticated-name";
}

impl ClaimTranslator for AuthenticatedNameTranslator {
    fn name(&self) -> &str {
        Self::ID
    }

    fn translate(&self, profile: &ExternalProfile) -> Result<PrincipalRecord, TranslationError> {
        if !profile.has_subject() {
            return Err(TranslationError::InvalidProfile(
                "missing subject id".into(),
            ));
        }

        let mut record = PrincipalRecord::bare(profile.subject_id.clone());
        for (name, value) in &profile.claims {
            if !record.add_values(name.clone(), value.values()) {
                tracing::warn!(
                    attribute = %name,
                    subject = %profile.subject_id,
                    "Skipping attribute with no values"
                );
            }
        }

        tracing::info!(
            subject = %record.principal_name,
            attributes = record.attributes.len(),
            "Created principal from external profile"
        );
        Ok(record)
    }
}
