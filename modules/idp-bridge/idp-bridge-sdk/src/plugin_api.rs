use crate::error::TranslationError;
use crate::models::{ExternalProfile, PrincipalRecord};

/// A member of the claim translator chain.
///
/// Translators are pure: the same profile always yields the same record and
/// nothing outside the return value is touched.
pub trait ClaimTranslator: Send + Sync {
    /// Registry identifier, used in logs.
    fn name(&self) -> &str;

    /// Map an external profile to a principal record.
    ///
    /// # Errors
    /// Returns [`TranslationError`] if the profile cannot be mapped.
    fn translate(&self, profile: &ExternalProfile) -> Result<PrincipalRecord, TranslationError>;
}
