//! Post-processing of attributes released to a relying party.

use std::sync::Arc;

use idp_bridge_sdk::{PrincipalRecord, ReleaseAttributesContext};

use crate::hooks::{ExtensionHooks, HookOutcome};

/// Runs the default release processing, then the attribute-release hook.
#[derive(Debug, Clone)]
pub struct AttributeReleasePostProcessor {
    hooks: Arc<ExtensionHooks>,
}

impl AttributeReleasePostProcessor {
    #[must_use]
    pub fn new(hooks: Arc<ExtensionHooks>) -> Self {
        Self { hooks }
    }

    /// Process `principal`'s attributes in place before release to
    /// `relying_party_id`.
    ///
    /// Empty attributes never survive, including ones a script leaves behind.
    pub fn process(&self, relying_party_id: &str, principal: &mut PrincipalRecord) -> HookOutcome<()> {
        Self::drop_empty(relying_party_id, principal);

        tracing::debug!(
            relying_party = relying_party_id,
            principal = %principal.principal_name,
            attributes = ?principal.attributes.keys().collect::<Vec<_>>(),
            "Releasing attributes"
        );

        let PrincipalRecord {
            principal_name,
            attributes,
        } = principal;
        let principal_name: &str = principal_name;
        let outcome = self.hooks.release_attributes(move || ReleaseAttributesContext {
            relying_party_id,
            principal_name,
            attributes,
        });

        if !matches!(outcome, HookOutcome::Disabled) {
            Self::drop_empty(relying_party_id, principal);
        }
        outcome
    }

    fn drop_empty(relying_party_id: &str, principal: &mut PrincipalRecord) {
        for name in principal.drop_empty_attributes() {
            tracing::warn!(
                relying_party = relying_party_id,
                attribute = %name,
                "Dropping attribute with no values"
            );
        }
    }
}
