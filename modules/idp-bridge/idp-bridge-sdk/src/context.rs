//! Contexts handed to extension scripts.

use std::collections::BTreeMap;

use crate::models::{BridgeRequest, ConversationKey, ExternalProfile, PrincipalRecord};

/// Input and output slot of the translation override.
///
/// A script that reports "handled" must leave a principal in `principal`.
#[derive(Debug)]
pub struct TranslateAttributesContext<'a> {
    pub request: &'a BridgeRequest,
    pub profile: &'a ExternalProfile,
    pub conversation_key: &'a ConversationKey,
    pub principal: Option<PrincipalRecord>,
}

impl<'a> TranslateAttributesContext<'a> {
    #[must_use]
    pub fn new(
        request: &'a BridgeRequest,
        profile: &'a ExternalProfile,
        conversation_key: &'a ConversationKey,
    ) -> Self {
        Self {
            request,
            profile,
            conversation_key,
            principal: None,
        }
    }
}

/// Attributes about to be released to a relying party. The override may edit
/// `attributes` in place.
#[derive(Debug)]
pub struct ReleaseAttributesContext<'a> {
    pub relying_party_id: &'a str,
    pub principal_name: &'a str,
    pub attributes: &'a mut BTreeMap<String, Vec<String>>,
}
