//! Collaborator contracts consumed by the bridge.
//!
//! The bridge owns none of these. The hosting runtime wires concrete
//! implementations in when it constructs the controller.

use std::collections::HashMap;

use async_trait::async_trait;
use url::Url;

use crate::context::{ReleaseAttributesContext, TranslateAttributesContext};
use crate::error::{ClientError, HookError, HostError};
use crate::models::{
    AuthnRequestInfo, AuthnResult, BridgeRequest, ConversationKey, ExternalProfile,
    OidcCredentials, SessionId,
};

/// OpenID Connect client used to drive the external login.
///
/// Code exchange, token validation and profile retrieval happen behind this
/// trait; the bridge only consumes their results.
#[async_trait]
pub trait ExternalAuthClient: Send + Sync {
    /// Whether `request` carries authorization-response markers.
    fn is_authorization_response(&self, request: &BridgeRequest) -> bool;

    /// Client-side check of the response `state` against the client's own
    /// record of the outstanding request.
    ///
    /// # Errors
    /// Returns [`ClientError`] if the check itself could not be performed.
    async fn is_valid_request_state(&self, request: &BridgeRequest) -> Result<bool, ClientError>;

    /// Extract credentials from an authorization response.
    ///
    /// # Errors
    /// Returns [`ClientError::Credentials`] when the response carries none.
    async fn get_credentials(&self, request: &BridgeRequest)
    -> Result<OidcCredentials, ClientError>;

    /// Exchange credentials for the user's profile.
    ///
    /// `Ok(None)` means the exchange succeeded but yielded no usable profile.
    ///
    /// # Errors
    /// Returns [`ClientError::Profile`] if the exchange fails.
    async fn get_user_profile(
        &self,
        credentials: &OidcCredentials,
        request: &BridgeRequest,
    ) -> Result<Option<ExternalProfile>, ClientError>;

    /// Build the authorization-endpoint redirect.
    ///
    /// `custom_headers` and `custom_params` are carried through the login round
    /// trip; `force_authn` asks the provider to re-authenticate the user.
    ///
    /// # Errors
    /// Returns [`ClientError::Redirect`] if no URL can be built.
    async fn get_redirection_url(
        &self,
        request: &BridgeRequest,
        custom_headers: &HashMap<String, String>,
        custom_params: &HashMap<String, String>,
        force_authn: bool,
    ) -> Result<Url, ClientError>;

    /// Build the end-session redirect for the current session.
    ///
    /// # Errors
    /// Returns [`ClientError::Redirect`] if no URL can be built.
    async fn get_logout_redirection_url(&self, request: &BridgeRequest)
    -> Result<Url, ClientError>;

    /// Read a client session attribute.
    fn session_attribute(&self, session: &SessionId, name: &str) -> Option<String>;

    /// Write a client session attribute.
    ///
    /// # Errors
    /// Returns [`ClientError::Session`] if the session store rejects the write.
    fn set_session_attribute(
        &self,
        session: &SessionId,
        name: &str,
        value: String,
    ) -> Result<(), ClientError>;

    /// Remove a client session attribute, returning its previous value.
    fn remove_session_attribute(&self, session: &SessionId, name: &str) -> Option<String>;

    /// Drop all local authorization state held for `session`.
    ///
    /// # Errors
    /// Returns [`ClientError::Session`] if the store could not be cleared.
    fn clear_session(&self, session: &SessionId) -> Result<(), ClientError>;
}

/// The SAML identity provider runtime hosting the bridge.
pub trait SamlHost: Send + Sync {
    /// Begin (or rejoin) the external-authentication conversation for
    /// `conversation_id`.
    ///
    /// # Errors
    /// Returns [`HostError::MissingConversation`] if the host has no such
    /// conversation.
    fn start_conversation(&self, conversation_id: &str) -> Result<ConversationKey, HostError>;

    /// Read the inbound SAML authentication request of a conversation.
    ///
    /// # Errors
    /// Returns [`HostError`] if the conversation has no request attached.
    fn authn_request(&self, key: &ConversationKey) -> Result<AuthnRequestInfo, HostError>;

    /// Write the authentication result into the conversation's result slot.
    ///
    /// # Errors
    /// Returns [`HostError`] if the slot cannot be written.
    fn complete(&self, key: &ConversationKey, result: AuthnResult) -> Result<(), HostError>;

    /// Close the conversation and return where the browser resumes.
    ///
    /// # Errors
    /// Returns [`HostError`] if the conversation cannot be closed.
    fn finish_conversation(&self, key: &ConversationKey) -> Result<Url, HostError>;
}

/// Runtime that executes externally supplied override scripts.
///
/// Both `invoke_*` methods return `Ok(true)` when the script handled the
/// decision point and `Ok(false)` when the built-in logic should run.
pub trait ExtensionScriptService: Send + Sync {
    /// Whether any override script is loaded and active.
    fn is_enabled(&self) -> bool;

    /// Run the translation override.
    ///
    /// # Errors
    /// Returns [`HookError`] if the script fails.
    fn invoke_translate(&self, context: &mut TranslateAttributesContext<'_>)
    -> Result<bool, HookError>;

    /// Run the attribute-release override.
    ///
    /// # Errors
    /// Returns [`HookError`] if the script fails.
    fn invoke_attribute_release(
        &self,
        context: &mut ReleaseAttributesContext<'_>,
    ) -> Result<bool, HookError>;
}
