//! IdP Bridge SDK
//!
//! Public contracts of the `idp-bridge` module:
//!
//! - [`ExternalAuthClient`], [`SamlHost`], [`ExtensionScriptService`] - collaborators the bridge consumes
//! - [`ClaimTranslator`] - plugin API for claim translators
//! - [`CorrelationToken`], [`ExternalProfile`], [`PrincipalRecord`] - domain models
//! - [`TranslateAttributesContext`], [`ReleaseAttributesContext`] - extension script contexts
//! - [`ClientError`], [`HostError`], [`HookError`], [`TranslationError`] - error types

pub mod api;
pub mod context;
pub mod error;
pub mod models;
pub mod plugin_api;

pub use api::{ExtensionScriptService, ExternalAuthClient, SamlHost};
pub use context::{ReleaseAttributesContext, TranslateAttributesContext};
pub use error::{ClientError, HookError, HostError, TranslationError};
pub use models::{
    AuthnErrorCode, AuthnRequestInfo, AuthnResult, BridgeRequest, ClaimValue, ConversationKey,
    CorrelationParam, CorrelationToken, ExternalProfile, OidcCredentials, PrincipalRecord,
    SessionId,
};
pub use plugin_api::ClaimTranslator;
