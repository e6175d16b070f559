//! Authentication bridge between a SAML identity provider and an external
//! OpenID Connect provider.
//!
//! - [`BridgeController`] - request-handling state machine
//! - [`StateCorrelator`], [`ParamLookup`] - correlation state
//! - [`TranslatorChain`], [`TranslatorRegistry`] - claim translation
//! - [`ExtensionHooks`] - overridable decision points
//! - [`LogoutCoordinator`] - logout echo suppression
//! - [`BridgeConfig`] - configuration

pub mod config;
pub mod config_error;
pub mod controller;
pub mod conversation;
pub mod correlator;
pub mod error;
pub mod hooks;
pub mod logout;
pub mod release;
pub mod translators;

#[cfg(feature = "axum-ext")]
pub mod axum_ext;

pub use config::{
    BridgeConfig, HooksConfig, LogoutConfig, SessionConfig, StateConfig, TranslatorEntry,
};
pub use config_error::ConfigError;
pub use controller::{BridgeController, BridgeOutcome, BridgeRoute, CORRELATION_SESSION_ATTRIBUTE};
pub use conversation::ConversationGuard;
pub use correlator::{DecodedState, ParamLookup, ParamSource, StateCorrelator};
pub use error::BridgeError;
pub use hooks::{ExtensionHooks, HookOutcome, HookPoint};
pub use logout::LogoutCoordinator;
pub use release::AttributeReleasePostProcessor;
pub use translators::{
    AttributeMappingTranslator, AuthenticatedNameTranslator, StaticAttributesTranslator,
    TranslatorChain, TranslatorConstructor, TranslatorRegistry,
};
