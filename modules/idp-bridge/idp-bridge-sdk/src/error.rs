//! Error types reported by bridge collaborators.

use thiserror::Error;

/// Errors raised by the external OIDC client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The authorization response could not be turned into credentials.
    #[error("credentials unavailable: {0}")]
    Credentials(String),

    /// The userinfo / token exchange failed.
    #[error("profile retrieval failed: {0}")]
    Profile(String),

    /// The client could not build a redirect URL.
    #[error("redirect construction failed: {0}")]
    Redirect(String),

    /// Session attribute storage failed.
    #[error("session store error: {0}")]
    Session(String),

    /// Anything else.
    #[error("internal client error: {0}")]
    Internal(String),
}

/// Errors raised by the SAML host.
#[derive(Debug, Error)]
pub enum HostError {
    /// No external-authentication conversation exists for the given id.
    #[error("no conversation state for {0}")]
    MissingConversation(String),

    /// The host refused or failed to process the call.
    #[error("host error: {0}")]
    Internal(String),
}

/// Errors raised while invoking an extension hook.
#[derive(Debug, Error)]
pub enum HookError {
    /// The script itself reported a failure.
    #[error("hook '{hook}' failed: {message}")]
    Script { hook: String, message: String },

    /// The script returned success but left the context unusable.
    #[error("hook '{hook}' produced no result")]
    NoResult { hook: String },

    /// The script implementation panicked.
    #[error("hook '{hook}' panicked")]
    Panicked { hook: String },
}

/// Errors raised by claim translators.
#[derive(Debug, Error)]
pub enum TranslationError {
    /// The external profile cannot be translated.
    #[error("invalid external profile: {0}")]
    InvalidProfile(String),

    /// A translator-specific failure.
    #[error("translator '{translator}' failed: {message}")]
    Translator { translator: String, message: String },
}
