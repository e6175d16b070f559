use idp_bridge_sdk::{ClientError, HookError, HostError, TranslationError};
use thiserror::Error;

/// Failures raised while handling one bridge request
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The response state does not belong to the in-flight login.
    #[error("state mismatch: {0}")]
    StateMismatch(String),

    /// Claims could not be resolved into a principal.
    #[error("invalid external profile: {0}")]
    InvalidExternalProfile(String),

    /// A correlation token was present but could not be decoded.
    #[error("malformed correlation token: {0}")]
    MalformedCorrelationToken(String),

    #[error("extension hook failed: {0}")]
    HookInvocation(#[from] HookError),

    /// The request did not identify a host conversation.
    #[error("missing conversation: {0}")]
    MissingConversation(String),

    /// A collaborator failed outside any recoverable step.
    #[error("unexpected dispatch failure: {0}")]
    UnexpectedDispatch(String),

    #[error("redirect construction failed: {0}")]
    RedirectConstruction(String),
}

impl BridgeError {
    /// Whether the bridge can carry on with a safe default (retry the login,
    /// use raw parameters, run default logic).
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            BridgeError::StateMismatch(_)
                | BridgeError::MalformedCorrelationToken(_)
                | BridgeError::HookInvocation(_)
        )
    }
}

impl From<TranslationError> for BridgeError {
    fn from(err: TranslationError) -> Self {
        BridgeError::InvalidExternalProfile(err.to_string())
    }
}

impl From<HostError> for BridgeError {
    fn from(err: HostError) -> Self {
        match err {
            HostError::MissingConversation(id) => BridgeError::MissingConversation(id),
            HostError::Internal(msg) => BridgeError::UnexpectedDispatch(msg),
        }
    }
}

impl From<ClientError> for BridgeError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Redirect(msg) => BridgeError::RedirectConstruction(msg),
            ClientError::Credentials(msg) | ClientError::Profile(msg) => {
                BridgeError::InvalidExternalProfile(msg)
            }
            ClientError::Session(msg) | ClientError::Internal(msg) => {
                BridgeError::UnexpectedDispatch(msg)
            }
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(BridgeError::StateMismatch("x".into()).is_recoverable());
        assert!(BridgeError::MalformedCorrelationToken("x".into()).is_recoverable());
        assert!(
            BridgeError::HookInvocation(HookError::NoResult {
                hook: "translate".into()
            })
            .is_recoverable()
        );

        assert!(!BridgeError::InvalidExternalProfile("x".into()).is_recoverable());
        assert!(!BridgeError::UnexpectedDispatch("x".into()).is_recoverable());
        assert!(!BridgeError::RedirectConstruction("x".into()).is_recoverable());
        assert!(!BridgeError::MissingConversation("x".into()).is_recoverable());
    }

    #[test]
    fn test_client_errors_map_to_taxonomy() {
        let err: BridgeError = ClientError::Redirect("no endpoint".into()).into();
        assert!(matches!(err, BridgeError::RedirectConstruction(_)));

        let err: BridgeError = ClientError::Profile("userinfo 500".into()).into();
        assert!(matches!(err, BridgeError::InvalidExternalProfile(_)));

        let err: BridgeError = HostError::MissingConversation("e1s1".into()).into();
        assert!(matches!(err, BridgeError::MissingConversation(id) if id == "e1s1"));
    }
}
