//! Authentication bridge controller.
//!
//! One call to [`BridgeController::handle`] handles one inbound request and
//! yields a [`BridgeOutcome`] for the HTTP layer to render.
//!
//! ```text
//! Idle -> RedirectIssued -> ResponseReceived -> StateValid -> ClaimsResolved -> Completed
//!                                           \-> StateInvalid -> RedirectIssued (retry)
//!                                           \-> ClaimsInvalid -> Failed
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use idp_bridge_sdk::{
    AuthnErrorCode, AuthnResult, BridgeRequest, ConversationKey, CorrelationParam,
    CorrelationToken, ExtensionScriptService, ExternalAuthClient, PrincipalRecord, SamlHost,
    TranslateAttributesContext,
};
use url::Url;

use crate::config::BridgeConfig;
use crate::config_error::ConfigError;
use crate::conversation::ConversationGuard;
use crate::correlator::{DecodedState, ParamLookup, StateCorrelator};
use crate::error::BridgeError;
use crate::hooks::{ExtensionHooks, HookOutcome};
use crate::logout::LogoutCoordinator;
use crate::release::AttributeReleasePostProcessor;
use crate::translators::{TranslatorChain, TranslatorRegistry};

/// Client session attribute holding the encoded in-flight correlation token.
pub const CORRELATION_SESSION_ATTRIBUTE: &str = "idp_bridge.correlation";

/// Request kinds, decided from the path below the mount point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeRoute {
    /// Login start or authorization response
    Authn,
    /// Bridge-initiated logout
    Logout,
    /// Provider-initiated logout notification
    ReverseLogout,
}

impl BridgeRoute {
    #[must_use]
    pub fn from_path(path: &str) -> Self {
        match path.trim_end_matches('/').rsplit_once("/logout") {
            Some((_, "")) => BridgeRoute::Logout,
            Some((_, "/sso")) => BridgeRoute::ReverseLogout,
            _ => BridgeRoute::Authn,
        }
    }
}

/// Terminal response of one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeOutcome {
    /// Send the browser to the provider's authorization endpoint.
    LoginRedirect {
        location: Url,
        conversation: ConversationKey,
    },
    /// The conversation is finished; send the browser back to the host.
    Resume { location: Url, result: AuthnResult },
    /// Send the browser to the provider's end-session endpoint.
    LogoutRedirect { location: Url },
    /// No external session exists; nothing to do.
    LogoutNotNeeded,
    /// Echo of a bridge-initiated logout; already handled.
    LogoutEchoSuppressed,
    /// Genuine provider-initiated logout; hand over to the host.
    ForwardToHostLogout { path: String },
    /// Render the static error view.
    ErrorPage { status: u16 },
}

/// The request-handling state machine
pub struct BridgeController {
    config: BridgeConfig,
    client: Arc<dyn ExternalAuthClient>,
    host: Arc<dyn SamlHost>,
    correlator: StateCorrelator,
    translators: TranslatorChain,
    hooks: Arc<ExtensionHooks>,
    release: AttributeReleasePostProcessor,
    logout: LogoutCoordinator,
}

impl std::fmt::Debug for BridgeController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeController")
            .field("config", &self.config)
            .field("correlator", &self.correlator)
            .field("translators", &self.translators.names())
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

impl BridgeController {
    /// Build a controller with the built-in translator registry.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if `config` does not validate.
    pub fn new(
        config: BridgeConfig,
        client: Arc<dyn ExternalAuthClient>,
        host: Arc<dyn SamlHost>,
        hooks_service: Option<Arc<dyn ExtensionScriptService>>,
    ) -> Result<Self, ConfigError> {
        Self::with_registry(
            config,
            client,
            host,
            hooks_service,
            &TranslatorRegistry::default(),
        )
    }

    /// Build a controller resolving extra translators from `registry`.
    ///
    /// The translator chain and both hook points are resolved here, once.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if `config` does not validate.
    pub fn with_registry(
        config: BridgeConfig,
        client: Arc<dyn ExternalAuthClient>,
        host: Arc<dyn SamlHost>,
        hooks_service: Option<Arc<dyn ExtensionScriptService>>,
        registry: &TranslatorRegistry,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let hooks = Arc::new(ExtensionHooks::resolve(config.hooks, hooks_service));
        let controller = Self {
            correlator: StateCorrelator::new(&config.state),
            translators: registry.build_chain(&config.translators),
            release: AttributeReleasePostProcessor::new(hooks.clone()),
            logout: LogoutCoordinator::new(config.logout.echo_ttl()),
            hooks,
            client,
            host,
            config,
        };

        tracing::info!(
            signed_state = controller.correlator.is_signed(),
            translators = ?controller.translators.names(),
            "Authentication bridge initialized"
        );
        Ok(controller)
    }

    #[must_use]
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    #[must_use]
    pub fn logout_coordinator(&self) -> &LogoutCoordinator {
        &self.logout
    }

    /// Handle one request. Never fails: every error ends in an outcome.
    pub async fn handle(&self, request: &BridgeRequest) -> BridgeOutcome {
        match BridgeRoute::from_path(&request.path) {
            BridgeRoute::Logout => self.start_logout(request).await,
            BridgeRoute::ReverseLogout => self.reverse_logout(request),
            BridgeRoute::Authn => self.authenticate(request).await,
        }
    }

    /// Post-process attributes about to be released to `relying_party_id`.
    ///
    /// Default processing always runs; the outcome reports what the
    /// attribute-release hook did on top of it.
    pub fn release_attributes(
        &self,
        relying_party_id: &str,
        principal: &mut PrincipalRecord,
    ) -> HookOutcome<()> {
        self.release.process(relying_party_id, principal)
    }

    async fn authenticate(&self, request: &BridgeRequest) -> BridgeOutcome {
        let decoded = self.decode_state(request);
        let lookup = ParamLookup::new(request, decoded.token());

        let Some((conversation_id, source)) = lookup.conversation_id() else {
            let error = BridgeError::MissingConversation("request carries no conversation id".into());
            tracing::error!(session = %request.session_id, error = %error, "Cannot dispatch request");
            return self.error_page();
        };
        tracing::debug!(conversation_id, source = ?source, "Resolved conversation id");

        let guard = match ConversationGuard::start(self.host.clone(), conversation_id) {
            Ok(guard) => guard,
            Err(e) => {
                let error = BridgeError::from(e);
                tracing::error!(conversation_id, error = %error, "Cannot start conversation");
                return self.error_page();
            }
        };

        if !self.client.is_authorization_response(request) {
            return self.login_redirect(request, guard).await;
        }

        if let Err(error) = self.validate_state(request, &lookup).await {
            if !error.is_recoverable() {
                return self.fail_conversation(guard, &error);
            }
            tracing::warn!(
                conversation = %guard.key(),
                error = %error,
                "Response state rejected, restarting login"
            );
            return self.login_redirect(request, guard).await;
        }

        self.complete_authentication(request, guard).await
    }

    fn decode_state(&self, request: &BridgeRequest) -> DecodedState {
        let Some(raw) = request.param(CorrelationParam::STATE) else {
            return DecodedState::NotRecognized;
        };

        let decoded = self.correlator.decode(raw);
        match &decoded {
            DecodedState::Decoded(token) => tracing::debug!(
                conversation_id = %token.conversation_id,
                "Decoded correlation state"
            ),
            DecodedState::NotRecognized => {
                tracing::debug!("State is not a correlation token, using request parameters");
            }
            DecodedState::Invalid(reason) => {
                let error = BridgeError::MalformedCorrelationToken(reason.clone());
                tracing::debug!(error = %error, "Falling back to request parameters");
            }
        }
        decoded
    }

    async fn login_redirect(&self, request: &BridgeRequest, guard: ConversationGuard) -> BridgeOutcome {
        match self.start_login(request, &guard).await {
            Ok(location) => BridgeOutcome::LoginRedirect {
                location,
                conversation: guard.keep_open(),
            },
            Err(error) => self.fail_conversation(guard, &error),
        }
    }

    async fn start_login(
        &self,
        request: &BridgeRequest,
        guard: &ConversationGuard,
    ) -> Result<Url, BridgeError> {
        let authn = self.host.authn_request(guard.key())?;
        let token = CorrelationToken::new(guard.conversation_id(), authn.relying_party_id)
            .with_acr_values(authn.requested_acr_values)
            .with_issuer(authn.issuer)
            .with_name_id_policy_qualifier(authn.name_id_policy_qualifier);

        let encoded = self.correlator.encode(&token)?;
        self.client.set_session_attribute(
            &request.session_id,
            CORRELATION_SESSION_ATTRIBUTE,
            encoded.clone(),
        )?;

        let headers = HashMap::from([(
            CorrelationParam::CONV_ID_HEADER.to_owned(),
            token.conversation_id.clone(),
        )]);
        let mut params = token.to_params();
        if self.correlator.is_signed() {
            params.insert(CorrelationParam::STATE.to_owned(), encoded);
        }

        let location = self
            .client
            .get_redirection_url(request, &headers, &params, authn.force_authn)
            .await?;

        tracing::debug!(
            conversation = %guard.key(),
            relying_party = %token.relying_party_id,
            force_authn = authn.force_authn,
            "Issuing login redirect"
        );
        Ok(location)
    }

    async fn validate_state(
        &self,
        request: &BridgeRequest,
        lookup: &ParamLookup<'_>,
    ) -> Result<(), BridgeError> {
        // Consumed whatever the verdict: a token is good for one response only.
        let in_flight = self
            .client
            .remove_session_attribute(&request.session_id, CORRELATION_SESSION_ATTRIBUTE);

        let client_accepts = self
            .client
            .is_valid_request_state(request)
            .await
            .map_err(|e| BridgeError::StateMismatch(format!("state check failed: {e}")))?;
        if !client_accepts {
            return Err(BridgeError::StateMismatch(
                "client rejected the response state".into(),
            ));
        }

        let in_flight = in_flight
            .ok_or_else(|| BridgeError::StateMismatch("no login in flight for session".into()))?;
        let in_flight = match self.correlator.decode(&in_flight) {
            DecodedState::Decoded(token) => token,
            DecodedState::NotRecognized => {
                return Err(BridgeError::StateMismatch(
                    "in-flight state is unreadable".into(),
                ));
            }
            DecodedState::Invalid(reason) => return Err(BridgeError::StateMismatch(reason)),
        };

        let response = lookup.response_token().ok_or_else(|| {
            BridgeError::StateMismatch("response carries no conversation id".into())
        })?;

        if StateCorrelator::matches(&in_flight, &response) {
            Ok(())
        } else {
            Err(BridgeError::StateMismatch(format!(
                "expected conversation {}, got {}",
                in_flight.conversation_id, response.conversation_id
            )))
        }
    }

    async fn complete_authentication(
        &self,
        request: &BridgeRequest,
        guard: ConversationGuard,
    ) -> BridgeOutcome {
        tracing::info!(conversation = %guard.key(), "Processing authorization response");

        let result = match self.resolve_principal(request, guard.key()).await {
            Ok(principal) => {
                tracing::info!(
                    conversation = %guard.key(),
                    principal = %principal.principal_name,
                    "External authentication succeeded"
                );
                AuthnResult::Authenticated(principal)
            }
            Err(error) => {
                tracing::error!(
                    conversation = %guard.key(),
                    error = %error,
                    "Failed to resolve external claims"
                );
                AuthnResult::Failed(AuthnErrorCode::InvalidToken)
            }
        };

        if let Err(e) = self.host.complete(guard.key(), result.clone()) {
            tracing::error!(conversation = %guard.key(), error = %e, "Failed to record authentication result");
            return self.error_page();
        }

        match guard.finish() {
            Ok(location) => BridgeOutcome::Resume { location, result },
            Err(e) => {
                tracing::error!(error = %e, "Failed to finish external authentication");
                self.error_page()
            }
        }
    }

    async fn resolve_principal(
        &self,
        request: &BridgeRequest,
        key: &ConversationKey,
    ) -> Result<PrincipalRecord, BridgeError> {
        let credentials = self.client.get_credentials(request).await?;
        tracing::debug!(client = %credentials.client_name, "Obtained credentials");

        let profile = self
            .client
            .get_user_profile(&credentials, request)
            .await?
            .ok_or_else(|| {
                BridgeError::InvalidExternalProfile("no profile for credentials".into())
            })?;

        match self
            .hooks
            .translate(|| TranslateAttributesContext::new(request, &profile, key))
        {
            HookOutcome::Handled(mut principal) => {
                principal.drop_empty_attributes();
                return Ok(principal);
            }
            HookOutcome::Failed(e) => Self::recover(key, BridgeError::from(e))?,
            HookOutcome::Disabled | HookOutcome::Declined => {}
        }

        Ok(self.translators.translate(&profile)?)
    }

    /// Absorb a recoverable failure so the default path runs; surface the rest.
    fn recover(conversation: &ConversationKey, error: BridgeError) -> Result<(), BridgeError> {
        if error.is_recoverable() {
            tracing::debug!(conversation = %conversation, error = %error, "Continuing with default logic");
            Ok(())
        } else {
            Err(error)
        }
    }

    fn fail_conversation(&self, guard: ConversationGuard, error: &BridgeError) -> BridgeOutcome {
        tracing::error!(conversation = %guard.key(), error = %error, "Authentication dispatch failed");
        if let Err(e) = self.host.complete(
            guard.key(),
            AuthnResult::Failed(AuthnErrorCode::AuthnException),
        ) {
            tracing::error!(conversation = %guard.key(), error = %e, "Failed to report authentication exception");
        }
        // Finishes the conversation.
        drop(guard);
        self.error_page()
    }

    async fn start_logout(&self, request: &BridgeRequest) -> BridgeOutcome {
        let session = &request.session_id;
        if self
            .client
            .session_attribute(session, &self.config.session.id_token_attribute)
            .is_none()
        {
            tracing::debug!(session = %session, "No external session, logout not needed");
            return BridgeOutcome::LogoutNotNeeded;
        }

        let location = match self.client.get_logout_redirection_url(request).await {
            Ok(location) => location,
            Err(e) => {
                let error = BridgeError::RedirectConstruction(e.to_string());
                tracing::error!(session = %session, error = %error, "Cannot start external logout");
                return self.error_page();
            }
        };

        self.logout.mark_initiated(session);
        if let Err(e) = self.client.clear_session(session) {
            tracing::error!(session = %session, error = %e, "Failed to clear local authorization state");
        }

        tracing::info!(session = %session, "Redirecting to external logout");
        BridgeOutcome::LogoutRedirect { location }
    }

    fn reverse_logout(&self, request: &BridgeRequest) -> BridgeOutcome {
        if self.logout.consume(&request.session_id) {
            tracing::debug!(session = %request.session_id, "Ignoring echo of bridge-initiated logout");
            BridgeOutcome::LogoutEchoSuppressed
        } else {
            tracing::info!(session = %request.session_id, "Forwarding provider-initiated logout to host");
            BridgeOutcome::ForwardToHostLogout {
                path: self.config.logout.host_logout_path.clone(),
            }
        }
    }

    fn error_page(&self) -> BridgeOutcome {
        BridgeOutcome::ErrorPage {
            status: self.config.error_page_status,
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_route_from_path() {
        assert_eq!(BridgeRoute::from_path("/"), BridgeRoute::Authn);
        assert_eq!(BridgeRoute::from_path(""), BridgeRoute::Authn);
        assert_eq!(BridgeRoute::from_path("/start-or-callback"), BridgeRoute::Authn);
        assert_eq!(BridgeRoute::from_path("/logout"), BridgeRoute::Logout);
        assert_eq!(BridgeRoute::from_path("/logout/"), BridgeRoute::Logout);
        assert_eq!(BridgeRoute::from_path("/oxauth/logout"), BridgeRoute::Logout);
        assert_eq!(BridgeRoute::from_path("/logout/sso"), BridgeRoute::ReverseLogout);
        assert_eq!(BridgeRoute::from_path("/logout/sso/"), BridgeRoute::ReverseLogout);
        assert_eq!(BridgeRoute::from_path("/logouts"), BridgeRoute::Authn);
        assert_eq!(BridgeRoute::from_path("/logout/other"), BridgeRoute::Authn);
    }
}
