#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

//! Fake collaborators shared by the integration tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use idp_bridge::{BridgeConfig, BridgeController, StateConfig};
use idp_bridge_sdk::{
    AuthnRequestInfo, AuthnResult, BridgeRequest, ClaimValue, ClientError, ConversationKey,
    ExtensionScriptService, ExternalAuthClient, ExternalProfile, HookError, HostError,
    OidcCredentials, PrincipalRecord, ReleaseAttributesContext, SamlHost, SessionId,
    TranslateAttributesContext,
};
use url::Url;

pub const SP_ENTITY_ID: &str = "https://sp.example.com/shibboleth";

/// Redirect parameters captured by [`FakeClient::get_redirection_url`].
#[derive(Debug, Clone, Default)]
pub struct CapturedRedirect {
    pub headers: HashMap<String, String>,
    pub params: HashMap<String, String>,
    pub force_authn: bool,
}

pub struct FakeClient {
    pub sessions: Mutex<HashMap<(SessionId, String), String>>,
    pub profile: Mutex<Option<ExternalProfile>>,
    pub reject_state: AtomicBool,
    pub state_check_fails: AtomicBool,
    pub redirect_fails: AtomicBool,
    pub logout_url_fails: AtomicBool,
    pub clear_fails: AtomicBool,
    pub credentials_calls: AtomicUsize,
    pub redirects: Mutex<Vec<CapturedRedirect>>,
}

impl Default for FakeClient {
    fn default() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            profile: Mutex::new(Some(default_profile())),
            reject_state: AtomicBool::new(false),
            state_check_fails: AtomicBool::new(false),
            redirect_fails: AtomicBool::new(false),
            logout_url_fails: AtomicBool::new(false),
            clear_fails: AtomicBool::new(false),
            credentials_calls: AtomicUsize::new(0),
            redirects: Mutex::new(Vec::new()),
        }
    }
}

impl FakeClient {
    pub fn set_profile(&self, profile: Option<ExternalProfile>) {
        *self.profile.lock().unwrap() = profile;
    }

    pub fn last_redirect(&self) -> CapturedRedirect {
        self.redirects
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no redirect issued")
    }

    pub fn redirect_count(&self) -> usize {
        self.redirects.lock().unwrap().len()
    }

    pub fn attribute(&self, session: &str, name: &str) -> Option<String> {
        self.sessions
            .lock()
            .unwrap()
            .get(&(SessionId::new(session), name.to_owned()))
            .cloned()
    }

    pub fn put_attribute(&self, session: &str, name: &str, value: &str) {
        self.sessions
            .lock()
            .unwrap()
            .insert((SessionId::new(session), name.to_owned()), value.to_owned());
    }
}

#[async_trait]
impl ExternalAuthClient for FakeClient {
    fn is_authorization_response(&self, request: &BridgeRequest) -> bool {
        request.param("code").is_some()
    }

    async fn is_valid_request_state(&self, _request: &BridgeRequest) -> Result<bool, ClientError> {
        if self.state_check_fails.load(Ordering::SeqCst) {
            return Err(ClientError::Internal("state store offline".into()));
        }
        Ok(!self.reject_state.load(Ordering::SeqCst))
    }

    async fn get_credentials(
        &self,
        request: &BridgeRequest,
    ) -> Result<OidcCredentials, ClientError> {
        self.credentials_calls.fetch_add(1, Ordering::SeqCst);
        request
            .param("code")
            .map(|code| OidcCredentials::new("fake-oidc", code))
            .ok_or_else(|| ClientError::Credentials("no code".into()))
    }

    async fn get_user_profile(
        &self,
        _credentials: &OidcCredentials,
        _request: &BridgeRequest,
    ) -> Result<Option<ExternalProfile>, ClientError> {
        Ok(self.profile.lock().unwrap().clone())
    }

    async fn get_redirection_url(
        &self,
        _request: &BridgeRequest,
        custom_headers: &HashMap<String, String>,
        custom_params: &HashMap<String, String>,
        force_authn: bool,
    ) -> Result<Url, ClientError> {
        if self.redirect_fails.load(Ordering::SeqCst) {
            return Err(ClientError::Redirect("authorization endpoint unknown".into()));
        }
        self.redirects.lock().unwrap().push(CapturedRedirect {
            headers: custom_headers.clone(),
            params: custom_params.clone(),
            force_authn,
        });

        let mut url = Url::parse("https://op.example.com/authorize").unwrap();
        let mut params: Vec<_> = custom_params.iter().collect();
        params.sort();
        url.query_pairs_mut()
            .append_pair("client_id", "saml-bridge")
            .extend_pairs(params);
        Ok(url)
    }

    async fn get_logout_redirection_url(
        &self,
        _request: &BridgeRequest,
    ) -> Result<Url, ClientError> {
        if self.logout_url_fails.load(Ordering::SeqCst) {
            return Err(ClientError::Internal("end_session_endpoint missing".into()));
        }
        Ok(Url::parse("https://op.example.com/end_session").unwrap())
    }

    fn session_attribute(&self, session: &SessionId, name: &str) -> Option<String> {
        self.sessions
            .lock()
            .unwrap()
            .get(&(session.clone(), name.to_owned()))
            .cloned()
    }

    fn set_session_attribute(
        &self,
        session: &SessionId,
        name: &str,
        value: String,
    ) -> Result<(), ClientError> {
        self.sessions
            .lock()
            .unwrap()
            .insert((session.clone(), name.to_owned()), value);
        Ok(())
    }

    fn remove_session_attribute(&self, session: &SessionId, name: &str) -> Option<String> {
        self.sessions
            .lock()
            .unwrap()
            .remove(&(session.clone(), name.to_owned()))
    }

    fn clear_session(&self, session: &SessionId) -> Result<(), ClientError> {
        self.sessions.lock().unwrap().retain(|(s, _), _| s != session);
        if self.clear_fails.load(Ordering::SeqCst) {
            return Err(ClientError::Session("session store read-only".into()));
        }
        Ok(())
    }
}

pub struct FakeHost {
    pub request: Mutex<AuthnRequestInfo>,
    pub completed: Mutex<Vec<(ConversationKey, AuthnResult)>>,
    pub finished: Mutex<Vec<ConversationKey>>,
}

impl Default for FakeHost {
    fn default() -> Self {
        Self {
            request: Mutex::new(AuthnRequestInfo {
                relying_party_id: SP_ENTITY_ID.to_owned(),
                requested_acr_values: vec!["urn:oasis:names:tc:SAML:2.0:ac:classes:Password".into()],
                issuer: Some("https://sp.example.com".into()),
                name_id_policy_qualifier: None,
                force_authn: false,
            }),
            completed: Mutex::new(Vec::new()),
            finished: Mutex::new(Vec::new()),
        }
    }
}

impl FakeHost {
    pub fn completed(&self) -> Vec<(ConversationKey, AuthnResult)> {
        self.completed.lock().unwrap().clone()
    }

    pub fn finished_count(&self) -> usize {
        self.finished.lock().unwrap().len()
    }
}

impl SamlHost for FakeHost {
    fn start_conversation(&self, conversation_id: &str) -> Result<ConversationKey, HostError> {
        if conversation_id.starts_with("unknown") {
            return Err(HostError::MissingConversation(conversation_id.to_owned()));
        }
        Ok(ConversationKey::new(format!("key-{conversation_id}")))
    }

    fn authn_request(&self, _key: &ConversationKey) -> Result<AuthnRequestInfo, HostError> {
        Ok(self.request.lock().unwrap().clone())
    }

    fn complete(&self, key: &ConversationKey, result: AuthnResult) -> Result<(), HostError> {
        self.completed.lock().unwrap().push((key.clone(), result));
        Ok(())
    }

    fn finish_conversation(&self, key: &ConversationKey) -> Result<Url, HostError> {
        self.finished.lock().unwrap().push(key.clone());
        Ok(Url::parse(&format!(
            "https://idp.example.com/idp/profile/SAML2/Redirect/SSO?execution={key}"
        ))
        .unwrap())
    }
}

/// Extension script service whose behavior is fixed at construction.
pub struct FakeScripts {
    pub enabled: bool,
    pub translate_result: Result<Option<PrincipalRecord>, String>,
    pub translate_calls: AtomicUsize,
}

impl FakeScripts {
    pub fn handling_with(principal: PrincipalRecord) -> Self {
        Self {
            enabled: true,
            translate_result: Ok(Some(principal)),
            translate_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            enabled: true,
            translate_result: Err(message.to_owned()),
            translate_calls: AtomicUsize::new(0),
        }
    }
}

impl ExtensionScriptService for FakeScripts {
    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn invoke_translate(
        &self,
        context: &mut TranslateAttributesContext<'_>,
    ) -> Result<bool, HookError> {
        self.translate_calls.fetch_add(1, Ordering::SeqCst);
        match &self.translate_result {
            Ok(Some(principal)) => {
                context.principal = Some(principal.clone());
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(message) => Err(HookError::Script {
                hook: "translate_attributes".into(),
                message: message.clone(),
            }),
        }
    }

    fn invoke_attribute_release(
        &self,
        _context: &mut ReleaseAttributesContext<'_>,
    ) -> Result<bool, HookError> {
        Ok(false)
    }
}

pub fn default_profile() -> ExternalProfile {
    ExternalProfile::new("jdoe")
        .with_claim("email", ClaimValue::Single("jdoe@example.com".into()))
        .with_claim(
            "groups",
            ClaimValue::Multiple(vec!["staff".into(), "admins".into()]),
        )
}

pub fn signed_config() -> BridgeConfig {
    BridgeConfig {
        state: StateConfig::signed("integration-test-key"),
        ..BridgeConfig::default()
    }
}

pub struct Harness {
    pub client: Arc<FakeClient>,
    pub host: Arc<FakeHost>,
    pub controller: BridgeController,
}

impl Harness {
    pub fn new(config: BridgeConfig) -> Self {
        Self::with_scripts(config, None)
    }

    pub fn with_scripts(config: BridgeConfig, scripts: Option<Arc<FakeScripts>>) -> Self {
        let client = Arc::new(FakeClient::default());
        let host = Arc::new(FakeHost::default());
        let controller = BridgeController::new(
            config,
            client.clone(),
            host.clone(),
            scripts.map(|s| s as Arc<dyn ExtensionScriptService>),
        )
        .unwrap();
        Self {
            client,
            host,
            controller,
        }
    }
}

pub fn request(path: &str, session: &str) -> BridgeRequest {
    BridgeRequest::new(path, SessionId::new(session))
}
