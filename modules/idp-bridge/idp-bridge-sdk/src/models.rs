//! Domain models shared by the bridge and its collaborators.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use http::HeaderMap;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TranslationError;

/// Opaque identifier of the browser session a request belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key of a host-side external-authentication conversation.
///
/// Returned by [`SamlHost::start_conversation`](crate::SamlHost::start_conversation)
/// and used for every later call about the same conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationKey(String);

impl ConversationKey {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One inbound HTTP request, stripped down to what the bridge reads.
#[derive(Debug, Clone)]
pub struct BridgeRequest {
    /// Request path below the bridge mount point.
    pub path: String,

    /// Session the request belongs to.
    pub session_id: SessionId,

    /// Query parameters (last value wins for repeated names).
    pub params: HashMap<String, String>,

    /// Request headers.
    pub headers: HeaderMap,
}

impl BridgeRequest {
    #[must_use]
    pub fn new(path: impl Into<String>, session_id: SessionId) -> Self {
        Self {
            path: path.into(),
            session_id,
            params: HashMap::new(),
            headers: HeaderMap::new(),
        }
    }

    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Add a header. Names or values that are not valid HTTP are ignored.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            http::header::HeaderName::from_bytes(name.as_bytes()),
            http::header::HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Wire names of the correlation values, shared by discrete parameters and
/// the claims of a JWT-wrapped state.
pub struct CorrelationParam;

impl CorrelationParam {
    /// Host conversation id.
    pub const CONV_ID: &'static str = "conv_id";

    /// Relying-party (SAML SP) entity id.
    pub const ENTITY_ID: &'static str = "entity_id";

    /// Requested authentication-context values, space-joined.
    pub const ACR_VALUES: &'static str = "acr_values";

    /// Issuer of the inbound SAML request.
    pub const ISSUER: &'static str = "issuer_id";

    /// `SPNameQualifier` of the requested name-id policy.
    pub const NAME_ID_POLICY: &'static str = "name_id_policy_qualifier";

    /// OAuth 2.0 `state` parameter.
    pub const STATE: &'static str = "state";

    /// Header that may carry the conversation id on the authorization response.
    pub const CONV_ID_HEADER: &'static str = "x-conv-id";
}

/// Data correlating an outbound login redirect with its inbound response.
///
/// Never mutated after creation. Encoded state keeps `requested_acr_values` as
/// a list; only the discrete `acr_values` parameter is space-joined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationToken {
    pub conversation_id: String,
    pub relying_party_id: String,
    #[serde(default)]
    pub requested_acr_values: Vec<String>,
    #[serde(default)]
    pub issuer: Option<String>,
    #[serde(default)]
    pub name_id_policy_qualifier: Option<String>,
}

impl CorrelationToken {
    #[must_use]
    pub fn new(conversation_id: impl Into<String>, relying_party_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            relying_party_id: relying_party_id.into(),
            requested_acr_values: Vec::new(),
            issuer: None,
            name_id_policy_qualifier: None,
        }
    }

    #[must_use]
    pub fn with_acr_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requested_acr_values = values.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_issuer(mut self, issuer: Option<String>) -> Self {
        self.issuer = issuer;
        self
    }

    #[must_use]
    pub fn with_name_id_policy_qualifier(mut self, qualifier: Option<String>) -> Self {
        self.name_id_policy_qualifier = qualifier;
        self
    }

    /// Space-joined ACR values, `None` when nothing was requested.
    #[must_use]
    pub fn acr_values_wire(&self) -> Option<String> {
        if self.requested_acr_values.is_empty() {
            None
        } else {
            Some(self.requested_acr_values.join(" "))
        }
    }

    /// Split a space-joined ACR value list.
    #[must_use]
    pub fn parse_acr_values(wire: &str) -> Vec<String> {
        wire.split_whitespace().map(ToOwned::to_owned).collect()
    }

    /// Discrete parameter form of the token; absent optionals are omitted.
    #[must_use]
    pub fn to_params(&self) -> HashMap<String, String> {
        let mut params = HashMap::new();
        params.insert(
            CorrelationParam::CONV_ID.to_owned(),
            self.conversation_id.clone(),
        );
        params.insert(
            CorrelationParam::ENTITY_ID.to_owned(),
            self.relying_party_id.clone(),
        );
        if let Some(acr) = self.acr_values_wire() {
            params.insert(CorrelationParam::ACR_VALUES.to_owned(), acr);
        }
        if let Some(issuer) = &self.issuer {
            params.insert(CorrelationParam::ISSUER.to_owned(), issuer.clone());
        }
        if let Some(qualifier) = &self.name_id_policy_qualifier {
            params.insert(CorrelationParam::NAME_ID_POLICY.to_owned(), qualifier.clone());
        }
        params
    }
}

/// A single claim value: either one string or an ordered list of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClaimValue {
    Single(String),
    Multiple(Vec<String>),
}

impl ClaimValue {
    /// All values in order. A `Single` yields exactly one element.
    #[must_use]
    pub fn values(&self) -> Vec<String> {
        match self {
            ClaimValue::Single(v) => vec![v.clone()],
            ClaimValue::Multiple(vs) => vs.clone(),
        }
    }

    /// Convert a JSON claim. Scalars become strings, arrays keep their scalar
    /// members in order; `null` and nested objects are not representable.
    #[must_use]
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Array(items) => Some(ClaimValue::Multiple(
                items.iter().filter_map(scalar_to_string).collect(),
            )),
            other => scalar_to_string(other).map(ClaimValue::Single),
        }
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Claims about a user returned by the external identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalProfile {
    pub subject_id: String,
    #[serde(default)]
    pub claims: BTreeMap<String, ClaimValue>,
}

impl ExternalProfile {
    #[must_use]
    pub fn new(subject_id: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            claims: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_claim(mut self, name: impl Into<String>, value: ClaimValue) -> Self {
        self.claims.insert(name.into(), value);
        self
    }

    /// Build a profile from a userinfo / id-token claims object.
    ///
    /// `sub` becomes the subject id; every other representable member becomes
    /// a claim.
    ///
    /// # Errors
    /// Returns [`TranslationError::InvalidProfile`] if `raw` is not an object
    /// or carries no non-empty string `sub`.
    pub fn from_json(raw: &Value) -> Result<Self, TranslationError> {
        let obj = raw
            .as_object()
            .ok_or_else(|| TranslationError::InvalidProfile("claims must be an object".into()))?;

        let subject_id = obj
            .get("sub")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| TranslationError::InvalidProfile("missing subject id".into()))?;

        let claims = obj
            .iter()
            .filter(|(name, _)| name.as_str() != "sub")
            .filter_map(|(name, value)| ClaimValue::from_json(value).map(|v| (name.clone(), v)))
            .collect();

        Ok(Self {
            subject_id: subject_id.to_owned(),
            claims,
        })
    }

    /// Whether the profile carries a usable subject id.
    #[must_use]
    pub fn has_subject(&self) -> bool {
        !self.subject_id.trim().is_empty()
    }
}

/// SAML-side representation of an authenticated identity.
///
/// Invariant: no attribute maps to an empty value list.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PrincipalRecord {
    pub principal_name: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, Vec<String>>,
}

impl PrincipalRecord {
    /// Principal with a name and no attributes.
    #[must_use]
    pub fn bare(principal_name: impl Into<String>) -> Self {
        Self {
            principal_name: principal_name.into(),
            attributes: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn is_bare(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Append values to an attribute, skipping duplicates. Returns `false`
    /// (and leaves the record untouched) when `values` is empty.
    pub fn add_values<I, S>(&mut self, name: impl Into<String>, values: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            return false;
        }
        let slot = self.attributes.entry(name.into()).or_default();
        for value in values {
            if !slot.contains(&value) {
                slot.push(value);
            }
        }
        true
    }

    /// Union another record's attributes into this one. The principal name
    /// of `self` is kept.
    pub fn merge(&mut self, other: PrincipalRecord) {
        for (name, values) in other.attributes {
            self.add_values(name, values);
        }
    }

    /// Drop attributes whose value list is empty. Returns the dropped names.
    pub fn drop_empty_attributes(&mut self) -> Vec<String> {
        let empty: Vec<String> = self
            .attributes
            .iter()
            .filter(|(_, values)| values.is_empty())
            .map(|(name, _)| name.clone())
            .collect();
        for name in &empty {
            self.attributes.remove(name);
        }
        empty
    }
}

/// Credentials obtained from the authorization response.
#[derive(Debug)]
pub struct OidcCredentials {
    /// Name of the OIDC client that handled the response.
    pub client_name: String,

    /// Authorization code (never logged).
    pub code: SecretString,
}

impl OidcCredentials {
    #[must_use]
    pub fn new(client_name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
            code: SecretString::from(code.into()),
        }
    }
}

/// Read-only view of the inbound SAML authentication request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuthnRequestInfo {
    pub relying_party_id: String,
    pub requested_acr_values: Vec<String>,
    pub issuer: Option<String>,
    pub name_id_policy_qualifier: Option<String>,
    pub force_authn: bool,
}

/// Error code written into the host's authentication-error slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthnErrorCode {
    /// Credentials or profile could not be turned into an identity.
    InvalidToken,
    /// Generic authentication failure during dispatch.
    AuthnException,
}

impl AuthnErrorCode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AuthnErrorCode::InvalidToken => "InvalidToken",
            AuthnErrorCode::AuthnException => "AuthenticationException",
        }
    }
}

impl fmt::Display for AuthnErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of an external authentication, as handed to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthnResult {
    Authenticated(PrincipalRecord),
    Failed(AuthnErrorCode),
}
