//! Correlation state encoding, decoding and matching.
//!
//! With signing on, the correlation token travels as an HS256 JWT whose claim
//! names mirror the discrete parameter names and whose ACR values stay a JSON
//! array. With signing off, it is a plain JSON object. Either way the discrete parameters are sent as well, and
//! [`ParamLookup`] prefers decoded claims over raw request values.

use std::collections::HashMap;

use idp_bridge_sdk::{BridgeRequest, CorrelationParam, CorrelationToken};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, decode_header, encode,
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::config::StateConfig;
use crate::error::BridgeError;

/// Outcome of decoding a wire state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedState {
    /// A well-formed, verified token.
    Decoded(CorrelationToken),
    /// The input is not in the expected format (opaque or foreign state).
    NotRecognized,
    /// The input looks like ours but failed verification, expired, or is incomplete.
    Invalid(String),
}

impl DecodedState {
    #[must_use]
    pub fn token(&self) -> Option<&CorrelationToken> {
        match self {
            DecodedState::Decoded(token) => Some(token),
            DecodedState::NotRecognized | DecodedState::Invalid(_) => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StateClaims {
    conv_id: String,
    entity_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    acr_values: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    issuer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name_id_policy_qualifier: Option<String>,
    iat: i64,
    exp: i64,
}

impl StateClaims {
    fn from_token(token: &CorrelationToken, issued_at: i64, ttl_seconds: i64) -> Self {
        Self {
            conv_id: token.conversation_id.clone(),
            entity_id: token.relying_party_id.clone(),
            acr_values: token.requested_acr_values.clone(),
            issuer_id: token.issuer.clone(),
            name_id_policy_qualifier: token.name_id_policy_qualifier.clone(),
            iat: issued_at,
            exp: issued_at.saturating_add(ttl_seconds),
        }
    }

    fn into_token(self) -> CorrelationToken {
        CorrelationToken::new(self.conv_id, self.entity_id)
            .with_acr_values(self.acr_values)
            .with_issuer(self.issuer_id)
            .with_name_id_policy_qualifier(self.name_id_policy_qualifier)
    }
}

struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

/// Encodes, decodes and matches correlation tokens.
pub struct StateCorrelator {
    keys: Option<SigningKeys>,
    ttl_seconds: i64,
    leeway_seconds: u64,
}

impl std::fmt::Debug for StateCorrelator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateCorrelator")
            .field("signed", &self.keys.is_some())
            .field("ttl_seconds", &self.ttl_seconds)
            .field("leeway_seconds", &self.leeway_seconds)
            .finish()
    }
}

impl StateCorrelator {
    #[must_use]
    pub fn new(config: &StateConfig) -> Self {
        let keys = config.sign.then(|| {
            let secret = config.secret.expose_secret().as_bytes();
            SigningKeys {
                encoding: EncodingKey::from_secret(secret),
                decoding: DecodingKey::from_secret(secret),
            }
        });
        Self {
            keys,
            ttl_seconds: i64::try_from(config.ttl_seconds).unwrap_or(i64::MAX),
            leeway_seconds: config.leeway_seconds,
        }
    }

    /// Whether tokens are wrapped into a signed JWT.
    #[must_use]
    pub fn is_signed(&self) -> bool {
        self.keys.is_some()
    }

    /// Encode a token into its single-string wire form.
    ///
    /// # Errors
    /// Returns [`BridgeError::UnexpectedDispatch`] if the token cannot be serialized.
    pub fn encode(&self, token: &CorrelationToken) -> Result<String, BridgeError> {
        self.encode_at(token, OffsetDateTime::now_utc().unix_timestamp())
    }

    fn encode_at(&self, token: &CorrelationToken, issued_at: i64) -> Result<String, BridgeError> {
        match &self.keys {
            Some(keys) => {
                let claims = StateClaims::from_token(token, issued_at, self.ttl_seconds);
                encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding).map_err(|e| {
                    BridgeError::UnexpectedDispatch(format!("state encoding failed: {e}"))
                })
            }
            None => serde_json::to_string(token).map_err(|e| {
                BridgeError::UnexpectedDispatch(format!("state encoding failed: {e}"))
            }),
        }
    }

    /// Decode a wire state. Never fails: anything that is not ours is
    /// [`DecodedState::NotRecognized`].
    #[must_use]
    pub fn decode(&self, wire: &str) -> DecodedState {
        let wire = wire.trim();
        if wire.is_empty() {
            return DecodedState::NotRecognized;
        }
        match &self.keys {
            Some(keys) => self.decode_jwt(wire, &keys.decoding),
            None => Self::decode_plain(wire),
        }
    }

    fn decode_jwt(&self, wire: &str, key: &DecodingKey) -> DecodedState {
        if decode_header(wire).is_err() {
            return DecodedState::NotRecognized;
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = self.leeway_seconds;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp"]);

        match decode::<StateClaims>(wire, key, &validation) {
            Ok(data) if data.claims.iat > data.claims.exp => {
                DecodedState::Invalid("state issued after its expiry".into())
            }
            Ok(data) => Self::checked(data.claims.into_token()),
            Err(e) => DecodedState::Invalid(format!("state verification failed: {e}")),
        }
    }

    fn decode_plain(wire: &str) -> DecodedState {
        if !wire.starts_with('{') {
            return DecodedState::NotRecognized;
        }
        match serde_json::from_str::<CorrelationToken>(wire) {
            Ok(token) => Self::checked(token),
            Err(e) => DecodedState::Invalid(format!("state is not a correlation token: {e}")),
        }
    }

    fn checked(token: CorrelationToken) -> DecodedState {
        if token.conversation_id.trim().is_empty() {
            DecodedState::Invalid("state carries no conversation id".into())
        } else {
            DecodedState::Decoded(token)
        }
    }

    /// Whether `response` belongs to the login started with `in_flight`.
    #[must_use]
    pub fn matches(in_flight: &CorrelationToken, response: &CorrelationToken) -> bool {
        !in_flight.conversation_id.is_empty()
            && in_flight.conversation_id == response.conversation_id
    }
}

/// Where a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamSource {
    DecodedState,
    Query,
    Header,
}

/// Two-source parameter lookup: decoded state claims first, then raw
/// request parameters.
#[derive(Debug)]
pub struct ParamLookup<'a> {
    decoded: Option<HashMap<String, String>>,
    request: &'a BridgeRequest,
}

impl<'a> ParamLookup<'a> {
    #[must_use]
    pub fn new(request: &'a BridgeRequest, decoded: Option<&CorrelationToken>) -> Self {
        Self {
            decoded: decoded.map(CorrelationToken::to_params),
            request,
        }
    }

    /// `decoded.get(name) ?? raw.get(name)`
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.resolve_with_source(name).map(|(value, _)| value)
    }

    fn resolve_with_source(&self, name: &str) -> Option<(&str, ParamSource)> {
        self.decoded
            .as_ref()
            .and_then(|claims| claims.get(name))
            .map(|v| (v.as_str(), ParamSource::DecodedState))
            .or_else(|| self.request.param(name).map(|v| (v, ParamSource::Query)))
            .filter(|(v, _)| !v.is_empty())
    }

    /// Conversation id, falling back to the conversation-id header.
    #[must_use]
    pub fn conversation_id(&self) -> Option<(&str, ParamSource)> {
        self.resolve_with_source(CorrelationParam::CONV_ID).or_else(|| {
            self.request
                .header(CorrelationParam::CONV_ID_HEADER)
                .filter(|v| !v.is_empty())
                .map(|v| (v, ParamSource::Header))
        })
    }

    /// The correlation token the response claims to belong to.
    #[must_use]
    pub fn response_token(&self) -> Option<CorrelationToken> {
        let (conversation_id, _) = self.conversation_id()?;
        let token = CorrelationToken::new(
            conversation_id,
            self.resolve(CorrelationParam::ENTITY_ID).unwrap_or_default(),
        )
        .with_acr_values(
            self.resolve(CorrelationParam::ACR_VALUES)
                .map(CorrelationToken::parse_acr_values)
                .unwrap_or_default(),
        )
        .with_issuer(self.resolve(CorrelationParam::ISSUER).map(ToOwned::to_owned))
        .with_name_id_policy_qualifier(
            self.resolve(CorrelationParam::NAME_ID_POLICY)
                .map(ToOwned::to_owned),
        );
        Some(token)
    }
}
