//! Bridge configuration.
//!
//! Loaded once at startup and passed down explicitly; nothing here is global.

use std::path::Path;
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Yaml};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::config_error::ConfigError;

/// Prefix of environment variables overriding file configuration,
/// e.g. `IDP_BRIDGE__STATE__TTL_SECONDS=120`.
pub const ENV_PREFIX: &str = "IDP_BRIDGE__";

/// Main bridge configuration
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// Correlation state encoding
    pub state: StateConfig,

    /// Extra claim translators, in chain order (the default translator is implicit)
    pub translators: Vec<TranslatorEntry>,

    /// Which hook points consult the extension script service
    pub hooks: HooksConfig,

    /// Logout coordination
    pub logout: LogoutConfig,

    /// Session plumbing shared with the external client
    pub session: SessionConfig,

    /// HTTP status of the static error page
    pub error_page_status: u16,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            state: StateConfig::default(),
            translators: Vec::new(),
            hooks: HooksConfig::default(),
            logout: LogoutConfig::default(),
            session: SessionConfig::default(),
            error_page_status: 500,
        }
    }
}

impl BridgeConfig {
    /// Load configuration from a YAML file overlaid with `IDP_BRIDGE__*`
    /// environment variables, then validate it.
    ///
    /// # Errors
    /// Returns [`ConfigError::Load`] if the sources cannot be parsed, or any
    /// validation error from [`validate`](Self::validate).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_figment(
            Figment::new()
                .merge(Yaml::file(path.as_ref()))
                .merge(Env::prefixed(ENV_PREFIX).split("__")),
        )
    }

    /// Extract and validate configuration from an already assembled figment.
    ///
    /// # Errors
    /// Returns [`ConfigError::Load`] on extraction failure, or any validation
    /// error from [`validate`](Self::validate).
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration for consistency
    ///
    /// # Errors
    /// Returns a [`ConfigError`] naming the first inconsistent section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.state.validate()?;

        if !self.logout.host_logout_path.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "logout.host_logout_path must be absolute, got '{}'",
                self.logout.host_logout_path
            )));
        }
        if self.session.cookie_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "session.cookie_name must not be empty".into(),
            ));
        }
        if self.session.id_token_attribute.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "session.id_token_attribute must not be empty".into(),
            ));
        }
        if !(400..=599).contains(&self.error_page_status) {
            return Err(ConfigError::Invalid(format!(
                "error_page_status must be an error status, got {}",
                self.error_page_status
            )));
        }
        if let Some(entry) = self.translators.iter().find(|t| t.id.trim().is_empty()) {
            return Err(ConfigError::UnknownTranslator(entry.id.clone()));
        }
        Ok(())
    }
}

/// Correlation-state configuration.
///
/// `Debug` never prints the secret.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StateConfig {
    /// Wrap the correlation token into a signed JWT `state` parameter
    pub sign: bool,

    /// HMAC key for the JWT state (required when `sign` is on)
    #[serde(deserialize_with = "deserialize_secret")]
    pub secret: SecretString,

    /// Lifetime of an issued state token
    pub ttl_seconds: u64,

    /// Clock skew tolerated when checking `exp`
    pub leeway_seconds: u64,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            sign: true,
            secret: SecretString::from(String::new()),
            ttl_seconds: 600,
            leeway_seconds: 30,
        }
    }
}

impl StateConfig {
    /// Signed state with the given key and default lifetimes.
    #[must_use]
    pub fn signed(secret: impl Into<String>) -> Self {
        Self {
            secret: SecretString::from(secret.into()),
            ..Self::default()
        }
    }

    /// Plain (unsigned) correlation parameters only.
    #[must_use]
    pub fn plain() -> Self {
        Self {
            sign: false,
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.sign && self.secret.expose_secret().is_empty() {
            return Err(ConfigError::InvalidState(
                "state.secret is required when state.sign is enabled".into(),
            ));
        }
        if self.ttl_seconds == 0 {
            return Err(ConfigError::InvalidState(
                "state.ttl_seconds must be positive".into(),
            ));
        }
        Ok(())
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

/// One extra translator in the chain
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TranslatorEntry {
    /// Registry identifier, e.g. `attribute-mapping`
    pub id: String,

    /// Translator-specific options
    #[serde(default)]
    pub options: Value,
}

impl TranslatorEntry {
    #[must_use]
    pub fn new(id: impl Into<String>, options: Value) -> Self {
        Self {
            id: id.into(),
            options,
        }
    }
}

/// Hook point selection
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HooksConfig {
    pub translation: bool,
    pub attribute_release: bool,
}

impl Default for HooksConfig {
    fn default() -> Self {
        Self {
            translation: true,
            attribute_release: true,
        }
    }
}

/// Logout coordination settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogoutConfig {
    /// Host logout endpoint that provider-initiated logouts are forwarded to
    pub host_logout_path: String,

    /// How long a bridge-initiated logout suppresses its echo
    pub echo_ttl_seconds: u64,
}

impl Default for LogoutConfig {
    fn default() -> Self {
        Self {
            host_logout_path: "/idp/profile/Logout".to_owned(),
            echo_ttl_seconds: 300,
        }
    }
}

impl LogoutConfig {
    #[must_use]
    pub fn echo_ttl(&self) -> Duration {
        Duration::from_secs(self.echo_ttl_seconds)
    }
}

/// Session plumbing
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Cookie carrying the session id on the HTTP surface
    pub cookie_name: String,

    /// Client session attribute whose presence means "externally logged in"
    pub id_token_attribute: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "idp_bridge_session".to_owned(),
            id_token_attribute: "id_token".to_owned(),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use figment::providers::Serialized;
    use serde_json::json;

    #[test]
    fn test_default_config() {
        let config = BridgeConfig::default();
        assert!(config.state.sign);
        assert_eq!(config.state.ttl_seconds, 600);
        assert_eq!(config.state.leeway_seconds, 30);
        assert!(config.hooks.translation);
        assert!(config.hooks.attribute_release);
        assert_eq!(config.logout.host_logout_path, "/idp/profile/Logout");
        assert_eq!(config.logout.echo_ttl_seconds, 300);
        assert_eq!(config.session.cookie_name, "idp_bridge_session");
        assert_eq!(config.error_page_status, 500);
        assert!(config.translators.is_empty());
    }

    #[test]
    fn test_signed_state_requires_secret() {
        let config = BridgeConfig::default();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidState(_)));

        let config = BridgeConfig {
            state: StateConfig::plain(),
            ..BridgeConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_relative_logout_path() {
        let config = BridgeConfig {
            state: StateConfig::signed("k"),
            logout: LogoutConfig {
                host_logout_path: "idp/logout".into(),
                echo_ttl_seconds: 1,
            },
            ..BridgeConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_from_figment_reads_nested_sections() {
        let figment = Figment::new().merge(Serialized::defaults(json!({
            "state": { "secret": "s3cr3t", "ttl_seconds": 120 },
            "translators": [
                { "id": "static-attributes", "options": { "attributes": { "o": ["acme"] } } }
            ],
            "hooks": { "attribute_release": false }
        })));

        let config = BridgeConfig::from_figment(figment).unwrap();
        assert_eq!(config.state.secret.expose_secret(), "s3cr3t");
        assert_eq!(config.state.ttl_seconds, 120);
        assert!(config.state.sign);
        assert_eq!(config.translators.len(), 1);
        assert_eq!(config.translators[0].id, "static-attributes");
        assert!(config.hooks.translation);
        assert!(!config.hooks.attribute_release);
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let figment = Figment::new().merge(Serialized::defaults(json!({
            "state": { "sign": false, "algorithm": "RS256" }
        })));
        assert!(matches!(
            BridgeConfig::from_figment(figment),
            Err(ConfigError::Load(_))
        ));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let state = StateConfig::signed("super-secret-key");
        let rendered = format!("{state:?}");
        assert!(!rendered.contains("super-secret-key"));
    }

    #[test]
    fn test_load_from_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.yaml");
        std::fs::write(
            &path,
            "state:\n  secret: from-file\nlogout:\n  echo_ttl_seconds: 42\n",
        )
        .unwrap();

        let config = BridgeConfig::load(&path).unwrap();
        assert_eq!(config.state.secret.expose_secret(), "from-file");
        assert_eq!(config.logout.echo_ttl(), Duration::from_secs(42));
    }
}
