//! OCSP policy configuration
//!
//! Two independent axes govern verification: [`RequiredPolicy`] decides how
//! many responders must confirm a certificate, [`FromCertPolicy`] decides
//! whether responders listed in the certificate itself are consulted and in
//! which order relative to the configured one.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::ConfigError;

/// How many responders must confirm certificate validity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequiredPolicy {
    /// At least one responder must confirm; `unknown` is fatal
    Yes,
    /// Confirmation is optional; `unknown` is tolerated
    No,
    /// Every contacted responder must be reachable and confirm
    All,
}

impl RequiredPolicy {
    /// Canonical configuration spelling
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::No => "no",
            Self::All => "all",
        }
    }
}

impl FromStr for RequiredPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "yes" | "true" => Ok(Self::Yes),
            "no" | "false" => Ok(Self::No),
            "all" => Ok(Self::All),
            other => Err(ConfigError::InvalidRequiredPolicy(other.to_string())),
        }
    }
}

impl fmt::Display for RequiredPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Treatment of responder URLs embedded in the certificate (Authority Information Access)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FromCertPolicy {
    /// Configured responder first, certificate responders after it
    Use,
    /// Certificate responders are trusted and checked before the configured one
    Trust,
    /// Certificate responders take priority over the configured one
    Prefer,
    /// Certificate responders are never queried
    Ignore,
}

impl FromCertPolicy {
    /// Canonical configuration spelling
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Use => "use",
            Self::Trust => "trust",
            Self::Prefer => "prefer",
            Self::Ignore => "ignore",
        }
    }

    /// Whether the configured responder goes after the certificate responders
    #[must_use]
    pub fn config_responder_last(self) -> bool {
        matches!(self, Self::Prefer | Self::Trust)
    }
}

impl FromStr for FromCertPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "use" => Ok(Self::Use),
            "trust" => Ok(Self::Trust),
            "prefer" => Ok(Self::Prefer),
            "ignore" => Ok(Self::Ignore),
            other => Err(ConfigError::InvalidFromCertPolicy(other.to_string())),
        }
    }
}

impl fmt::Display for FromCertPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw OCSP settings as they come from the surrounding configuration layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcspSettings {
    /// Responder URL, empty when none is configured
    pub url: String,
    /// `yes` / `true`, `no` / `false`, or `all`
    pub required: String,
    /// `use`, `trust`, `prefer` or `ignore`
    pub from_cert: String,
}

impl Default for OcspSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            required: RequiredPolicy::No.as_str().to_string(),
            from_cert: FromCertPolicy::Prefer.as_str().to_string(),
        }
    }
}

/// Validated, immutable OCSP policy shared by all verifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcspConfig {
    responder_url: Option<String>,
    required: RequiredPolicy,
    from_cert: FromCertPolicy,
}

impl OcspConfig {
    /// Parse and validate the three configuration inputs
    ///
    /// An empty `url` means no responder is configured. The responder is not
    /// contacted here.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the URL is non-empty and not an absolute
    /// `http` / `https` URL with a host, or if either policy string is not
    /// recognized.
    pub fn new(url: &str, required: &str, from_cert: &str) -> Result<Self, ConfigError> {
        let responder_url = if url.is_empty() {
            None
        } else {
            validate_responder_url(url)?;
            Some(url.to_string())
        };

        let required = required.parse::<RequiredPolicy>()?;
        let from_cert = from_cert.parse::<FromCertPolicy>()?;

        let config = Self {
            responder_url,
            required,
            from_cert,
        };
        config.log_policy();
        Ok(config)
    }

    /// Validate deserialized [`OcspSettings`]
    ///
    /// # Errors
    ///
    /// Same as [`OcspConfig::new`].
    pub fn from_settings(settings: &OcspSettings) -> Result<Self, ConfigError> {
        Self::new(&settings.url, &settings.required, &settings.from_cert)
    }

    /// Configured responder URL, if any
    #[must_use]
    pub fn responder_url(&self) -> Option<&str> {
        self.responder_url.as_deref()
    }

    /// Confirmation requirement
    #[must_use]
    pub fn required(&self) -> RequiredPolicy {
        self.required
    }

    /// Handling of certificate-embedded responders
    #[must_use]
    pub fn from_cert(&self) -> FromCertPolicy {
        self.from_cert
    }

    fn log_policy(&self) {
        if let Some(url) = &self.responder_url {
            tracing::debug!("OCSP: using responder '{}'", url);
        }

        match self.required {
            RequiredPolicy::Yes => {
                tracing::debug!("OCSP: at least one responder should confirm certificate validity");
            }
            RequiredPolicy::No => {
                tracing::debug!("OCSP: allowing certificates not known by the responder");
            }
            RequiredPolicy::All => {
                tracing::debug!("OCSP: requiring positive response from all responders");
            }
        }

        match self.from_cert {
            FromCertPolicy::Use => tracing::debug!(
                "OCSP: using responders listed in certificates if none is configured first"
            ),
            FromCertPolicy::Trust => {
                tracing::debug!("OCSP: trusting responses from responders listed in certificates");
            }
            FromCertPolicy::Prefer => tracing::debug!(
                "OCSP: responders from certificates are prioritized over the configured one"
            ),
            FromCertPolicy::Ignore => {
                tracing::debug!("OCSP: ignoring responders listed in certificates");
            }
        }
    }
}

fn validate_responder_url(url: &str) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidResponderUrl {
        url: url.to_string(),
        reason,
    };

    let parsed = Url::parse(url).map_err(|e| invalid(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(format!("unsupported scheme '{other}'"))),
    }
    match parsed.host_str() {
        Some(host) if !host.is_empty() => Ok(()),
        _ => Err(invalid("missing host".to_string())),
    }
}

impl TryFrom<&OcspSettings> for OcspConfig {
    type Error = ConfigError;

    fn try_from(settings: &OcspSettings) -> Result<Self, Self::Error> {
        Self::from_settings(settings)
    }
}

/// HTTP transport settings for [`crate::DefaultOcspClient`]
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Total request timeout
    pub timeout: Duration,
    /// `User-Agent` header value
    pub user_agent: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: "cryypt-ocsp/1.0".to_string(),
        }
    }
}
