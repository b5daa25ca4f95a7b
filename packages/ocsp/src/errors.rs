//! Error types for OCSP configuration, responder queries and verification

/// Invalid OCSP policy configuration. Raised while building [`crate::OcspConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The responder URL is non-empty but does not parse
    #[error("invalid responder URL '{url}': {reason}")]
    InvalidResponderUrl {
        /// The rejected input
        url: String,
        /// Parser diagnostic
        reason: String,
    },
    /// The `required` axis is not one of `yes`, `true`, `no`, `false`, `all`
    #[error("invalid required policy '{0}', should be one of 'yes', 'no', 'all'")]
    InvalidRequiredPolicy(String),
    /// The `from_cert` axis is not one of `use`, `trust`, `prefer`, `ignore`
    #[error("invalid fromCert policy '{0}', should be one of 'use', 'trust', 'prefer', 'ignore'")]
    InvalidFromCertPolicy(String),
}

/// Failure of a single responder exchange.
///
/// These never reach the caller of [`crate::OcspVerifier::verify`] directly: the
/// verifier either skips the responder or escalates to
/// [`VerifyError::ResponderUnavailable`].
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// Connection, DNS, TLS or HTTP-level failure
    #[error("OCSP transport error: {0}")]
    Transport(String),
    /// Request could not be built, or the response is not a valid OCSP response for this certificate
    #[error("OCSP protocol error: {0}")]
    Protocol(String),
    /// The HTTP transport could not be constructed
    #[error("HTTP client initialization failed: {context}")]
    HttpClientInit {
        /// Underlying builder error
        source: Box<dyn std::error::Error + Send + Sync>,
        /// What was being initialized
        context: &'static str,
    },
}

/// Fatal verification outcome. The connection must be rejected.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// A responder reported the certificate as revoked
    #[error("certificate 0x{serial} was revoked")]
    Revoked {
        /// Subject serial number, lowercase hex
        serial: String,
    },
    /// A responder does not know the certificate and the policy does not tolerate it
    #[error("responder {url} does not know certificate 0x{serial}")]
    UnknownCertificate {
        /// Responder that answered `unknown`
        url: String,
        /// Subject serial number, lowercase hex
        serial: String,
    },
    /// A responder could not be queried while every responder is required
    #[error("cannot query OCSP responder, all responders required")]
    ResponderUnavailable {
        /// Responder that failed
        url: String,
        /// Failure reported by the client
        #[source]
        source: QueryError,
    },
    /// The chain does not contain the subject and its issuer
    #[error("certificate chain must contain at least 2 certificates, got {0}")]
    InvalidChain(usize),
    /// A certificate in the chain could not be decoded
    #[error("certificate parsing failed: {0}")]
    CertificateParsing(String),
}
