#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]
#![allow(clippy::doc_markdown)]
#![allow(clippy::module_name_repetitions)]

//! OCSP certificate revocation verification
//!
//! Decides whether a TLS peer's certificate has been revoked by querying
//! OCSP responders, following a two-axis policy:
//!
//! - [`RequiredPolicy`]: how many responders must confirm (`yes`, `no`, `all`)
//! - [`FromCertPolicy`]: how responders listed in the certificate are used
//!   (`use`, `trust`, `prefer`, `ignore`)
//!
//! ```no_run
//! use cryypt_ocsp::{CertificateChain, DefaultOcspClient, OcspConfig, OcspVerifier};
//!
//! # async fn run(chain_pem: &str) -> Result<(), Box<dyn std::error::Error>> {
//! let config = OcspConfig::new("http://ocsp.example.com", "yes", "prefer")?;
//! let verifier = OcspVerifier::new(config, DefaultOcspClient::new()?);
//!
//! let chain = CertificateChain::from_pem(chain_pem)?;
//! let confirmations = verifier.verify(&chain).await?;
//! println!("{confirmations} responder(s) confirmed the certificate");
//! # Ok(())
//! # }
//! ```

pub mod certificate;
pub mod client;
pub mod codec;
pub mod config;
pub mod errors;
pub mod http_client;
pub mod observer;
pub mod verifier;

pub use certificate::CertificateChain;
pub use client::{DefaultOcspClient, OcspClient};
pub use codec::{OcspResponse, ResponderOutcome};
pub use config::{ClientSettings, FromCertPolicy, OcspConfig, OcspSettings, RequiredPolicy};
pub use errors::{ConfigError, QueryError, VerifyError};
pub use observer::{NoopObserver, OcspEvent, OcspObserver, Placement, TracingObserver};
pub use verifier::{CandidateOrigin, OcspVerifier, ResponderCandidate};
