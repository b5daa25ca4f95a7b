//! OCSP revocation verifier
//!
//! Plans which responders to ask and in what order, queries them one at a
//! time, and folds their answers into a single decision:
//!
//! - `revoked` from any responder is fatal under every policy
//! - `unknown` is fatal unless [`RequiredPolicy::No`]
//! - an unreachable or unusable responder is skipped, unless
//!   [`RequiredPolicy::All`], where it is fatal
//! - the first `good` ends the walk unless [`RequiredPolicy::All`]

use std::fmt;

use x509_cert::Certificate;

use crate::certificate::{common_name, ocsp_responder_urls, serial_hex, CertificateChain};
use crate::client::{DefaultOcspClient, OcspClient};
use crate::codec::ResponderOutcome;
use crate::config::{FromCertPolicy, OcspConfig, RequiredPolicy};
use crate::errors::VerifyError;
use crate::observer::{NoopObserver, OcspEvent, OcspObserver, Placement, TracingObserver};

/// Provenance of a planned responder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CandidateOrigin {
    /// The operator-configured responder URL
    Config,
    /// A URL from the subject's Authority Information Access extension
    Certificate,
}

impl fmt::Display for CandidateOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config => f.write_str("config"),
            Self::Certificate => f.write_str("cert"),
        }
    }
}

/// A responder to query, with its provenance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponderCandidate {
    /// Responder URL
    pub url: String,
    /// Where the URL came from
    pub origin: CandidateOrigin,
}

/// Checks certificate chains against OCSP responders according to an [`OcspConfig`]
///
/// The verifier holds no per-call state and can be shared (for example in an
/// `Arc`) across concurrent handshakes.
#[derive(Debug)]
pub struct OcspVerifier<C = DefaultOcspClient, O = TracingObserver> {
    config: OcspConfig,
    client: C,
    observer: O,
}

impl<C: OcspClient> OcspVerifier<C, TracingObserver> {
    /// Create a verifier reporting its decisions through `tracing`
    #[must_use]
    pub fn new(config: OcspConfig, client: C) -> Self {
        Self::with_observer(config, client, TracingObserver)
    }
}

impl<C: OcspClient, O: OcspObserver> OcspVerifier<C, O> {
    /// Create a verifier reporting its decisions to `observer`
    #[must_use]
    pub fn with_observer(config: OcspConfig, client: C, observer: O) -> Self {
        Self {
            config,
            client,
            observer,
        }
    }

    /// Policy in effect
    #[must_use]
    pub fn config(&self) -> &OcspConfig {
        &self.config
    }

    /// Ordered list of responders to query for `subject`
    ///
    /// Certificate responders keep their listing order. The configured
    /// responder goes after them under `prefer` / `trust` and before them
    /// under `use` / `ignore`. The same URL may appear twice.
    ///
    /// Emits no observer events; [`verify`](Self::verify) reports its own plan.
    pub fn plan_candidates(&self, subject: &Certificate) -> Vec<ResponderCandidate> {
        self.plan_with(subject, &NoopObserver)
    }

    fn plan_with(&self, subject: &Certificate, observer: &dyn OcspObserver) -> Vec<ResponderCandidate> {
        let from_cert = self.config.from_cert();
        let cert_urls = ocsp_responder_urls(subject);

        if !cert_urls.is_empty() {
            observer.on_event(&OcspEvent::CertificateResponders { urls: &cert_urls });
        }

        let mut candidates = Vec::with_capacity(cert_urls.len() + 1);

        if from_cert == FromCertPolicy::Ignore {
            if !cert_urls.is_empty() {
                observer.on_event(&OcspEvent::IgnoredCertificateResponders {
                    count: cert_urls.len(),
                });
            }
        } else {
            for url in cert_urls {
                observer.on_event(&OcspEvent::CandidatePlanned {
                    url: &url,
                    origin: CandidateOrigin::Certificate,
                    placement: Placement::Appended,
                });
                candidates.push(ResponderCandidate {
                    url,
                    origin: CandidateOrigin::Certificate,
                });
            }
        }

        if let Some(url) = self.config.responder_url() {
            let candidate = ResponderCandidate {
                url: url.to_string(),
                origin: CandidateOrigin::Config,
            };

            let placement = if from_cert.config_responder_last() {
                Placement::Appended
            } else {
                Placement::Prepended
            };
            observer.on_event(&OcspEvent::CandidatePlanned {
                url,
                origin: CandidateOrigin::Config,
                placement,
            });

            match placement {
                Placement::Appended => candidates.push(candidate),
                Placement::Prepended => candidates.insert(0, candidate),
            }
        }

        candidates
    }

    /// Verify that the subject of `chain` is not revoked
    ///
    /// Returns the number of responders that confirmed the certificate as
    /// good. Responders are queried strictly one after another.
    ///
    /// # Errors
    ///
    /// - [`VerifyError::Revoked`] if any queried responder reports the certificate revoked
    /// - [`VerifyError::UnknownCertificate`] if a responder answers `unknown`
    ///   and the policy is not [`RequiredPolicy::No`]
    /// - [`VerifyError::ResponderUnavailable`] if a responder fails under [`RequiredPolicy::All`]
    pub async fn verify(&self, chain: &CertificateChain) -> Result<usize, VerifyError> {
        let subject = chain.subject();
        let issuer = chain.issuer();
        let subject_name = common_name(&subject.tbs_certificate.subject).unwrap_or_default();
        let serial = serial_hex(&subject.tbs_certificate.serial_number);
        let required = self.config.required();

        self.observer.on_event(&OcspEvent::VerificationStarted {
            common_name: &subject_name,
        });

        let candidates = self.plan_with(subject, &self.observer);

        let mut confirmations_from_config = 0usize;
        let mut confirmations_from_certificate = 0usize;

        // TODO: skip URLs already queried in this call once the confirmation
        // counting for duplicated responders is settled.
        for candidate in &candidates {
            self.observer
                .on_event(&OcspEvent::QueryStarted { url: &candidate.url });

            let response = match self
                .client
                .query(&subject_name, subject, issuer, &candidate.url)
                .await
            {
                Ok(response) => response,
                Err(error) => {
                    self.observer.on_event(&OcspEvent::QueryFailed {
                        url: &candidate.url,
                        error: &error,
                    });
                    if required == RequiredPolicy::All {
                        return Err(VerifyError::ResponderUnavailable {
                            url: candidate.url.clone(),
                            source: error,
                        });
                    }
                    continue;
                }
            };

            match response.outcome {
                ResponderOutcome::Good => {
                    match candidate.origin {
                        CandidateOrigin::Config => confirmations_from_config += 1,
                        CandidateOrigin::Certificate => confirmations_from_certificate += 1,
                    }
                    self.observer.on_event(&OcspEvent::Confirmed {
                        url: &candidate.url,
                        origin: candidate.origin,
                    });

                    // One confirmation is enough unless every responder must confirm
                    if required != RequiredPolicy::All {
                        break;
                    }
                }
                ResponderOutcome::Revoked => {
                    return Err(VerifyError::Revoked { serial });
                }
                ResponderOutcome::Unknown => match required {
                    RequiredPolicy::No => {
                        self.observer.on_event(&OcspEvent::UnknownTolerated {
                            url: &candidate.url,
                            serial: &serial,
                        });
                    }
                    RequiredPolicy::Yes | RequiredPolicy::All => {
                        return Err(VerifyError::UnknownCertificate {
                            url: candidate.url.clone(),
                            serial,
                        });
                    }
                },
            }
        }

        let confirmations = confirmations_from_config + confirmations_from_certificate;
        self.observer
            .on_event(&OcspEvent::Finished { confirmations });
        Ok(confirmations)
    }

    /// Decode a DER chain (subject first) and [`verify`](Self::verify) it
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::CertificateParsing`] or [`VerifyError::InvalidChain`]
    /// if the chain cannot be built, otherwise the errors of [`verify`](Self::verify).
    pub async fn verify_der<T: AsRef<[u8]> + Sync>(&self, ders: &[T]) -> Result<usize, VerifyError> {
        let chain = CertificateChain::from_der(ders)?;
        self.verify(&chain).await
    }
}
