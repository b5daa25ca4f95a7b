//! Structured verification events
//!
//! The verifier reports each policy decision as an [`OcspEvent`] to an
//! injected [`OcspObserver`] instead of logging directly.

use std::sync::Arc;

use crate::errors::QueryError;
use crate::verifier::CandidateOrigin;

/// Where a planned responder was placed in the query order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Added after the responders planned so far
    Appended,
    /// Added before the responders planned so far
    Prepended,
}

/// A single step of one verification
#[derive(Debug)]
pub enum OcspEvent<'a> {
    /// Verification of a subject certificate begins
    VerificationStarted {
        /// Subject common name, empty if absent
        common_name: &'a str,
    },
    /// Responder URLs found in the subject's Authority Information Access extension
    CertificateResponders {
        /// URLs in listing order
        urls: &'a [String],
    },
    /// Certificate responders were present but the policy ignores them
    IgnoredCertificateResponders {
        /// Number of URLs skipped
        count: usize,
    },
    /// A responder was added to the query plan
    CandidatePlanned {
        /// Responder URL
        url: &'a str,
        /// Where the URL came from
        origin: CandidateOrigin,
        /// Where it went in the order
        placement: Placement,
    },
    /// A responder is about to be queried
    QueryStarted {
        /// Responder URL
        url: &'a str,
    },
    /// A responder could not be queried or its answer was unusable
    QueryFailed {
        /// Responder URL
        url: &'a str,
        /// Failure cause
        error: &'a QueryError,
    },
    /// A responder confirmed the certificate as good
    Confirmed {
        /// Responder URL
        url: &'a str,
        /// Where the URL came from
        origin: CandidateOrigin,
    },
    /// A responder answered `unknown` and the policy tolerates it
    UnknownTolerated {
        /// Responder URL
        url: &'a str,
        /// Subject serial number, lowercase hex
        serial: &'a str,
    },
    /// Verification completed without a fatal outcome
    Finished {
        /// Total confirmations counted
        confirmations: usize,
    },
}

/// Receiver of verification events
pub trait OcspObserver: Send + Sync {
    /// Handle one event
    fn on_event(&self, event: &OcspEvent<'_>);
}

impl<T: OcspObserver + ?Sized> OcspObserver for Arc<T> {
    fn on_event(&self, event: &OcspEvent<'_>) {
        (**self).on_event(event);
    }
}

/// Forwards events to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl OcspObserver for TracingObserver {
    fn on_event(&self, event: &OcspEvent<'_>) {
        match event {
            OcspEvent::VerificationStarted { common_name } => {
                tracing::debug!("OCSP: verifying '{}'", common_name);
            }
            OcspEvent::CertificateResponders { urls } => {
                for url in urls.iter() {
                    tracing::debug!("OCSP: certificate contains OCSP URI: {}", url);
                }
            }
            OcspEvent::IgnoredCertificateResponders { count } => {
                tracing::debug!("OCSP: ignoring {} OCSP servers from certificate", count);
            }
            OcspEvent::CandidatePlanned {
                url,
                origin,
                placement,
            } => {
                let action = match placement {
                    Placement::Appended => "appending",
                    Placement::Prepended => "prepending",
                };
                tracing::debug!("OCSP: {} server {}, from {}", action, url, origin);
            }
            OcspEvent::QueryStarted { url } => {
                tracing::debug!("OCSP: trying server {}", url);
            }
            OcspEvent::QueryFailed { url, error } => {
                tracing::warn!(error = %error, "Cannot query OCSP server at {}", url);
            }
            OcspEvent::Confirmed { url, origin } => {
                tracing::debug!("OCSP: {} (from {}) confirmed certificate", url, origin);
            }
            OcspEvent::UnknownTolerated { url, serial } => {
                tracing::debug!("OCSP: {} does not know certificate 0x{}, tolerated", url, serial);
            }
            OcspEvent::Finished { confirmations } => {
                tracing::debug!("OCSP: verification finished with {} confirmation(s)", confirmations);
            }
        }
    }
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl OcspObserver for NoopObserver {
    fn on_event(&self, _event: &OcspEvent<'_>) {}
}
