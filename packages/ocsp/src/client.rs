//! OCSP responder client
//!
//! [`OcspClient`] is the seam between the verifier and the network: the
//! verifier only ever talks to a responder through it, so tests and
//! alternative transports can substitute their own implementation.

use std::sync::Arc;

use async_trait::async_trait;
use x509_cert::Certificate;

use crate::codec::{self, OcspResponse};
use crate::config::ClientSettings;
use crate::errors::QueryError;
use crate::http_client::OcspHttpClient;

/// Performs a single OCSP exchange with one responder
#[async_trait]
pub trait OcspClient: Send + Sync {
    /// Ask `responder_url` about `subject`, issued by `issuer`
    ///
    /// `common_name` identifies the subject in diagnostics only.
    async fn query(
        &self,
        common_name: &str,
        subject: &Certificate,
        issuer: &Certificate,
        responder_url: &str,
    ) -> Result<OcspResponse, QueryError>;
}

#[async_trait]
impl<T: OcspClient + ?Sized> OcspClient for Arc<T> {
    async fn query(
        &self,
        common_name: &str,
        subject: &Certificate,
        issuer: &Certificate,
        responder_url: &str,
    ) -> Result<OcspResponse, QueryError> {
        (**self)
            .query(common_name, subject, issuer, responder_url)
            .await
    }
}

/// OCSP over HTTP POST with SHA-256 certificate identifiers
#[derive(Clone, Debug)]
pub struct DefaultOcspClient {
    http_client: OcspHttpClient,
}

impl DefaultOcspClient {
    /// Create a client with default transport settings
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::HttpClientInit`] if the HTTP client cannot be built.
    pub fn new() -> Result<Self, QueryError> {
        Self::with_settings(&ClientSettings::default())
    }

    /// Create a client with explicit transport settings
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::HttpClientInit`] if the HTTP client cannot be built.
    pub fn with_settings(settings: &ClientSettings) -> Result<Self, QueryError> {
        Ok(Self {
            http_client: OcspHttpClient::new(settings)?,
        })
    }
}

#[async_trait]
impl OcspClient for DefaultOcspClient {
    async fn query(
        &self,
        common_name: &str,
        subject: &Certificate,
        issuer: &Certificate,
        responder_url: &str,
    ) -> Result<OcspResponse, QueryError> {
        let request = codec::encode_request(subject, issuer)?;
        tracing::trace!(
            "OCSP: sending {} byte request for '{}' to {}",
            request.len(),
            common_name,
            responder_url
        );

        let body = self.http_client.post_ocsp(responder_url, request).await?;
        codec::decode_response(&body, subject, issuer)
    }
}
