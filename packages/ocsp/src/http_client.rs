//! HTTP transport for OCSP requests

use reqwest::header::{ACCEPT, CONTENT_TYPE, HOST};
use reqwest::Client;
use url::Url;

use crate::config::ClientSettings;
use crate::errors::QueryError;

/// HTTP client wrapper for OCSP POST exchanges
#[derive(Clone, Debug)]
pub struct OcspHttpClient {
    client: Client,
}

impl OcspHttpClient {
    /// Create a new OCSP HTTP client
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::HttpClientInit`] if the underlying client cannot
    /// be built, for example when the TLS backend fails to initialize.
    pub fn new(settings: &ClientSettings) -> Result<Self, QueryError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(|e| QueryError::HttpClientInit {
                source: Box::new(e),
                context: "Failed to initialize HTTP client for OCSP validation",
            })?;

        Ok(Self { client })
    }

    /// Send a DER-encoded OCSP request and return the raw response body
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Transport`] if:
    /// - the URL is not an absolute URL with a host
    /// - the network request fails
    /// - the responder returns a non-success status
    /// - the response body cannot be read
    pub async fn post_ocsp(&self, url: &str, body: Vec<u8>) -> Result<Vec<u8>, QueryError> {
        let host = host_header(url)?;

        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/ocsp-request")
            .header(ACCEPT, "application/ocsp-response")
            .header(HOST, host)
            .body(body)
            .send()
            .await
            .map_err(|e| QueryError::Transport(format!("OCSP request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(QueryError::Transport(format!(
                "OCSP responder returned status: {}",
                response.status()
            )));
        }

        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| QueryError::Transport(format!("Failed to read OCSP response: {e}")))
    }
}

/// `Host` header value for a responder URL: the host, plus the port when it is explicit
pub(crate) fn host_header(url: &str) -> Result<String, QueryError> {
    let parsed = Url::parse(url)
        .map_err(|e| QueryError::Transport(format!("Invalid responder URL '{url}': {e}")))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| QueryError::Transport(format!("Responder URL '{url}' has no host")))?;

    Ok(match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}
