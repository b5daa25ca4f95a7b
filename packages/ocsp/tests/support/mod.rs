//! Shared fixtures: an rcgen test PKI, signed OCSP responses, a scripted
//! responder client and a one-shot local HTTP responder.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use const_oid::db::rfc5912::{ECDSA_WITH_SHA_256, ID_AD_CA_ISSUERS, ID_AD_OCSP};
use const_oid::db::rfc6960::ID_PKIX_OCSP_BASIC;
use der::asn1::{BitString, GeneralizedTime, Ia5String, Null, OctetString};
use der::{Decode, Encode};
use rcgen::{
    BasicConstraints, CertificateParams, CustomExtension, DistinguishedName, DnType,
    ExtendedKeyUsagePurpose, IsCa, Issuer, KeyPair, SerialNumber, SigningKey,
};
use spki::AlgorithmIdentifierOwned;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::pkix::{AccessDescription, AuthorityInfoAccessSyntax};
use x509_cert::Certificate;
use x509_ocsp::{
    BasicOcspResponse, CertStatus, OcspGeneralizedTime, OcspResponseStatus, ResponderId,
    ResponseBytes, ResponseData, RevokedInfo, SingleResponse, Version,
};

use cryypt_ocsp::{
    codec, CertificateChain, OcspClient, OcspEvent, OcspObserver, OcspResponse, QueryError,
    ResponderOutcome,
};

const AUTHORITY_INFO_ACCESS: &[u64] = &[1, 3, 6, 1, 5, 5, 7, 1, 1];

/// Test certificate authority able to issue leaves and sign OCSP responses
pub struct TestPki {
    pub ca: Certificate,
    pub ca_der: Vec<u8>,
    issuer: Issuer<'static, KeyPair>,
    signing_key: KeyPair,
}

/// A delegated OCSP responder certificate and its key
pub struct DelegatedResponder {
    pub cert: Certificate,
    pub key: KeyPair,
}

impl TestPki {
    pub fn new() -> Self {
        let mut params = CertificateParams::new(Vec::default()).unwrap();
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);

        let mut dn = DistinguishedName::new();
        dn.push(DnType::OrganizationName, "CRYYPT");
        dn.push(DnType::CommonName, "CRYYPT Test CA");
        params.distinguished_name = dn;

        let key_pair = KeyPair::generate().unwrap();
        let signing_key = KeyPair::from_pem(&key_pair.serialize_pem()).unwrap();
        let cert = params.clone().self_signed(&key_pair).unwrap();
        let ca_der = cert.der().to_vec();

        Self {
            ca: Certificate::from_der(&ca_der).unwrap(),
            ca_der,
            issuer: Issuer::new(params, key_pair),
            signing_key,
        }
    }

    /// Issue a leaf certificate listing `ocsp_urls` in its AIA extension
    pub fn leaf(&self, common_name: &str, serial: &[u8], ocsp_urls: &[&str]) -> Vec<u8> {
        let mut params = CertificateParams::new(vec!["db.example".to_string()]).unwrap();
        params.serial_number = Some(SerialNumber::from_slice(serial));

        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, common_name);
        params.distinguished_name = dn;

        if !ocsp_urls.is_empty() {
            params.custom_extensions.push(aia_extension(ocsp_urls));
        }

        let key_pair = KeyPair::generate().unwrap();
        params.signed_by(&key_pair, &self.issuer).unwrap().der().to_vec()
    }

    pub fn chain(&self, serial: &[u8], ocsp_urls: &[&str]) -> CertificateChain {
        let leaf = self.leaf("client.db.example", serial, ocsp_urls);
        CertificateChain::from_der(&[leaf, self.ca_der.clone()]).unwrap()
    }

    /// Issue a responder certificate, optionally with the OCSP signing usage
    pub fn delegated_responder(&self, ocsp_signing: bool) -> DelegatedResponder {
        let mut params = CertificateParams::new(Vec::default()).unwrap();
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, "CRYYPT OCSP Responder");
        params.distinguished_name = dn;
        if ocsp_signing {
            params.extended_key_usages = vec![ExtendedKeyUsagePurpose::OcspSigning];
        }

        let key = KeyPair::generate().unwrap();
        let der = params.signed_by(&key, &self.issuer).unwrap().der().to_vec();
        DelegatedResponder {
            cert: Certificate::from_der(&der).unwrap(),
            key,
        }
    }

    /// OCSP response about `subject`, signed by the CA
    pub fn response(&self, subject: &Certificate, status: CertStatus) -> Vec<u8> {
        self.response_signed_by(subject, status, &self.signing_key, None)
    }

    /// OCSP response about `subject`, signed by `key`, optionally embedding `responder`
    pub fn response_signed_by(
        &self,
        subject: &Certificate,
        status: CertStatus,
        key: &KeyPair,
        responder: Option<Certificate>,
    ) -> Vec<u8> {
        let tbs_response_data = ResponseData {
            version: Version::V1,
            responder_id: ResponderId::ByKey(OctetString::new(vec![0x42; 20]).unwrap()),
            produced_at: now(),
            responses: vec![SingleResponse {
                cert_id: codec::cert_id(subject, &self.ca).unwrap(),
                cert_status: status,
                this_update: now(),
                next_update: None,
                single_extensions: None,
            }],
            response_extensions: None,
        };

        let signature = key.sign(&tbs_response_data.to_der().unwrap()).unwrap();
        let basic = BasicOcspResponse {
            tbs_response_data,
            signature_algorithm: AlgorithmIdentifierOwned {
                oid: ECDSA_WITH_SHA_256,
                parameters: None,
            },
            signature: BitString::from_bytes(&signature).unwrap(),
            certs: responder.map(|cert| vec![cert]),
        };

        wrap_basic(basic.to_der().unwrap())
    }
}

pub fn wrap_basic(basic_der: Vec<u8>) -> Vec<u8> {
    x509_ocsp::OcspResponse {
        response_status: OcspResponseStatus::Successful,
        response_bytes: Some(ResponseBytes {
            response_type: ID_PKIX_OCSP_BASIC,
            response: OctetString::new(basic_der).unwrap(),
        }),
    }
    .to_der()
    .unwrap()
}

pub fn failed_response(status: OcspResponseStatus) -> Vec<u8> {
    x509_ocsp::OcspResponse {
        response_status: status,
        response_bytes: None,
    }
    .to_der()
    .unwrap()
}

pub fn good() -> CertStatus {
    CertStatus::Good(Null)
}

pub fn unknown() -> CertStatus {
    CertStatus::Unknown(Null)
}

pub fn revoked() -> CertStatus {
    CertStatus::Revoked(RevokedInfo {
        revocation_time: now(),
        revocation_reason: None,
    })
}

fn now() -> OcspGeneralizedTime {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs();
    OcspGeneralizedTime(GeneralizedTime::from_unix_duration(Duration::from_secs(secs)).unwrap())
}

fn aia_extension(ocsp_urls: &[&str]) -> CustomExtension {
    let mut descriptions = vec![AccessDescription {
        access_method: ID_AD_CA_ISSUERS,
        access_location: GeneralName::UniformResourceIdentifier(
            Ia5String::new("http://ca.db.example/ca.crt").unwrap(),
        ),
    }];
    descriptions.extend(ocsp_urls.iter().map(|url| AccessDescription {
        access_method: ID_AD_OCSP,
        access_location: GeneralName::UniformResourceIdentifier(Ia5String::new(*url).unwrap()),
    }));

    let content = AuthorityInfoAccessSyntax(descriptions).to_der().unwrap();
    CustomExtension::from_oid_content(AUTHORITY_INFO_ACCESS, content)
}

/// Scripted answer of a fake responder
#[derive(Debug, Clone, Copy)]
pub enum Scripted {
    Outcome(ResponderOutcome),
    Transport,
    Protocol,
}

/// [`OcspClient`] answering from a per-URL script and recording the query order
#[derive(Default)]
pub struct ScriptedClient {
    script: HashMap<String, Scripted>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedClient {
    pub fn new(script: &[(&str, Scripted)]) -> Self {
        Self {
            script: script
                .iter()
                .map(|(url, answer)| ((*url).to_string(), *answer))
                .collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl OcspClient for ScriptedClient {
    async fn query(
        &self,
        _common_name: &str,
        subject: &Certificate,
        _issuer: &Certificate,
        responder_url: &str,
    ) -> Result<OcspResponse, QueryError> {
        self.calls.lock().unwrap().push(responder_url.to_string());

        let answer = self
            .script
            .get(responder_url)
            .copied()
            .unwrap_or(Scripted::Transport);

        match answer {
            Scripted::Outcome(outcome) => Ok(OcspResponse {
                outcome,
                serial_number: subject.tbs_certificate.serial_number.as_bytes().to_vec(),
                this_update: Some(SystemTime::now()),
                next_update: None,
                revocation_time: None,
                revocation_reason: None,
            }),
            Scripted::Transport => Err(QueryError::Transport(format!(
                "connection refused: {responder_url}"
            ))),
            Scripted::Protocol => Err(QueryError::Protocol(format!(
                "garbage from {responder_url}"
            ))),
        }
    }
}

/// Observer keeping a textual trace of every event
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl OcspObserver for RecordingObserver {
    fn on_event(&self, event: &OcspEvent<'_>) {
        let line = match event {
            OcspEvent::VerificationStarted { common_name } => format!("start {common_name}"),
            OcspEvent::CertificateResponders { urls } => format!("cert-urls {}", urls.len()),
            OcspEvent::IgnoredCertificateResponders { count } => format!("ignored {count}"),
            OcspEvent::CandidatePlanned {
                url,
                origin,
                placement,
            } => format!("planned {url} {origin} {placement:?}"),
            OcspEvent::QueryStarted { url } => format!("query {url}"),
            OcspEvent::QueryFailed { url, .. } => format!("failed {url}"),
            OcspEvent::Confirmed { url, origin } => format!("good {url} {origin}"),
            OcspEvent::UnknownTolerated { url, serial } => format!("unknown {url} {serial}"),
            OcspEvent::Finished { confirmations } => format!("finished {confirmations}"),
        };
        self.events.lock().unwrap().push(line);
    }
}

/// Request as seen by the local responder
pub struct CapturedRequest {
    pub head: String,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<String> {
        self.head.lines().find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim().to_string())
        })
    }
}

/// Serve exactly one HTTP exchange on a random local port
///
/// Returns the responder URL and a handle resolving to the captured request.
pub async fn serve_once(
    status: u16,
    response_body: Vec<u8>,
) -> (String, tokio::task::JoinHandle<CapturedRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();

        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        let header_end = loop {
            let n = stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "client closed the connection before sending headers");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
        let captured = CapturedRequest {
            head,
            body: Vec::new(),
        };
        let content_length = captured
            .header("content-length")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(0);

        while buf.len() < header_end + content_length {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        let end = buf.len().min(header_end + content_length);

        let reason = if status == 200 { "OK" } else { "Error" };
        let head_out = format!(
            "HTTP/1.1 {status} {reason}\r\nContent-Type: application/ocsp-response\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            response_body.len()
        );
        stream.write_all(head_out.as_bytes()).await.unwrap();
        stream.write_all(&response_body).await.unwrap();
        let _ = stream.shutdown().await;

        CapturedRequest {
            head: captured.head,
            body: buf[header_end..end].to_vec(),
        }
    });

    (format!("http://{addr}/ocsp"), handle)
}

/// URL of a local port with nothing listening on it
pub async fn refused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/ocsp")
}
