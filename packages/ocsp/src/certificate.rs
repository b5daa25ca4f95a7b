//! Certificate chain wrapper and the certificate fields OCSP verification needs

use const_oid::db::rfc4519::CN;
use const_oid::db::rfc5912::{ID_AD_OCSP, ID_PE_AUTHORITY_INFO_ACCESS};
use der::asn1::{Ia5StringRef, PrintableStringRef, Utf8StringRef};
use der::Decode;
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::pkix::AuthorityInfoAccessSyntax;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::Certificate;

use crate::errors::VerifyError;

/// Peer certificate chain: subject at index 0, its direct issuer at index 1
#[derive(Debug, Clone)]
pub struct CertificateChain {
    certificates: Vec<Certificate>,
}

impl CertificateChain {
    /// Wrap already decoded certificates
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::InvalidChain`] when fewer than two certificates are given.
    pub fn new(certificates: Vec<Certificate>) -> Result<Self, VerifyError> {
        if certificates.len() < 2 {
            return Err(VerifyError::InvalidChain(certificates.len()));
        }
        Ok(Self { certificates })
    }

    /// Decode a chain from DER blobs, subject first
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::CertificateParsing`] if any blob is not a
    /// certificate, or [`VerifyError::InvalidChain`] if it is too short.
    pub fn from_der<T: AsRef<[u8]>>(ders: &[T]) -> Result<Self, VerifyError> {
        let certificates = ders
            .iter()
            .map(|der| {
                Certificate::from_der(der.as_ref())
                    .map_err(|e| VerifyError::CertificateParsing(format!("X.509 parsing failed: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(certificates)
    }

    /// Decode a chain from concatenated PEM certificates, subject first
    ///
    /// # Errors
    ///
    /// Same as [`CertificateChain::from_der`].
    pub fn from_pem(pem_data: &str) -> Result<Self, VerifyError> {
        let mut cursor = std::io::Cursor::new(pem_data.as_bytes());
        let ders = rustls_pemfile::certs(&mut cursor)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| VerifyError::CertificateParsing(format!("Failed to parse PEM: {e}")))?;
        Self::from_der(&ders)
    }

    /// The certificate being verified
    #[must_use]
    pub fn subject(&self) -> &Certificate {
        &self.certificates[0]
    }

    /// Direct issuer of the subject
    #[must_use]
    pub fn issuer(&self) -> &Certificate {
        &self.certificates[1]
    }

    /// All certificates, subject first
    #[must_use]
    pub fn certificates(&self) -> &[Certificate] {
        &self.certificates
    }
}

/// OCSP responder URLs from the Authority Information Access extension, in listing order
///
/// A malformed extension yields no URLs.
#[must_use]
pub fn ocsp_responder_urls(cert: &Certificate) -> Vec<String> {
    let Some(extensions) = &cert.tbs_certificate.extensions else {
        return Vec::new();
    };

    let mut urls = Vec::new();
    for ext in extensions {
        if ext.extn_id != ID_PE_AUTHORITY_INFO_ACCESS {
            continue;
        }

        let aia = match AuthorityInfoAccessSyntax::from_der(ext.extn_value.as_bytes()) {
            Ok(aia) => aia,
            Err(e) => {
                tracing::warn!("Malformed Authority Information Access extension: {}", e);
                continue;
            }
        };

        for description in aia.0 {
            if description.access_method != ID_AD_OCSP {
                continue;
            }
            if let GeneralName::UniformResourceIdentifier(uri) = description.access_location {
                urls.push(uri.to_string());
            }
        }
    }
    urls
}

/// First common name attribute of a distinguished name
#[must_use]
pub fn common_name(name: &Name) -> Option<String> {
    for rdn in &name.0 {
        for atv in rdn.0.iter() {
            if atv.oid != CN {
                continue;
            }
            if let Ok(ps) = PrintableStringRef::try_from(&atv.value) {
                return Some(ps.to_string());
            } else if let Ok(utf8s) = Utf8StringRef::try_from(&atv.value) {
                return Some(utf8s.to_string());
            } else if let Ok(ia5s) = Ia5StringRef::try_from(&atv.value) {
                return Some(ia5s.to_string());
            }
        }
    }
    None
}

/// Serial number as lowercase hex without leading zeros
#[must_use]
pub fn serial_hex(serial: &SerialNumber) -> String {
    bytes_to_hex(serial.as_bytes())
}

pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    let encoded = hex::encode(bytes);
    let trimmed = encoded.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}
