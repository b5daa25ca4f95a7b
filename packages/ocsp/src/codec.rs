//! OCSP request encoding and response decoding (RFC 6960)
//!
//! The DER structures themselves come from `x509-ocsp`. This module builds
//! the SHA-256 `CertID` for a request, and for a response checks the status,
//! the signature (issuer-signed or delegated) and the matching
//! `SingleResponse`.

use std::time::SystemTime;

use const_oid::db::rfc5912::{
    ECDSA_WITH_SHA_256, ECDSA_WITH_SHA_384, ID_CE_EXT_KEY_USAGE, ID_KP_OCSP_SIGNING, ID_SHA_256,
    SECP_256_R_1, SECP_384_R_1, SHA_1_WITH_RSA_ENCRYPTION, SHA_256_WITH_RSA_ENCRYPTION,
    SHA_384_WITH_RSA_ENCRYPTION, SHA_512_WITH_RSA_ENCRYPTION,
};
use const_oid::db::rfc6960::ID_PKIX_OCSP_BASIC;
use const_oid::db::rfc8410::ID_ED_25519;
use const_oid::ObjectIdentifier;
use der::asn1::{Any, AnyRef, OctetString};
use der::{Decode, Encode, Reader, SliceReader};
use ring::signature::{self, UnparsedPublicKey, VerificationAlgorithm};
use sha2::{Digest, Sha256};
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use x509_cert::ext::pkix::ExtendedKeyUsage;
use x509_cert::Certificate;
use x509_ocsp::{
    BasicOcspResponse, CertId, CertStatus, OcspRequest, OcspResponseStatus, Request, TbsRequest,
    Version,
};

use crate::certificate::bytes_to_hex;
use crate::errors::QueryError;

/// Revocation status reported by a responder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponderOutcome {
    /// Certificate is not revoked
    Good,
    /// Certificate is revoked
    Revoked,
    /// Responder has no record of the certificate
    Unknown,
}

/// Decoded and verified answer of a responder for one certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcspResponse {
    /// Certificate status
    pub outcome: ResponderOutcome,
    /// Serial number as reported by the responder, big-endian
    pub serial_number: Vec<u8>,
    /// Time at which the status was known to be correct
    pub this_update: Option<SystemTime>,
    /// Time by which newer status will be available
    pub next_update: Option<SystemTime>,
    /// Revocation time, for revoked certificates
    pub revocation_time: Option<SystemTime>,
    /// CRL reason code, for revoked certificates that carry one
    pub revocation_reason: Option<String>,
}

impl OcspResponse {
    /// Reported serial number as lowercase hex without leading zeros
    #[must_use]
    pub fn serial_hex(&self) -> String {
        bytes_to_hex(&self.serial_number)
    }
}

/// Build the `CertID` identifying `subject` under `issuer`, hashed with SHA-256
///
/// # Errors
///
/// Returns [`QueryError::Protocol`] if the issuer name cannot be DER-encoded.
pub fn cert_id(subject: &Certificate, issuer: &Certificate) -> Result<CertId, QueryError> {
    let issuer_name = issuer
        .tbs_certificate
        .subject
        .to_der()
        .map_err(|e| QueryError::Protocol(format!("Failed to encode issuer name: {e}")))?;
    let issuer_key = issuer
        .tbs_certificate
        .subject_public_key_info
        .subject_public_key
        .raw_bytes();

    let issuer_name_hash = OctetString::new(Sha256::digest(&issuer_name).to_vec())
        .map_err(|e| QueryError::Protocol(format!("Failed to encode name hash: {e}")))?;
    let issuer_key_hash = OctetString::new(Sha256::digest(issuer_key).to_vec())
        .map_err(|e| QueryError::Protocol(format!("Failed to encode key hash: {e}")))?;

    Ok(CertId {
        hash_algorithm: AlgorithmIdentifierOwned {
            oid: ID_SHA_256,
            parameters: Some(Any::null()),
        },
        issuer_name_hash,
        issuer_key_hash,
        serial_number: subject.tbs_certificate.serial_number.clone(),
    })
}

/// DER-encode an unsigned, nonce-less OCSP request for `subject`
///
/// # Errors
///
/// Returns [`QueryError::Protocol`] if encoding fails.
pub fn encode_request(subject: &Certificate, issuer: &Certificate) -> Result<Vec<u8>, QueryError> {
    let request = OcspRequest {
        tbs_request: TbsRequest {
            version: Version::V1,
            requestor_name: None,
            request_list: vec![Request {
                req_cert: cert_id(subject, issuer)?,
                single_request_extensions: None,
            }],
            request_extensions: None,
        },
        optional_signature: None,
    };

    request
        .to_der()
        .map_err(|e| QueryError::Protocol(format!("Failed to encode OCSP request: {e}")))
}

/// Decode a DER OCSP response about `subject` and verify it against `issuer`
///
/// # Errors
///
/// Returns [`QueryError::Protocol`] when the response is malformed, not
/// successful, not a basic response, has a bad signature, or has no entry
/// for the subject's serial number.
pub fn decode_response(
    response_der: &[u8],
    subject: &Certificate,
    issuer: &Certificate,
) -> Result<OcspResponse, QueryError> {
    let response = x509_ocsp::OcspResponse::from_der(response_der)
        .map_err(|e| QueryError::Protocol(format!("Failed to parse OCSP response: {e}")))?;

    if response.response_status != OcspResponseStatus::Successful {
        return Err(QueryError::Protocol(format!(
            "OCSP response indicates failure ({:?})",
            response.response_status
        )));
    }

    let response_bytes = response
        .response_bytes
        .ok_or_else(|| QueryError::Protocol("OCSP response contained no response bytes".into()))?;

    if response_bytes.response_type != ID_PKIX_OCSP_BASIC {
        return Err(QueryError::Protocol(format!(
            "Unsupported OCSP response type {}",
            response_bytes.response_type
        )));
    }

    let basic_der = response_bytes.response.as_bytes();
    let basic = BasicOcspResponse::from_der(basic_der)
        .map_err(|e| QueryError::Protocol(format!("Failed to parse BasicOCSPResponse: {e}")))?;

    verify_response_signature(basic_der, &basic, issuer)?;

    let serial = subject.tbs_certificate.serial_number.as_bytes();
    let single = basic
        .tbs_response_data
        .responses
        .iter()
        .find(|single| single.cert_id.serial_number.as_bytes() == serial)
        .ok_or_else(|| {
            QueryError::Protocol(format!(
                "OCSP response does not cover certificate 0x{}",
                bytes_to_hex(serial)
            ))
        })?;

    let (outcome, revocation_time, revocation_reason) = match &single.cert_status {
        CertStatus::Good(_) => (ResponderOutcome::Good, None, None),
        CertStatus::Revoked(info) => (
            ResponderOutcome::Revoked,
            Some(info.revocation_time.0.to_system_time()),
            info.revocation_reason.as_ref().map(|reason| format!("{reason:?}")),
        ),
        CertStatus::Unknown(_) => (ResponderOutcome::Unknown, None, None),
    };

    Ok(OcspResponse {
        outcome,
        serial_number: single.cert_id.serial_number.as_bytes().to_vec(),
        this_update: Some(single.this_update.0.to_system_time()),
        next_update: single.next_update.as_ref().map(|t| t.0.to_system_time()),
        revocation_time,
        revocation_reason,
    })
}

/// The response is signed either by the issuer itself or by a delegated
/// responder whose certificate is embedded, signed by the issuer and marked
/// for OCSP signing.
fn verify_response_signature(
    basic_der: &[u8],
    basic: &BasicOcspResponse,
    issuer: &Certificate,
) -> Result<(), QueryError> {
    let tbs_response_data = first_tlv(basic_der)
        .map_err(|e| QueryError::Protocol(format!("Failed to locate tbsResponseData: {e}")))?;
    let response_signature = basic
        .signature
        .as_bytes()
        .ok_or_else(|| QueryError::Protocol("OCSP signature has unused bits".into()))?;

    let embedded = basic.certs.as_ref().and_then(|certs| certs.first());

    match embedded {
        Some(responder) => {
            verify_signed_data(
                tbs_response_data,
                &basic.signature_algorithm,
                response_signature,
                &responder.tbs_certificate.subject_public_key_info,
            )
            .map_err(|e| QueryError::Protocol(format!("bad signature on OCSP response: {e}")))?;

            if responder != issuer {
                verify_delegated_responder(responder, issuer)?;
            }
            Ok(())
        }
        None => verify_signed_data(
            tbs_response_data,
            &basic.signature_algorithm,
            response_signature,
            &issuer.tbs_certificate.subject_public_key_info,
        )
        .map_err(|e| QueryError::Protocol(format!("bad OCSP signature: {e}"))),
    }
}

fn verify_delegated_responder(responder: &Certificate, issuer: &Certificate) -> Result<(), QueryError> {
    let responder_der = responder
        .to_der()
        .map_err(|e| QueryError::Protocol(format!("Failed to encode responder certificate: {e}")))?;
    let tbs_certificate = first_tlv(&responder_der)
        .map_err(|e| QueryError::Protocol(format!("Failed to locate tbsCertificate: {e}")))?;
    let certificate_signature = responder
        .signature
        .as_bytes()
        .ok_or_else(|| QueryError::Protocol("responder certificate signature has unused bits".into()))?;

    verify_signed_data(
        tbs_certificate,
        &responder.signature_algorithm,
        certificate_signature,
        &issuer.tbs_certificate.subject_public_key_info,
    )
    .map_err(|e| QueryError::Protocol(format!("responder certificate not signed by issuer: {e}")))?;

    if !has_ocsp_signing_usage(responder) {
        return Err(QueryError::Protocol(
            "responder certificate is not authorized for OCSP signing".into(),
        ));
    }
    Ok(())
}

fn has_ocsp_signing_usage(cert: &Certificate) -> bool {
    let Some(extensions) = &cert.tbs_certificate.extensions else {
        return false;
    };
    extensions
        .iter()
        .filter(|ext| ext.extn_id == ID_CE_EXT_KEY_USAGE)
        .filter_map(|ext| ExtendedKeyUsage::from_der(ext.extn_value.as_bytes()).ok())
        .any(|eku| eku.0.contains(&ID_KP_OCSP_SIGNING))
}

/// Raw bytes of the first element inside a DER SEQUENCE (the signed part of a
/// signed structure), without re-encoding it.
fn first_tlv(der_bytes: &[u8]) -> der::Result<&[u8]> {
    let outer = AnyRef::from_der(der_bytes)?;
    let mut reader = SliceReader::new(outer.value())?;
    reader.tlv_bytes()
}

fn verify_signed_data(
    message: &[u8],
    algorithm: &AlgorithmIdentifierOwned,
    signature_bytes: &[u8],
    spki: &SubjectPublicKeyInfoOwned,
) -> Result<(), String> {
    let verification = verification_algorithm(algorithm, spki)?;
    let public_key = spki
        .subject_public_key
        .as_bytes()
        .ok_or_else(|| "public key has unused bits".to_string())?;

    UnparsedPublicKey::new(verification, public_key)
        .verify(message, signature_bytes)
        .map_err(|_| format!("signature verification failed ({})", algorithm.oid))
}

fn verification_algorithm(
    algorithm: &AlgorithmIdentifierOwned,
    spki: &SubjectPublicKeyInfoOwned,
) -> Result<&'static dyn VerificationAlgorithm, String> {
    let oid = algorithm.oid;

    if oid == SHA_256_WITH_RSA_ENCRYPTION {
        return Ok(&signature::RSA_PKCS1_2048_8192_SHA256);
    }
    if oid == SHA_384_WITH_RSA_ENCRYPTION {
        return Ok(&signature::RSA_PKCS1_2048_8192_SHA384);
    }
    if oid == SHA_512_WITH_RSA_ENCRYPTION {
        return Ok(&signature::RSA_PKCS1_2048_8192_SHA512);
    }
    if oid == SHA_1_WITH_RSA_ENCRYPTION {
        return Ok(&signature::RSA_PKCS1_2048_8192_SHA1_FOR_LEGACY_USE_ONLY);
    }
    if oid == ID_ED_25519 {
        return Ok(&signature::ED25519);
    }

    if oid == ECDSA_WITH_SHA_256 || oid == ECDSA_WITH_SHA_384 {
        let curve = spki
            .algorithm
            .parameters
            .as_ref()
            .and_then(|params| params.decode_as::<ObjectIdentifier>().ok())
            .ok_or_else(|| "EC public key without named curve".to_string())?;

        return match (curve == SECP_256_R_1, curve == SECP_384_R_1, oid == ECDSA_WITH_SHA_256) {
            (true, _, true) => Ok(&signature::ECDSA_P256_SHA256_ASN1),
            (true, _, false) => Ok(&signature::ECDSA_P256_SHA384_ASN1),
            (_, true, true) => Ok(&signature::ECDSA_P384_SHA256_ASN1),
            (_, true, false) => Ok(&signature::ECDSA_P384_SHA384_ASN1),
            _ => Err(format!("unsupported EC curve {curve}")),
        };
    }

    Err(format!("unsupported signature algorithm {oid}"))
}
