//! PKCS#7 Certificate Extraction
//!
//! Decodes a `ContentInfo { signedData }` with the BER rules (JAR signature
//! blocks are not always DER) and returns each embedded X.509 certificate
//! in its DER encoding.

use rasn_cms::{CertificateChoices, ContentInfo, SignedData};

/// Arcs of OID 1.2.840.113549.1.7.2 (signedData)
const SIGNED_DATA_ARCS: &[u32] = &[1, 2, 840, 113_549, 1, 7, 2];

/// Signature block decoding errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Pkcs7Error {
    #[error("undecodable ASN.1: {0}")]
    Decode(String),
    #[error("certificate could not be re-encoded: {0}")]
    Encode(String),
    #[error("content type is not signedData")]
    NotSignedData,
}

/// DER encodings of the X.509 certificates in a `ContentInfo { signedData }`
///
/// Attribute certificates and other non-X.509 choices are skipped. The
/// certificates come back in SET OF order.
pub fn certificates(ber: &[u8]) -> Result<Vec<Vec<u8>>, Pkcs7Error> {
    let info = rasn::ber::decode::<ContentInfo>(ber).map_err(|e| Pkcs7Error::Decode(e.to_string()))?;
    if &**info.content_type != SIGNED_DATA_ARCS {
        return Err(Pkcs7Error::NotSignedData);
    }

    let signed = rasn::ber::decode::<SignedData>(info.content.as_bytes())
        .map_err(|e| Pkcs7Error::Decode(e.to_string()))?;

    signed
        .certificates
        .iter()
        .flatten()
        .filter(|choice| matches!(choice, CertificateChoices::Certificate(_)))
        .map(|choice| rasn::der::encode(choice).map_err(|e| Pkcs7Error::Encode(e.to_string())))
        .collect()
}
