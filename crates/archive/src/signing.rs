//! APK Signing Inspection
//!
//! Collects signer certificates from every signature scheme an APK may
//! carry and reduces them to SHA-256 fingerprints. Each scheme is read
//! independently; one failing scheme never hides the others.

use std::fmt;
use std::fs::File;
use std::io::BufReader;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::apk::{ApkArchive, ApkError};
use crate::digest::sha256_hex;
use crate::pkcs7::{self, Pkcs7Error};
use crate::signing_block::{
    scheme_certificates, SigningBlock, APK_SIGNATURE_SCHEME_V2_ID, APK_SIGNATURE_SCHEME_V31_ID,
    APK_SIGNATURE_SCHEME_V3_ID,
};

/// Largest JAR signature block file read for v1 certificates
const MAX_SIGNATURE_FILE_SIZE: u64 = 4 * 1024 * 1024;

/// Signature scheme version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureScheme {
    /// JAR signing (`META-INF/*.RSA|DSA|EC`)
    V1,
    /// APK Signature Scheme v2
    V2,
    /// APK Signature Scheme v3 (and v3.1)
    V3,
}

impl SignatureScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureScheme::V1 => "v1",
            SignatureScheme::V2 => "v2",
            SignatureScheme::V3 => "v3",
        }
    }
}

impl fmt::Display for SignatureScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signing errors
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Archive(#[from] ApkError),
    #[error("malformed signing data: {0}")]
    Malformed(String),
    #[error("invalid PKCS#7 signature block: {0}")]
    Pkcs7(#[from] Pkcs7Error),
}

/// One distinct signing certificate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignerInfo {
    /// Lowercase hex SHA-256 of the DER certificate
    pub sha256: String,
    /// Schemes the certificate was found under, in discovery order
    pub schemes: Vec<SignatureScheme>,
}

/// Signing section of the report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SigningReport {
    Signed { signers: Vec<SignerInfo> },
    Failed { error: String },
}

impl SigningReport {
    pub fn signers(&self) -> &[SignerInfo] {
        match self {
            SigningReport::Signed { signers } => signers,
            SigningReport::Failed { .. } => &[],
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            SigningReport::Signed { .. } => None,
            SigningReport::Failed { error } => Some(error),
        }
    }
}

/// Signing inspector over an opened APK
pub struct SigningInspector<'a> {
    apk: &'a mut ApkArchive,
}

impl<'a> SigningInspector<'a> {
    pub fn new(apk: &'a mut ApkArchive) -> Self {
        Self { apk }
    }

    fn signing_block(&self) -> Result<Option<SigningBlock>, SigningError> {
        let mut reader = BufReader::new(File::open(self.apk.path())?);
        SigningBlock::locate(&mut reader)
    }

    fn block_certificates(&self, ids: &[u32]) -> Result<Vec<Vec<u8>>, SigningError> {
        let Some(block) = self.signing_block()? else {
            return Ok(Vec::new());
        };
        let mut certificates = Vec::new();
        for id in ids {
            if let Some(value) = block.get(*id) {
                certificates.extend(scheme_certificates(value)?);
            }
        }
        Ok(certificates)
    }

    /// DER certificates from APK Signature Scheme v2
    pub fn certificates_v2(&self) -> Result<Vec<Vec<u8>>, SigningError> {
        self.block_certificates(&[APK_SIGNATURE_SCHEME_V2_ID])
    }

    /// DER certificates from APK Signature Scheme v3 and v3.1
    pub fn certificates_v3(&self) -> Result<Vec<Vec<u8>>, SigningError> {
        self.block_certificates(&[APK_SIGNATURE_SCHEME_V3_ID, APK_SIGNATURE_SCHEME_V31_ID])
    }

    /// DER certificates from JAR signature block files
    pub fn certificates_v1(&mut self) -> Result<Vec<Vec<u8>>, SigningError> {
        let mut certificates = Vec::new();
        let mut first_error = None;
        for name in self.apk.signature_file_names()? {
            let parsed = self
                .apk
                .read_entry(&name, MAX_SIGNATURE_FILE_SIZE)
                .map_err(SigningError::from)
                .and_then(|ber| Ok(pkcs7::certificates(&ber)?));
            match parsed {
                Ok(certs) => certificates.extend(certs),
                Err(e) => {
                    warn!("Skipping signature file {}: {}", name, e);
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) if certificates.is_empty() => Err(e),
            _ => Ok(certificates),
        }
    }

    /// Run every scheme and merge the certificates by fingerprint, in
    /// v2, v3, v1 order
    pub fn inspect(&mut self) -> SigningReport {
        let attempts = [
            (SignatureScheme::V2, self.certificates_v2()),
            (SignatureScheme::V3, self.certificates_v3()),
            (SignatureScheme::V1, self.certificates_v1()),
        ];

        let mut signers: Vec<SignerInfo> = Vec::new();
        let mut failures = Vec::new();
        for (scheme, result) in attempts {
            match result {
                Ok(certificates) => {
                    debug!("{}: {} certificate(s)", scheme, certificates.len());
                    for cert in certificates {
                        merge_signer(&mut signers, sha256_hex(&cert), scheme);
                    }
                }
                Err(e) => {
                    debug!("{} certificates unavailable: {}", scheme, e);
                    failures.push(format!("{}: {}", scheme, e));
                }
            }
        }

        if signers.is_empty() {
            let error = if failures.is_empty() {
                "no signing certificates found".to_string()
            } else {
                format!("no signing certificates found ({})", failures.join("; "))
            };
            warn!("{}", error);
            return SigningReport::Failed { error };
        }

        info!("{} distinct signer(s)", signers.len());
        SigningReport::Signed { signers }
    }
}

fn merge_signer(signers: &mut Vec<SignerInfo>, sha256: String, scheme: SignatureScheme) {
    match signers.iter_mut().find(|s| s.sha256 == sha256) {
        Some(existing) => {
            if !existing.schemes.contains(&scheme) {
                existing.schemes.push(scheme);
            }
        }
        None => signers.push(SignerInfo { sha256, schemes: vec![scheme] }),
    }
}
