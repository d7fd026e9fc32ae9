//! APK Archive Access
//!
//! Opens APK containers, streams whole-file digests and recovers signing
//! certificates from the v1 (JAR), v2 and v3 signature schemes.

pub mod apk;
pub mod digest;
pub mod pkcs7;
pub mod signing;
pub mod signing_block;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use apk::{ApkArchive, ApkError, MANIFEST_ENTRY};
pub use digest::{sha256_file, sha256_hex};
pub use signing::{SignatureScheme, SignerInfo, SigningError, SigningInspector, SigningReport};
