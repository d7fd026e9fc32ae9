//! Fixture builders: zip containers, APK Signing Blocks and PKCS#7 blobs.

use std::io::{Cursor, Write};

use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::signing_block::APK_SIGNING_BLOCK_MAGIC;

/// Build a zip archive with stored (uncompressed) entries
pub fn build_zip<B: AsRef<[u8]>>(entries: &[(&str, B)]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Stored);
    for (name, data) in entries {
        zip.start_file(*name, options).expect("start zip entry");
        zip.write_all(data.as_ref()).expect("write zip entry");
    }
    zip.finish().expect("finish zip").into_inner()
}

/// Encode a DER element
pub fn der(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    let len = content.len();
    if len < 0x80 {
        out.push(len as u8);
    } else {
        let bytes: Vec<u8> = len.to_be_bytes().iter().copied().skip_while(|b| *b == 0).collect();
        out.push(0x80 | bytes.len() as u8);
        out.extend(bytes);
    }
    out.extend_from_slice(content);
    out
}

const SIGNED_DATA: &[u8] = &[0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x07, 0x02];
const DATA: &[u8] = &[0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x07, 0x01];
const SHA256_WITH_RSA: &[u8] = &[0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x01, 0x0b];
const RSA_ENCRYPTION: &[u8] = &[0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x01, 0x01];
const COMMON_NAME: &[u8] = &[0x55, 0x04, 0x03];

fn algorithm(oid: &[u8]) -> Vec<u8> {
    let mut content = der(0x06, oid);
    content.extend(der(0x05, &[]));
    der(0x30, &content)
}

fn bit_string(bytes: &[u8]) -> Vec<u8> {
    let mut content = vec![0];
    content.extend_from_slice(bytes);
    der(0x03, &content)
}

/// Minimal self-signed X.509 v3 certificate in canonical DER, distinct per seed
pub fn fake_certificate(seed: u8) -> Vec<u8> {
    let mut attribute = der(0x06, COMMON_NAME);
    attribute.extend(der(0x0c, b"fixture"));
    let name = der(0x30, &der(0x31, &der(0x30, &attribute)));

    let mut validity = der(0x17, b"250101000000Z");
    validity.extend(der(0x17, b"350101000000Z"));

    let mut key_info = algorithm(RSA_ENCRYPTION);
    key_info.extend(bit_string(&[seed; 16]));

    let mut tbs = der(0xa0, &der(0x02, &[2]));
    tbs.extend(der(0x02, &[0x01, seed]));
    tbs.extend(algorithm(SHA256_WITH_RSA));
    tbs.extend(&name);
    tbs.extend(der(0x30, &validity));
    tbs.extend(&name);
    tbs.extend(der(0x30, &key_info));

    let mut certificate = der(0x30, &tbs);
    certificate.extend(algorithm(SHA256_WITH_RSA));
    certificate.extend(bit_string(&[seed; 32]));
    der(0x30, &certificate)
}

fn signed_data_fields(certificates: &[Vec<u8>]) -> Vec<u8> {
    let mut fields = der(0x02, &[1]);
    fields.extend(der(0x31, &[]));
    fields.extend(der(0x30, &der(0x06, DATA)));
    fields.extend(der(0xa0, &certificates.concat()));
    fields.extend(der(0x31, &[]));
    fields
}

/// DER `ContentInfo { signedData }` carrying the given certificates
pub fn pkcs7_signed_data(certificates: &[Vec<u8>]) -> Vec<u8> {
    let mut content_info = der(0x06, SIGNED_DATA);
    content_info.extend(der(0xa0, &der(0x30, &signed_data_fields(certificates))));
    der(0x30, &content_info)
}

/// BER constructed element with indefinite length
pub fn indefinite(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = vec![tag, 0x80];
    out.extend_from_slice(content);
    out.extend([0x00, 0x00]);
    out
}

/// `ContentInfo { signedData }` with indefinite-length outer, explicit and
/// SignedData wrappers, as some JAR signers emit
pub fn pkcs7_signed_data_ber(certificates: &[Vec<u8>]) -> Vec<u8> {
    let mut content_info = der(0x06, SIGNED_DATA);
    content_info.extend(indefinite(0xa0, &indefinite(0x30, &signed_data_fields(certificates))));
    indefinite(0x30, &content_info)
}

fn prefixed(data: &[u8]) -> Vec<u8> {
    let mut out = (data.len() as u32).to_le_bytes().to_vec();
    out.extend_from_slice(data);
    out
}

/// v2/v3 scheme value with a single signer holding `certificates`
pub fn scheme_block(certificates: &[Vec<u8>], v3: bool) -> Vec<u8> {
    let mut digest = 0x0103u32.to_le_bytes().to_vec();
    digest.extend(prefixed(&[0u8; 32]));
    let digests = prefixed(&digest);
    let certs: Vec<u8> = certificates.iter().flat_map(|c| prefixed(c)).collect();

    let mut signed_data = prefixed(&digests);
    signed_data.extend(prefixed(&certs));
    if v3 {
        signed_data.extend(24u32.to_le_bytes());
        signed_data.extend(0x7fff_ffffu32.to_le_bytes());
    }
    signed_data.extend(prefixed(&[]));

    let mut signer = prefixed(&signed_data);
    if v3 {
        signer.extend(24u32.to_le_bytes());
        signer.extend(0x7fff_ffffu32.to_le_bytes());
    }
    signer.extend(prefixed(&[]));
    signer.extend(prefixed(&[]));

    prefixed(&prefixed(&signer))
}

/// Assemble an APK Signing Block from ID-value pairs
pub fn signing_block(pairs: &[(u32, Vec<u8>)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (id, value) in pairs {
        body.extend((value.len() as u64 + 4).to_le_bytes());
        body.extend(id.to_le_bytes());
        body.extend_from_slice(value);
    }
    let size = body.len() as u64 + 24;
    let mut block = size.to_le_bytes().to_vec();
    block.extend(body);
    block.extend(size.to_le_bytes());
    block.extend_from_slice(APK_SIGNING_BLOCK_MAGIC);
    block
}

/// Insert a signing block before the central directory and patch the end
/// record's central directory offset
pub fn splice_signing_block(zip: &[u8], block: &[u8]) -> Vec<u8> {
    let eocd = zip
        .windows(4)
        .rposition(|w| w == [0x50, 0x4b, 0x05, 0x06])
        .expect("end of central directory");
    let cd_offset = u32::from_le_bytes([zip[eocd + 16], zip[eocd + 17], zip[eocd + 18], zip[eocd + 19]]) as usize;

    let mut out = Vec::with_capacity(zip.len() + block.len());
    out.extend_from_slice(&zip[..cd_offset]);
    out.extend_from_slice(block);
    out.extend_from_slice(&zip[cd_offset..]);

    let new_eocd = eocd + block.len();
    let new_offset = (cd_offset + block.len()) as u32;
    out[new_eocd + 16..new_eocd + 20].copy_from_slice(&new_offset.to_le_bytes());
    out
}
