//! APK Signing Block
//!
//! The block sits between the last local file entry and the central
//! directory:
//!
//! ```text
//! u64 size | (u64 len, u32 id, value)* | u64 size | "APK Sig Block 42"
//! ```
//!
//! Signature scheme v2 and v3 data are ID-value pairs inside it.

use std::io::{Read, Seek, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt};
use tracing::{debug, trace};

use crate::signing::SigningError;

pub const APK_SIGNING_BLOCK_MAGIC: &[u8; 16] = b"APK Sig Block 42";
pub const APK_SIGNATURE_SCHEME_V2_ID: u32 = 0x7109_871a;
pub const APK_SIGNATURE_SCHEME_V3_ID: u32 = 0xf053_68c0;
pub const APK_SIGNATURE_SCHEME_V31_ID: u32 = 0x1b93_ad61;

const EOCD_SIGNATURE: [u8; 4] = [0x50, 0x4b, 0x05, 0x06];
const EOCD_MIN_SIZE: u64 = 22;
const MAX_COMMENT_SIZE: u64 = 0xffff;
const FOOTER_SIZE: u64 = 24;

/// Parsed signing block
#[derive(Debug, Default)]
pub struct SigningBlock {
    pairs: Vec<(u32, Vec<u8>)>,
}

impl SigningBlock {
    /// Find and read the signing block; `None` when the APK has none
    pub fn locate<R: Read + Seek>(r: &mut R) -> Result<Option<Self>, SigningError> {
        let cd_offset = central_directory_offset(r)?;
        if cd_offset < FOOTER_SIZE {
            return Ok(None);
        }

        r.seek(SeekFrom::Start(cd_offset - FOOTER_SIZE))?;
        let size = r.read_u64::<LittleEndian>()?;
        let mut magic = [0u8; 16];
        r.read_exact(&mut magic)?;
        if &magic != APK_SIGNING_BLOCK_MAGIC {
            debug!("no APK Signing Block before central directory");
            return Ok(None);
        }

        // `size` counts everything after the leading size field.
        if size < FOOTER_SIZE || size > cd_offset - 8 {
            return Err(SigningError::Malformed(format!("signing block size {} out of range", size)));
        }
        let start = cd_offset - size - 8;
        r.seek(SeekFrom::Start(start))?;
        let leading = r.read_u64::<LittleEndian>()?;
        if leading != size {
            return Err(SigningError::Malformed(format!(
                "signing block sizes disagree ({} vs {})",
                leading, size
            )));
        }

        let mut pairs_data = vec![0u8; (size - FOOTER_SIZE) as usize];
        r.read_exact(&mut pairs_data)?;
        let pairs = parse_pairs(&pairs_data)?;
        debug!(
            "signing block at {}: ids {:x?}",
            start,
            pairs.iter().map(|(id, _)| *id).collect::<Vec<_>>()
        );
        Ok(Some(Self { pairs }))
    }

    /// Value of the first pair with the given id
    pub fn get(&self, id: u32) -> Option<&[u8]> {
        self.pairs
            .iter()
            .find(|(known, _)| *known == id)
            .map(|(_, value)| value.as_slice())
    }
}

fn parse_pairs(mut data: &[u8]) -> Result<Vec<(u32, Vec<u8>)>, SigningError> {
    let mut pairs = Vec::new();
    while !data.is_empty() {
        if data.len() < 12 {
            return Err(SigningError::Malformed(format!("{} trailing bytes in signing block", data.len())));
        }
        let len = data.read_u64::<LittleEndian>()?;
        if len < 4 || len > data.len() as u64 {
            return Err(SigningError::Malformed(format!("ID-value pair length {} out of range", len)));
        }
        let id = data.read_u32::<LittleEndian>()?;
        let (value, rest) = data.split_at((len - 4) as usize);
        trace!("signing block pair 0x{:08x} ({} bytes)", id, value.len());
        pairs.push((id, value.to_vec()));
        data = rest;
    }
    Ok(pairs)
}

/// Locate the End Of Central Directory record and return the central
/// directory offset it declares
fn central_directory_offset<R: Read + Seek>(r: &mut R) -> Result<u64, SigningError> {
    let file_len = r.seek(SeekFrom::End(0))?;
    if file_len < EOCD_MIN_SIZE {
        return Err(SigningError::Malformed("file too small for a zip archive".into()));
    }

    let tail_len = file_len.min(EOCD_MIN_SIZE + MAX_COMMENT_SIZE);
    r.seek(SeekFrom::Start(file_len - tail_len))?;
    let mut tail = vec![0u8; tail_len as usize];
    r.read_exact(&mut tail)?;

    let last = tail.len() - EOCD_MIN_SIZE as usize;
    for pos in (0..=last).rev() {
        if tail[pos..pos + 4] != EOCD_SIGNATURE {
            continue;
        }
        let comment_len = u16::from_le_bytes([tail[pos + 20], tail[pos + 21]]) as usize;
        if pos + EOCD_MIN_SIZE as usize + comment_len != tail.len() {
            continue;
        }
        let cd_offset = u32::from_le_bytes([tail[pos + 16], tail[pos + 17], tail[pos + 18], tail[pos + 19]]);
        let eocd_offset = file_len - tail_len + pos as u64;
        if cd_offset as u64 > eocd_offset {
            return Err(SigningError::Malformed("central directory offset past its end record".into()));
        }
        return Ok(cd_offset as u64);
    }
    Err(SigningError::Malformed("end of central directory not found".into()))
}

/// Certificates from every signer of a v2/v3 scheme value
pub fn scheme_certificates(value: &[u8]) -> Result<Vec<Vec<u8>>, SigningError> {
    let mut certificates = Vec::new();
    let mut signers = length_prefixed(&mut &value[..])?;
    while !signers.is_empty() {
        let mut signer = length_prefixed(&mut signers)?;
        let mut signed_data = length_prefixed(&mut signer)?;
        let _digests = length_prefixed(&mut signed_data)?;
        let mut certs = length_prefixed(&mut signed_data)?;
        while !certs.is_empty() {
            certificates.push(length_prefixed(&mut certs)?.to_vec());
        }
    }
    Ok(certificates)
}

/// Split a u32-length-prefixed slice off the front of `data`
fn length_prefixed<'a>(data: &mut &'a [u8]) -> Result<&'a [u8], SigningError> {
    if data.len() < 4 {
        return Err(SigningError::Malformed("truncated length prefix".into()));
    }
    let len = data.read_u32::<LittleEndian>()? as usize;
    if len > data.len() {
        return Err(SigningError::Malformed(format!(
            "length prefix {} exceeds remaining {} bytes",
            len,
            data.len()
        )));
    }
    let (head, rest) = data.split_at(len);
    *data = rest;
    Ok(head)
}
