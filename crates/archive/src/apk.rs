//! APK Container Access
//!
//! Opens an APK as a zip archive and reads individual entries with size
//! guards.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::debug;
use zip::result::ZipError;
use zip::ZipArchive;

/// Name of the binary manifest entry
pub const MANIFEST_ENTRY: &str = "AndroidManifest.xml";

/// Archive errors
#[derive(Debug, thiserror::Error)]
pub enum ApkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid APK: {0}")]
    InvalidArchive(String),
    #[error("Entry not found in APK: {0}")]
    MissingEntry(String),
    #[error("Entry {name} is {size} bytes, limit is {limit}")]
    EntryTooLarge { name: String, size: u64, limit: u64 },
}

impl From<ZipError> for ApkError {
    fn from(e: ZipError) -> Self {
        match e {
            ZipError::Io(io) => ApkError::Io(io),
            other => ApkError::InvalidArchive(other.to_string()),
        }
    }
}

/// An opened APK
pub struct ApkArchive {
    path: PathBuf,
    archive: ZipArchive<File>,
}

impl ApkArchive {
    /// Open an APK file
    pub fn open(path: &Path) -> Result<Self, ApkError> {
        let file = File::open(path)?;
        let archive = ZipArchive::new(file)
            .map_err(|e| ApkError::InvalidArchive(e.to_string()))?;
        debug!("Opened {:?} ({} entries)", path, archive.len());
        Ok(Self { path: path.to_path_buf(), archive })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the binary AndroidManifest.xml
    pub fn manifest_bytes(&mut self, limit: u64) -> Result<Vec<u8>, ApkError> {
        self.read_entry(MANIFEST_ENTRY, limit)
    }

    /// Read a whole entry, refusing anything that inflates past `limit`
    pub fn read_entry(&mut self, name: &str, limit: u64) -> Result<Vec<u8>, ApkError> {
        let entry = match self.archive.by_name(name) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => return Err(ApkError::MissingEntry(name.to_string())),
            Err(e) => return Err(e.into()),
        };
        if entry.size() > limit {
            return Err(ApkError::EntryTooLarge { name: name.to_string(), size: entry.size(), limit });
        }

        // The declared size is not trusted; cap what is actually inflated.
        let mut data = Vec::with_capacity(entry.size() as usize);
        entry.take(limit + 1).read_to_end(&mut data)?;
        if data.len() as u64 > limit {
            return Err(ApkError::EntryTooLarge { name: name.to_string(), size: data.len() as u64, limit });
        }
        Ok(data)
    }

    /// JAR signature block files (`META-INF/*.RSA|DSA|EC`) in archive order
    pub fn signature_file_names(&mut self) -> Result<Vec<String>, ApkError> {
        let mut names = Vec::new();
        for i in 0..self.archive.len() {
            let entry = self.archive.by_index_raw(i)?;
            if is_signature_block_file(entry.name()) {
                names.push(entry.name().to_string());
            }
        }
        Ok(names)
    }
}

fn is_signature_block_file(name: &str) -> bool {
    let Some(rest) = name.strip_prefix("META-INF/") else {
        return false;
    };
    let upper = rest.to_ascii_uppercase();
    [".RSA", ".DSA", ".EC"]
        .iter()
        .any(|ext| upper.len() > ext.len() && upper.ends_with(ext))
}
