//! License credential file.
//!
//! The file holds two lines: the license key, then the instance id. It is
//! re-read on every call; nothing is cached between cycles or requests.

use crate::cache::verdict::key_fingerprint;
use crate::LicenseGateError;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// License key and instance id read from the license file.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    /// License key sent to the authority.
    pub license_key: String,

    /// Identifier of this installation.
    pub instance_id: String,
}

impl Credential {
    /// Short, log-safe identifier for the license key.
    pub fn fingerprint(&self) -> String {
        key_fingerprint(&self.license_key)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("license_key", &format_args!("<{}>", self.fingerprint()))
            .field("instance_id", &self.instance_id)
            .finish()
    }
}

/// Parse license file contents.
///
/// The content is trimmed as a whole; the first line is the key and the
/// second the instance id, each trimmed. Further lines are ignored.
pub fn parse_credential(content: &str) -> Result<Credential, LicenseGateError> {
    let mut lines = content.trim().split('\n').map(str::trim);
    let license_key = lines.next().unwrap_or_default();
    let instance_id = lines.next().unwrap_or_default();

    if license_key.is_empty() {
        return Err(LicenseGateError::CredentialMalformed(
            "missing license key line".to_string(),
        ));
    }
    if instance_id.is_empty() {
        return Err(LicenseGateError::CredentialMalformed(
            "missing instance id line".to_string(),
        ));
    }

    Ok(Credential {
        license_key: license_key.to_string(),
        instance_id: instance_id.to_string(),
    })
}

/// Reads the credential from a fixed path.
#[derive(Debug, Clone)]
pub struct LicenseStore {
    path: PathBuf,
}

impl LicenseStore {
    /// Create a store reading from `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the license file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the license file.
    ///
    /// # Errors
    /// - `CredentialMissing` - file absent or unreadable
    /// - `CredentialMalformed` - fewer than two non-empty lines, or not UTF-8
    pub async fn read(&self) -> Result<Credential, LicenseGateError> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| {
            let detail = match e.kind() {
                ErrorKind::NotFound => "no such file".to_string(),
                _ => e.to_string(),
            };
            LicenseGateError::CredentialMissing(format!("{}: {}", self.path.display(), detail))
        })?;

        let content = String::from_utf8(bytes).map_err(|_| {
            LicenseGateError::CredentialMalformed(format!(
                "{} is not UTF-8 text",
                self.path.display()
            ))
        })?;

        parse_credential(&content)
    }
}
