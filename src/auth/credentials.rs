// Credential persistence
// One JSON file holding the bearer token, readable only by its owner

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::types::Credentials;

/// Reads and writes a single credentials file
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load credentials from disk.
    ///
    /// Returns `None` when the file is missing, unreadable, not valid JSON, or
    /// lacks any of the three fields. A corrupted file is treated exactly like
    /// never having logged in.
    pub fn load(&self) -> Option<Credentials> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Credentials file unreadable");
                return None;
            }
        };

        match serde_json::from_str::<Credentials>(&contents) {
            Ok(creds) if creds.is_complete() => Some(creds),
            Ok(_) => {
                tracing::warn!(path = %self.path.display(), "Credentials file has empty fields, ignoring");
                None
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Credentials file malformed, ignoring");
                None
            }
        }
    }

    /// Save credentials to disk.
    ///
    /// Creates the parent directory if needed. On Unix the file is created with
    /// mode 0600 before the token is written and the mode is re-applied to
    /// pre-existing files.
    pub fn save(&self, creds: &Credentials) -> io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            create_private_dir(parent)?;
        }

        let contents = serde_json::to_string_pretty(creds).map_err(io::Error::other)?;

        let mut file = open_private_file(&self.path)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;

        tracing::debug!(path = %self.path.display(), "Stored credentials");
        Ok(())
    }

    /// Remove the credentials file.
    ///
    /// Returns `Ok(())` if the file was deleted or didn't exist.
    pub fn clear(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "Removed credentials");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;

    if dir.exists() {
        return Ok(());
    }
    fs::DirBuilder::new().recursive(true).mode(0o700).create(dir)
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)
}

#[cfg(unix)]
fn open_private_file(path: &Path) -> io::Result<fs::File> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // mode() only applies on creation
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    Ok(file)
}

#[cfg(not(unix))]
fn open_private_file(path: &Path) -> io::Result<fs::File> {
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}
