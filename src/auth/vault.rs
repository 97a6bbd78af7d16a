use argon2::password_hash::{self, rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use once_cell::sync::Lazy;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Verified in place of the real hash when no credential is configured, so a
/// login costs the same Argon2 work either way
static UNCONFIGURED_HASH: Lazy<Option<String>> = Lazy::new(|| hash_credential("unconfigured").ok());

#[derive(Debug, Error)]
pub enum VaultError {
    /// No credential was ever set: the vault file is missing or empty
    #[error("No master credential configured")]
    NoCredentialConfigured,

    #[error("Credential vault unavailable: {0}")]
    Unavailable(String),

    #[error("Stored credential is not a valid password hash: {0}")]
    CorruptCredential(String),

    #[error("Credential must not be empty")]
    EmptyCredential,
}

/// Holds the single master credential as an Argon2 PHC string in one file.
///
/// The plaintext is never stored. Replacing the credential writes a temp
/// file next to the target and renames it over, so a reader sees either the
/// old hash or the new one.
#[derive(Debug, Clone)]
pub struct CredentialVault {
    path: PathBuf,
}

impl CredentialVault {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check `candidate` against the stored hash
    pub async fn verify(&self, candidate: &str) -> Result<bool, VaultError> {
        let stored = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents.trim().to_string(),
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => return Err(VaultError::Unavailable(format!("{}: {}", self.path.display(), e))),
        };

        let candidate = candidate.to_owned();
        if stored.is_empty() {
            let _ = tokio::task::spawn_blocking(move || {
                if let Some(hash) = UNCONFIGURED_HASH.as_deref() {
                    let _ = verify_hash(hash, &candidate);
                }
            })
            .await;
            return Err(VaultError::NoCredentialConfigured);
        }

        tokio::task::spawn_blocking(move || verify_hash(&stored, &candidate))
            .await
            .map_err(|e| VaultError::Unavailable(e.to_string()))?
    }

    /// Replace the stored credential with a fresh salted hash of `new_credential`
    pub async fn set_credential(&self, new_credential: &str) -> Result<(), VaultError> {
        if new_credential.is_empty() {
            return Err(VaultError::EmptyCredential);
        }

        let path = self.path.clone();
        let new_credential = new_credential.to_owned();
        tokio::task::spawn_blocking(move || {
            let hash = hash_credential(&new_credential)?;
            write_atomically(&path, &hash)
        })
        .await
        .map_err(|e| VaultError::Unavailable(e.to_string()))??;

        info!("Master credential replaced at {}", self.path.display());
        Ok(())
    }
}

fn hash_credential(plaintext: &str) -> Result<String, VaultError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| VaultError::Unavailable(format!("hashing failed: {}", e)))
}

fn verify_hash(stored: &str, candidate: &str) -> Result<bool, VaultError> {
    let parsed = PasswordHash::new(stored).map_err(|e| VaultError::CorruptCredential(e.to_string()))?;
    match Argon2::default().verify_password(candidate.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(VaultError::CorruptCredential(e.to_string())),
    }
}

fn write_atomically(path: &Path, contents: &str) -> Result<(), VaultError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let unavailable = |e: std::io::Error| VaultError::Unavailable(format!("{}: {}", path.display(), e));

    std::fs::create_dir_all(&dir).map_err(unavailable)?;
    let mut file = tempfile::NamedTempFile::new_in(&dir).map_err(unavailable)?;
    file.write_all(contents.as_bytes()).map_err(unavailable)?;
    file.as_file().sync_all().map_err(unavailable)?;
    file.persist(path).map_err(|e| unavailable(e.error))?;
    Ok(())
}
