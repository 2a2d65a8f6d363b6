//! Symmetric encryption through `gpg`.

use super::command::{self, Echo};
use crate::utils::errors::ToolError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Extension added to ciphertext files.
pub const CIPHERTEXT_EXTENSION: &str = "gpg";

#[async_trait]
pub trait Encryptor: Send + Sync {
    async fn probe(&self) -> Result<(), ToolError>;

    /// Encrypt `input` into `output` with the passphrase in `key_file`.
    async fn encrypt(&self, input: &Path, output: &Path, key_file: &Path) -> Result<(), ToolError>;
}

/// Sibling path that holds the ciphertext of `plaintext`.
pub fn ciphertext_path(plaintext: &Path) -> PathBuf {
    let mut name = plaintext.as_os_str().to_os_string();
    name.push(".");
    name.push(CIPHERTEXT_EXTENSION);
    PathBuf::from(name)
}

pub struct GpgEncryptor {
    program: String,
}

impl GpgEncryptor {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

fn gpg_args(input: &Path, output: &Path, key_file: &Path) -> Vec<String> {
    vec![
        "--batch".to_string(),
        "--yes".to_string(),
        "--pinentry-mode".to_string(),
        "loopback".to_string(),
        "--symmetric".to_string(),
        "--cipher-algo".to_string(),
        "AES256".to_string(),
        "--passphrase-file".to_string(),
        key_file.display().to_string(),
        "--output".to_string(),
        output.display().to_string(),
        input.display().to_string(),
    ]
}

#[async_trait]
impl Encryptor for GpgEncryptor {
    async fn probe(&self) -> Result<(), ToolError> {
        command::require_executable(&self.program).map(|_| ())
    }

    async fn encrypt(&self, input: &Path, output: &Path, key_file: &Path) -> Result<(), ToolError> {
        command::run(&self.program, gpg_args(input, output, key_file), None, Echo::Debug).await?;
        Ok(())
    }
}
