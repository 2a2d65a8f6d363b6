//! Replace every staged archive with its ciphertext.

use super::job::BackupArtifact;
use super::report::EncryptReport;
use super::staging::Staging;
use crate::config::Config;
use crate::tools::crypt::ciphertext_path;
use crate::tools::Toolset;
use crate::utils::errors::{PipelineError, Result};
use crate::utils::format::{format_bytes, format_duration};
use std::fs;
use std::path::Path;
use std::time::Instant;
use tracing::{error, info, warn};

/// Encrypt staged archives in path order. Stops at the first failure.
pub async fn run(config: &Config, tools: &Toolset, staging: &Staging) -> Result<EncryptReport> {
    let started = Instant::now();
    let plaintext = staging.plaintext_artifacts()?;
    if plaintext.is_empty() {
        return Err(PipelineError::Encryption {
            path: staging.root().to_path_buf(),
            reason: "the dump left no archives to encrypt".into(),
        });
    }

    let key_file = &config.encryption.key_file;
    let total = plaintext.len();
    let mut report = EncryptReport::default();

    for (index, artifact) in plaintext.into_iter().enumerate() {
        let output = ciphertext_path(&artifact.path);
        info!(
            file = %artifact.path.display(),
            size = %format_bytes(artifact.size_bytes),
            "Encrypting artifact {}/{}",
            index + 1,
            total
        );

        if let Err(e) = tools.encryptor.encrypt(&artifact.path, &output, key_file).await {
            error!(file = %artifact.path.display(), error = %e, "Encryption failed");
            remove_partial(&output);
            return Err(PipelineError::Encryption {
                path: artifact.path,
                reason: e.to_string(),
            });
        }

        fs::remove_file(&artifact.path)?;
        let size_bytes = fs::metadata(&output)?.len();
        report.plaintext_bytes += artifact.size_bytes;
        report.artifacts.push(BackupArtifact {
            path: output,
            size_bytes,
            encrypted: true,
        });
    }

    report.elapsed = started.elapsed();
    info!(
        artifacts = report.artifacts.len(),
        plaintext = %format_bytes(report.plaintext_bytes),
        elapsed = %format_duration(report.elapsed),
        "Encryption complete"
    );
    Ok(report)
}

fn remove_partial(output: &Path) {
    match fs::remove_file(output) {
        Ok(()) => info!(file = %output.display(), "Removed partial ciphertext"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(file = %output.display(), error = %e, "Failed to remove partial ciphertext"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::fake::{FakeEncryptor, Fakes};
    use tempfile::TempDir;

    fn setup(files: &[&str]) -> (TempDir, Config, Staging) {
        let dir = TempDir::new().unwrap();
        let staging_dir = dir.path().join("staging");
        fs::create_dir(&staging_dir).unwrap();
        for name in files {
            fs::write(staging_dir.join(name), format!("contents of {name}")).unwrap();
        }
        let key = dir.path().join("key");
        fs::write(&key, b"secret").unwrap();
        let config = Config::parse(&format!(
            "[storage]\nstaging_dir = \"{}\"\n[remote]\ntarget = \"r:x\"\n[encryption]\nkey_file = \"{}\"\n",
            staging_dir.display(),
            key.display()
        ))
        .unwrap();
        (dir, config, Staging::new(staging_dir))
    }

    fn names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_replaces_plaintext_with_ciphertext() {
        let (_dir, config, staging) = setup(&["a.vma.zst", "b.tar.zst", "a.log"]);
        let fakes = Fakes::default();

        let report = run(&config, &fakes.toolset(), &staging).await.unwrap();
        assert_eq!(report.artifacts.len(), 2);
        assert!(report.artifacts.iter().all(|a| a.encrypted));
        assert_eq!(
            report.plaintext_bytes,
            ("contents of a.vma.zst".len() + "contents of b.tar.zst".len()) as u64
        );
        assert_eq!(names(staging.root()), vec!["a.log", "a.vma.zst.gpg", "b.tar.zst.gpg"]);
    }

    #[tokio::test]
    async fn test_stops_at_first_failure_and_removes_partial() {
        let files = ["vzdump-qemu-101.vma.zst", "vzdump-qemu-102.vma.zst", "vzdump-qemu-103.vma.zst", "vzdump-qemu-104.vma.zst", "vzdump-qemu-105.vma.zst"];
        let (_dir, config, staging) = setup(&files);
        let fakes = Fakes {
            encryptor: FakeEncryptor::failing_on_call(3),
            ..Default::default()
        };

        let err = run(&config, &fakes.toolset(), &staging).await.unwrap_err();
        match err {
            PipelineError::Encryption { path, .. } => assert!(path.ends_with("vzdump-qemu-103.vma.zst")),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(fakes.encryptor.calls().len(), 3);
        assert_eq!(
            names(staging.root()),
            vec![
                "vzdump-qemu-101.vma.zst.gpg",
                "vzdump-qemu-102.vma.zst.gpg",
                "vzdump-qemu-103.vma.zst",
                "vzdump-qemu-104.vma.zst",
                "vzdump-qemu-105.vma.zst",
            ]
        );
    }

    #[tokio::test]
    async fn test_nothing_to_encrypt_is_fatal() {
        let (_dir, config, staging) = setup(&["only.log"]);
        let err = run(&config, &Fakes::default().toolset(), &staging).await.unwrap_err();
        assert!(matches!(err, PipelineError::Encryption { .. }));
    }
}
