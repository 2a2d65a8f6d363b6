//! Recording fakes for the tool traits.
//!
//! Each fake is a cheap handle over shared state, so a test can keep a clone
//! after handing the boxed fake to a `Toolset`.

use super::crypt::Encryptor;
use super::dump::Dumper;
use super::inventory::Inventory;
use super::notify::Notifier;
use super::transfer::{CopyOptions, RemoteStore};
use super::Toolset;
use crate::lifecycle::ShutdownCoordinator;
use crate::pipeline::job::{WorkloadJob, WorkloadKind};
use crate::utils::errors::ToolError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn failed(program: &str, stderr: &str) -> ToolError {
    ToolError::Failed {
        program: program.to_string(),
        status: "exit status: 1".to_string(),
        code: Some(1),
        stderr: stderr.to_string(),
    }
}

pub fn vm(id: u32) -> WorkloadJob {
    WorkloadJob {
        id,
        display_name: format!("vm{id}"),
        kind: WorkloadKind::Vm,
    }
}

pub fn ct(id: u32) -> WorkloadJob {
    WorkloadJob {
        id,
        display_name: format!("ct{id}"),
        kind: WorkloadKind::Container,
    }
}

/// Archive name the fake dumper writes for `job`.
pub fn archive_name(job: &WorkloadJob) -> String {
    match job.kind {
        WorkloadKind::Vm => format!("vzdump-qemu-{}-2026_10_14-01_00_00.vma.zst", job.id),
        WorkloadKind::Container => format!("vzdump-lxc-{}-2026_10_14-01_00_00.tar.zst", job.id),
    }
}

// ── Inventory ──

#[derive(Clone, Default)]
pub struct FakeInventory {
    vms: Vec<WorkloadJob>,
    containers: Vec<WorkloadJob>,
    missing: bool,
}

impl FakeInventory {
    pub fn new(vms: Vec<WorkloadJob>, containers: Vec<WorkloadJob>) -> Self {
        Self {
            vms,
            containers,
            missing: false,
        }
    }

    pub fn missing() -> Self {
        Self {
            missing: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl Inventory for FakeInventory {
    async fn probe(&self) -> Result<(), ToolError> {
        if self.missing {
            return Err(ToolError::NotFound { program: "qm".into() });
        }
        Ok(())
    }

    async fn list(&self, kind: WorkloadKind) -> Result<Vec<WorkloadJob>, ToolError> {
        Ok(match kind {
            WorkloadKind::Vm => self.vms.clone(),
            WorkloadKind::Container => self.containers.clone(),
        })
    }
}

// ── Dumper ──

#[derive(Default)]
struct DumperState {
    calls: Vec<u32>,
    fail_ids: HashSet<u32>,
    /// Fired once, after the first archive is written
    interrupt: Option<ShutdownCoordinator>,
}

#[derive(Clone, Default)]
pub struct FakeDumper {
    inner: Arc<Mutex<DumperState>>,
}

impl FakeDumper {
    /// Dumps of these ids exit non-zero.
    pub fn failing(ids: &[u32]) -> Self {
        let fake = Self::default();
        fake.inner.lock().fail_ids = ids.iter().copied().collect();
        fake
    }

    /// The first dump succeeds and then delivers SIGINT mid-stage.
    pub fn interrupting(shutdown: ShutdownCoordinator) -> Self {
        let fake = Self::default();
        fake.inner.lock().interrupt = Some(shutdown);
        fake
    }

    pub fn calls(&self) -> Vec<u32> {
        self.inner.lock().calls.clone()
    }
}

#[async_trait]
impl Dumper for FakeDumper {
    async fn probe(&self) -> Result<(), ToolError> {
        Ok(())
    }

    async fn dump(&self, job: &WorkloadJob, out_dir: &Path) -> Result<(), ToolError> {
        let fail = {
            let mut state = self.inner.lock();
            state.calls.push(job.id);
            state.fail_ids.contains(&job.id)
        };
        if fail {
            return Err(failed("vzdump", "snapshot creation failed"));
        }

        let archive = out_dir.join(archive_name(job));
        std::fs::write(&archive, format!("plaintext archive of {}", job.id))?;
        std::fs::write(
            out_dir.join(format!("vzdump-{}.log", job.id)),
            format!("INFO: finished backup of {}\n", job.id),
        )?;

        let interrupt = self.inner.lock().interrupt.take();
        if let Some(shutdown) = interrupt {
            shutdown.trigger("SIGINT");
            // Let the run's select! observe the cancellation
            tokio::task::yield_now().await;
        }
        Ok(())
    }
}

// ── Encryptor ──

#[derive(Default)]
struct EncryptorState {
    calls: Vec<PathBuf>,
    fail_on_call: Option<usize>,
}

#[derive(Clone, Default)]
pub struct FakeEncryptor {
    inner: Arc<Mutex<EncryptorState>>,
}

impl FakeEncryptor {
    /// The `n`th encryption (1-based) fails after leaving a partial output.
    pub fn failing_on_call(n: usize) -> Self {
        let fake = Self::default();
        fake.inner.lock().fail_on_call = Some(n);
        fake
    }

    pub fn calls(&self) -> Vec<PathBuf> {
        self.inner.lock().calls.clone()
    }
}

#[async_trait]
impl Encryptor for FakeEncryptor {
    async fn probe(&self) -> Result<(), ToolError> {
        Ok(())
    }

    async fn encrypt(&self, input: &Path, output: &Path, key_file: &Path) -> Result<(), ToolError> {
        let fail = {
            let mut state = self.inner.lock();
            state.calls.push(input.to_path_buf());
            state.fail_on_call == Some(state.calls.len())
        };
        if fail {
            std::fs::write(output, b"partial")?;
            return Err(failed("gpg", "decryption key unusable"));
        }

        let key = std::fs::read(key_file)?;
        let mut data = std::fs::read(input)?;
        for (i, byte) in data.iter_mut().enumerate() {
            *byte ^= key.get(i % key.len().max(1)).copied().unwrap_or(0xAA);
        }
        std::fs::write(output, data)?;
        Ok(())
    }
}

// ── Remote store ──

#[derive(Default)]
struct RemoteState {
    dirs: Vec<String>,
    uploads: Vec<(String, Vec<String>)>,
    purged: Vec<String>,
    fail_copy: bool,
    list_calls: usize,
    /// Listings succeed this many times, then fail
    fail_list_after: Option<usize>,
    fail_purge: HashSet<String>,
}

#[derive(Clone, Default)]
pub struct FakeRemote {
    inner: Arc<Mutex<RemoteState>>,
}

impl FakeRemote {
    pub fn with_dirs<I, S>(dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fake = Self::default();
        fake.inner.lock().dirs = dirs.into_iter().map(Into::into).collect();
        fake
    }

    pub fn fail_copy(self) -> Self {
        self.inner.lock().fail_copy = true;
        self
    }

    pub fn fail_list(self) -> Self {
        self.fail_list_after(0)
    }

    pub fn fail_list_after(self, successes: usize) -> Self {
        self.inner.lock().fail_list_after = Some(successes);
        self
    }

    /// Purging a directory with this name fails.
    pub fn fail_purge(self, name: &str) -> Self {
        self.inner.lock().fail_purge.insert(name.to_string());
        self
    }

    pub fn dirs(&self) -> Vec<String> {
        self.inner.lock().dirs.clone()
    }

    /// `(destination, uploaded file names)` per copy
    pub fn uploads(&self) -> Vec<(String, Vec<String>)> {
        self.inner.lock().uploads.clone()
    }

    pub fn purged(&self) -> Vec<String> {
        self.inner.lock().purged.clone()
    }
}

fn last_segment(path: &str) -> &str {
    path.rsplit(['/', ':']).next().unwrap_or(path)
}

fn excluded(name: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|p| match p.strip_prefix('*') {
        Some(suffix) => name.ends_with(suffix),
        None => name == p,
    })
}

#[async_trait]
impl RemoteStore for FakeRemote {
    async fn probe(&self) -> Result<(), ToolError> {
        Ok(())
    }

    async fn copy_dir(&self, src: &Path, dest: &str, opts: &CopyOptions) -> Result<(), ToolError> {
        if self.inner.lock().fail_copy {
            return Err(failed("rclone", "Failed to copy: connection reset"));
        }

        let mut files: Vec<String> = std::fs::read_dir(src)?
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| !excluded(name, &opts.exclude))
            .collect();
        files.sort();

        let mut state = self.inner.lock();
        state.uploads.push((dest.to_string(), files));
        state.dirs.push(last_segment(dest).to_string());
        Ok(())
    }

    async fn list_dirs(&self, _path: &str) -> Result<Vec<String>, ToolError> {
        let mut state = self.inner.lock();
        state.list_calls += 1;
        if state.fail_list_after.is_some_and(|n| state.list_calls > n) {
            return Err(failed("rclone", "couldn't connect"));
        }
        Ok(state.dirs.clone())
    }

    async fn purge(&self, path: &str) -> Result<(), ToolError> {
        let name = last_segment(path).to_string();
        let mut state = self.inner.lock();
        state.purged.push(name.clone());
        if state.fail_purge.contains(&name) {
            return Err(failed("rclone", "permission denied"));
        }
        state.dirs.retain(|d| *d != name);
        Ok(())
    }
}

// ── Notifier ──

#[derive(Default)]
struct NotifierState {
    calls: Vec<(String, String)>,
    missing: bool,
}

#[derive(Clone, Default)]
pub struct FakeNotifier {
    inner: Arc<Mutex<NotifierState>>,
}

impl FakeNotifier {
    pub fn missing() -> Self {
        let fake = Self::default();
        fake.inner.lock().missing = true;
        fake
    }

    /// `(subject, body)` per notification
    pub fn calls(&self) -> Vec<(String, String)> {
        self.inner.lock().calls.clone()
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn probe(&self) -> Result<(), ToolError> {
        if self.inner.lock().missing {
            return Err(ToolError::NotFound { program: "mail".into() });
        }
        Ok(())
    }

    async fn notify(&self, subject: &str, body: &str) -> Result<(), ToolError> {
        self.inner
            .lock()
            .calls
            .push((subject.to_string(), body.to_string()));
        Ok(())
    }
}

/// Handles to every fake in a `Toolset`.
#[derive(Clone, Default)]
pub struct Fakes {
    pub inventory: FakeInventory,
    pub dumper: FakeDumper,
    pub encryptor: FakeEncryptor,
    pub remote: FakeRemote,
    pub notifier: FakeNotifier,
}

impl Fakes {
    pub fn toolset(&self) -> Toolset {
        Toolset {
            inventory: Box::new(self.inventory.clone()),
            dumper: Box::new(self.dumper.clone()),
            encryptor: Box::new(self.encryptor.clone()),
            remote: Box::new(self.remote.clone()),
            notifier: Some(Box::new(self.notifier.clone())),
        }
    }
}
