use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use chrono::Local;

static WORKSPACE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// An ephemeral directory owned by exactly one in-flight execution.
///
/// Holds the written source file and whatever artifacts the toolchain
/// produces. The directory is removed when the value drops, so every exit
/// path of an execution releases it; a removal failure is logged and never
/// alters the execution's outcome.
pub struct Workspace {
    dir: PathBuf,
}

impl Workspace {
    /// Allocates a uniquely named directory under `scratch_root`.
    ///
    /// The name combines the process id, a process-unique counter and a
    /// timestamp; `create_dir` on the leaf doubles as the liveness check,
    /// retrying on the (unlikely) collision.
    pub fn create(scratch_root: &Path) -> Result<Self> {
        fs::create_dir_all(scratch_root).with_context(|| {
            format!("failed to create scratch root {}", scratch_root.display())
        })?;

        loop {
            let name = format!(
                "ws-{}-{}-{}",
                std::process::id(),
                Local::now().format("%y%m%d-%H%M%S"),
                WORKSPACE_COUNTER.fetch_add(1, Ordering::SeqCst),
            );
            let dir = scratch_root.join(name);
            match fs::create_dir(&dir) {
                Ok(()) => {
                    log::debug!("workspace allocated at {}", dir.display());
                    return Ok(Self { dir });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(e).with_context(|| {
                        format!(
                            "failed to allocate workspace under {}",
                            scratch_root.display()
                        )
                    });
                }
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Writes the submitted snippet into the workspace
    pub fn write_source(&self, file_name: &str, source_code: &str) -> Result<PathBuf> {
        let path = self.dir.join(file_name);
        fs::write(&path, format!("{source_code}\n"))
            .with_context(|| format!("failed to write source file {}", path.display()))?;
        Ok(path)
    }

    /// Reads a captured output file, empty if missing or unreadable
    pub fn read_capture(&self, file_name: &str) -> String {
        fs::read_to_string(self.dir.join(file_name)).unwrap_or_default()
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.dir) {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("failed to remove workspace {}: {e}", self.dir.display());
            }
        }
    }
}
