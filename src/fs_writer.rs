//! Atomic file writes with ownership, mode, and sensitive redaction
//!
//! Handlers never write files directly: content goes through a
//! [`FileWriter`] that stages a temp file in the target directory and
//! renames it into place, so a failed write leaves prior state unchanged.
//! Content flagged sensitive never appears in diagnostic logs.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use convergence::ExecutionError;

/// Desired placement of a file artifact
#[derive(Debug, Clone)]
pub struct FileSpec {
    pub path: PathBuf,
    pub mode: Option<u32>,
    pub owner: Option<String>,
    pub group: Option<String>,
    pub sensitive: bool,
}

impl FileSpec {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mode: None,
            owner: None,
            group: None,
            sensitive: false,
        }
    }

    pub fn mode(mut self, mode: u32) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Content must never be logged or echoed
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }
}

/// Parse a Chef-style mode string ("0640") as octal
pub fn parse_mode(mode: &str) -> Option<u32> {
    u32::from_str_radix(mode.trim_start_matches("0o"), 8).ok()
}

/// Scoped file creation and deletion
pub trait FileWriter: std::fmt::Debug + Send + Sync {
    /// Write `content` to `spec.path`, atomically with respect to partial
    /// writes
    fn write(&self, spec: &FileSpec, content: &[u8]) -> Result<(), ExecutionError>;

    /// Remove a file; returns whether anything was removed
    fn delete(&self, path: &Path) -> Result<bool, ExecutionError>;
}

/// Writes via a temp file in the target directory, then persists it over
/// the destination
#[derive(Debug, Default, Clone)]
pub struct AtomicFileWriter;

fn write_err(path: &Path, source: std::io::Error) -> ExecutionError {
    ExecutionError::FileWrite {
        path: path.to_path_buf(),
        source,
    }
}

impl FileWriter for AtomicFileWriter {
    fn write(&self, spec: &FileSpec, content: &[u8]) -> Result<(), ExecutionError> {
        let dir = spec.path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).map_err(|e| write_err(&spec.path, e))?;

        let mut tmp =
            tempfile::NamedTempFile::new_in(dir).map_err(|e| write_err(&spec.path, e))?;
        tmp.write_all(content).map_err(|e| write_err(&spec.path, e))?;

        #[cfg(unix)]
        if let Some(mode) = spec.mode {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(tmp.path(), fs::Permissions::from_mode(mode))
                .map_err(|e| write_err(&spec.path, e))?;
        }

        tmp.persist(&spec.path)
            .map_err(|e| write_err(&spec.path, e.error))?;

        if spec.owner.is_some() || spec.group.is_some() {
            chown(spec)?;
        }

        if spec.sensitive {
            log::debug!("wrote {} (content redacted)", spec.path.display());
        } else {
            log::debug!("wrote {} ({} bytes)", spec.path.display(), content.len());
        }

        Ok(())
    }

    fn delete(&self, path: &Path) -> Result<bool, ExecutionError> {
        match fs::remove_file(path) {
            Ok(()) => {
                log::debug!("removed {}", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(write_err(path, e)),
        }
    }
}

/// Apply owner/group by name. Name-to-id resolution needs the system user
/// database, so this delegates to chown(1) rather than linking libc.
#[cfg(unix)]
fn chown(spec: &FileSpec) -> Result<(), ExecutionError> {
    let ownership = match (&spec.owner, &spec.group) {
        (Some(owner), Some(group)) => format!("{owner}:{group}"),
        (Some(owner), None) => owner.clone(),
        (None, Some(group)) => format!(":{group}"),
        (None, None) => return Ok(()),
    };

    let output = std::process::Command::new("chown")
        .arg(&ownership)
        .arg(&spec.path)
        .output()
        .map_err(|e| write_err(&spec.path, e))?;

    if !output.status.success() {
        return Err(ExecutionError::Other(format!(
            "chown {ownership} {} failed: {}",
            spec.path.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    Ok(())
}

#[cfg(not(unix))]
fn chown(_spec: &FileSpec) -> Result<(), ExecutionError> {
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    use super::{FileSpec, FileWriter};
    use convergence::ExecutionError;
    use std::path::Path;
    use std::sync::Mutex;

    /// Writer that records every spec it sees and writes content without
    /// ownership side effects
    #[derive(Debug, Default)]
    pub struct CapturingWriter {
        pub writes: Mutex<Vec<FileSpec>>,
    }

    impl CapturingWriter {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn last_spec(&self) -> Option<FileSpec> {
            self.writes.lock().expect("writes lock").last().cloned()
        }
    }

    impl FileWriter for CapturingWriter {
        fn write(&self, spec: &FileSpec, content: &[u8]) -> Result<(), ExecutionError> {
            if let Some(parent) = spec.path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| super::write_err(&spec.path, e))?;
            }
            std::fs::write(&spec.path, content).map_err(|e| super::write_err(&spec.path, e))?;
            self.writes.lock().expect("writes lock").push(spec.clone());
            Ok(())
        }

        fn delete(&self, path: &Path) -> Result<bool, ExecutionError> {
            super::AtomicFileWriter.delete(path)
        }
    }
}
