//! Persisted document handle with an exclusive read-modify-write protocol.
//!
//! Every mutation runs as:
//!
//! 1. take an advisory exclusive lock on `<config>.lock`
//! 2. load the current document and edit a private copy
//! 3. structural validation, then the external [`ConfigValidator`]
//! 4. write a temp file in the same directory, fsync, rename over the document
//! 5. release the lock
//!
//! Readers never lock: the document is only ever replaced by rename, so a
//! reader sees either the old or the new file in full.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::document::ConfigDocument;
use crate::loader::{ConfigError, load_document, serialize_document};
use crate::validate::validate_document;
use crate::validator::ConfigValidator;

/// What to do when another process holds the lock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LockMode {
    #[default]
    Wait,
    NoWait,
}

/// Result of a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit<T> {
    pub value: T,
    /// False when the mutation left the document as it was; nothing was written.
    pub changed: bool,
}

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    lock_mode: LockMode,
}

struct LockGuard {
    file: File,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(error = %e, "failed to release configuration lock");
        }
    }
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_mode: LockMode::default(),
        }
    }

    pub fn with_lock_mode(mut self, mode: LockMode) -> Self {
        self.lock_mode = mode;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Lock-free read of the committed document.
    pub fn read(&self) -> Result<ConfigDocument, ConfigError> {
        load_document(&self.path)
    }

    /// Commit a freshly synthesized document. Refuses to replace an existing
    /// one unless `overwrite` is set.
    pub fn create<V>(
        &self,
        validator: &V,
        doc: &ConfigDocument,
        overwrite: bool,
    ) -> Result<(), ConfigError>
    where
        V: ConfigValidator + ?Sized,
    {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let _guard = self.lock()?;
        if self.exists() && !overwrite {
            return Err(ConfigError::InvalidInput(format!(
                "{} already exists; pass --force to replace it",
                self.path.display()
            )));
        }
        validate_document(doc)?;
        validator.validate(doc)?;
        self.persist(doc)?;
        info!(path = %self.path.display(), role = %doc.role(), "configuration created");
        Ok(())
    }

    /// Run `mutate` against a private copy of the document and commit the
    /// result. Nothing is written if `mutate` fails, if it leaves the document
    /// unchanged, or if either validation step rejects the candidate.
    pub fn transaction<T, E, V, F>(&self, validator: &V, mutate: F) -> Result<Commit<T>, E>
    where
        V: ConfigValidator + ?Sized,
        F: FnOnce(&mut ConfigDocument) -> Result<T, E>,
        E: From<ConfigError>,
    {
        let _guard = self.lock()?;
        let current = self.read()?;
        let mut candidate = current.clone();
        let value = mutate(&mut candidate)?;

        if candidate == current {
            debug!(path = %self.path.display(), "mutation produced no change");
            return Ok(Commit {
                value,
                changed: false,
            });
        }

        validate_document(&candidate)?;
        validator.validate(&candidate).map_err(ConfigError::from)?;
        self.persist(&candidate)?;
        info!(path = %self.path.display(), "configuration committed");
        Ok(Commit {
            value,
            changed: true,
        })
    }

    /// Delete the document and its lock file. Returns whether a document existed.
    pub fn remove(&self) -> Result<bool, ConfigError> {
        let existed = {
            let _guard = self.lock()?;
            match fs::remove_file(&self.path) {
                Ok(()) => true,
                Err(e) if e.kind() == io::ErrorKind::NotFound => false,
                Err(e) => return Err(e.into()),
            }
        };
        match fs::remove_file(self.lock_path()) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        info!(path = %self.path.display(), existed, "configuration removed");
        Ok(existed)
    }

    fn lock(&self) -> Result<LockGuard, ConfigError> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path())?;
        match self.lock_mode {
            LockMode::Wait => file.lock_exclusive()?,
            LockMode::NoWait => file.try_lock_exclusive().map_err(|e| {
                if e.kind() == fs2::lock_contended_error().kind() {
                    ConfigError::Busy(self.path.clone())
                } else {
                    ConfigError::Io(e)
                }
            })?,
        }
        Ok(LockGuard { file })
    }

    fn persist(&self, doc: &ConfigDocument) -> Result<(), ConfigError> {
        let data = serialize_document(doc)?;
        let dir = match self.path.parent() {
            Some(d) if !d.as_os_str().is_empty() => d,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&data)?;
        tmp.as_file().sync_all()?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(tmp.path(), fs::Permissions::from_mode(0o644))?;
        }
        tmp.persist(&self.path).map_err(|e| ConfigError::Io(e.error))?;
        debug!(path = %self.path.display(), bytes = data.len(), "configuration written");
        Ok(())
    }
}
