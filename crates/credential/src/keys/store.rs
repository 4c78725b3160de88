//! Persistence for key entries
//!
//! Entries are small base64 strings addressed by name. Nothing stored here is
//! secret in the clear: the private key only ever arrives sealed.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::KeyError;

/// Named string storage for key entries
pub trait BlobStore: Send + Sync + fmt::Debug {
    /// Read an entry, `None` when absent
    fn get(&self, name: &str) -> Result<Option<String>, KeyError>;

    /// Create or replace an entry
    fn put(&self, name: &str, value: &str) -> Result<(), KeyError>;

    /// Delete an entry; deleting a missing entry is not an error
    fn remove(&self, name: &str) -> Result<(), KeyError>;
}

/// In-memory blob store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for MemoryStore {
    fn get(&self, name: &str) -> Result<Option<String>, KeyError> {
        Ok(self.entries.lock().get(name).cloned())
    }

    fn put(&self, name: &str, value: &str) -> Result<(), KeyError> {
        self.entries.lock().insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<(), KeyError> {
        self.entries.lock().remove(name);
        Ok(())
    }
}

/// Blob store keeping one file per entry in a directory
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) the store directory
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, KeyError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Directory holding the entries
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

impl BlobStore for FileStore {
    fn get(&self, name: &str) -> Result<Option<String>, KeyError> {
        match fs::read_to_string(self.path(name)) {
            Ok(value) => Ok(Some(value.trim().to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, name: &str, value: &str) -> Result<(), KeyError> {
        // Write to a sibling file first so a crash never leaves half an entry
        let tmp = self.path(&format!(".{name}.tmp"));
        write_private(&tmp, value.as_bytes())?;
        fs::rename(&tmp, self.path(name))?;
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<(), KeyError> {
        match fs::remove_file(self.path(name)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// Write a file readable only by the owner
pub(crate) fn write_private(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}
