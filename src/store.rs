//! Interim artifact store.
//!
//! Named intermediate artifacts live in one directory and act as a simple
//! checkpoint layer between pipeline stages. Writes go to a temp file in
//! the same directory and are renamed into place on success, so a failed
//! stage never leaves a partial artifact behind.

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tempfile::NamedTempFile;
use tracing::info;

pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create interim directory {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path(name).exists()
    }

    pub fn open(&self, name: &str) -> Result<File> {
        let path = self.path(name);
        File::open(&path).with_context(|| format!("Failed to open artifact {}", path.display()))
    }

    /// Write an artifact atomically: the writer closure runs against a temp
    /// file which only replaces the named artifact once it returns Ok.
    pub fn write_atomic<F>(&self, name: &str, write: F) -> Result<PathBuf>
    where
        F: FnOnce(&mut dyn Write) -> Result<()>,
    {
        let path = self.path(name);
        let mut temp = NamedTempFile::new_in(&self.root)
            .with_context(|| format!("Failed to create temp file in {}", self.root.display()))?;

        write(&mut temp)?;
        temp.flush()?;
        temp.persist(&path)
            .with_context(|| format!("Failed to persist artifact {}", path.display()))?;

        info!("Wrote artifact {}", path.display());
        Ok(path)
    }
}
