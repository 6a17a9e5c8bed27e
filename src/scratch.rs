use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::error::{ConvertError, ConvertResult};

/// Temporary working directory for a single conversion. Video inputs are
/// materialized here so ffmpeg can seek, and video outputs are written here
/// before their bytes are read back. Dropped (and deleted) with the
/// conversion.
pub struct Scratch {
    dir: tempfile::TempDir,
    counter: u32,
}

impl Scratch {
    /// Create a scratch directory, under `cache_dir` when given so partial
    /// artifacts land on a filesystem the caller controls.
    pub fn new(cache_dir: Option<&Path>) -> ConvertResult<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("stickerpress-");
        let dir = match cache_dir {
            Some(parent) => builder.tempdir_in(parent),
            None => builder.tempdir(),
        }
        .map_err(|e| ConvertError::other(format!("create scratch dir: {e}")))?;
        Ok(Self { dir, counter: 0 })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Reserve a unique path with the given suffix, without creating a file.
    pub fn unique_path(&mut self, suffix: &str) -> PathBuf {
        self.counter += 1;
        self.dir.path().join(format!("work-{}.{suffix}", self.counter))
    }

    /// Write `bytes` to a fresh file and return its path.
    pub fn materialize(&mut self, bytes: &[u8], suffix: &str) -> ConvertResult<PathBuf> {
        let path = self.unique_path(suffix);
        fs::write(&path, bytes)
            .map_err(|e| ConvertError::other(format!("write scratch file: {e}")))?;
        Ok(path)
    }
}
