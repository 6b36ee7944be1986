//! Memory-mapped output store.
//!
//! The output is pre-sized to the announced file size and written through a
//! writable mapping at block offsets. It lives at a temporary path until
//! `commit` syncs it and renames it into place; dropping an uncommitted
//! store deletes the temporary file.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use memmap2::{MmapMut, MmapOptions};
use vis_core::digest::{content_hash, ContentHash};

pub struct MemFile {
    path: PathBuf,
    file: Option<File>,
    /// `None` for an empty file; zero-length mappings are not portable.
    map: Option<MmapMut>,
    size: u64,
    committed: bool,
}

impl MemFile {
    /// Create (or truncate) `path` and map `size` writable bytes.
    pub fn create(path: impl Into<PathBuf>, size: u64) -> Result<Self, StoreError> {
        let path = path.into();
        let map_len = usize::try_from(size).map_err(|_| StoreError::TooLarge(size))?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| StoreError::io("create", &path, e))?;

        // From here on a failure must not leave the file behind.
        let mut store = Self {
            path,
            file: None,
            map: None,
            size,
            committed: false,
        };

        file.set_len(size)
            .map_err(|e| StoreError::io("resize", &store.path, e))?;

        if map_len > 0 {
            // Safety: the file was just created and is owned by this store;
            // nothing else maps or truncates it while the mapping lives.
            let map = unsafe { MmapOptions::new().len(map_len).map_mut(&file) }
                .map_err(|e| StoreError::io("map", &store.path, e))?;
            store.map = Some(map);
        }
        store.file = Some(file);

        tracing::debug!(path = %store.path.display(), size, "output store created");
        Ok(store)
    }

    /// Copy `bytes` into the store at `offset`.
    pub fn write_at(&mut self, offset: u64, bytes: &[u8]) -> Result<(), StoreError> {
        let out_of_bounds = StoreError::OutOfBounds {
            offset,
            len: bytes.len(),
            size: self.size,
        };
        let Some(end) = offset
            .checked_add(bytes.len() as u64)
            .filter(|&end| end <= self.size)
        else {
            return Err(out_of_bounds);
        };
        if bytes.is_empty() {
            return Ok(());
        }

        let map = self.map.as_mut().ok_or(out_of_bounds)?;
        map[offset as usize..end as usize].copy_from_slice(bytes);
        Ok(())
    }

    /// The whole mapped content.
    pub fn contents(&self) -> &[u8] {
        self.map.as_deref().unwrap_or(&[])
    }

    /// Digest of the whole content.
    pub fn digest(&self) -> ContentHash {
        content_hash(self.contents())
    }

    /// Persist the content and rename it to `dest`.
    ///
    /// Written bytes reach the disk before the rename, so `dest` only ever
    /// holds a complete file.
    pub fn commit(mut self, dest: &Path) -> Result<(), StoreError> {
        if let Some(map) = self.map.take() {
            map.flush()
                .map_err(|e| StoreError::io("flush", &self.path, e))?;
        }
        if let Some(file) = self.file.take() {
            file.sync_all()
                .map_err(|e| StoreError::io("sync", &self.path, e))?;
        }

        fs::rename(&self.path, dest).map_err(|e| StoreError::Rename {
            from: self.path.clone(),
            to: dest.to_path_buf(),
            source: e,
        })?;
        self.committed = true;

        tracing::debug!(path = %dest.display(), "output store committed");
        Ok(())
    }
}

impl Drop for MemFile {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        self.map = None;
        self.file = None;
        match fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "removed incomplete output"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "failed to remove incomplete output"
            ),
        }
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to {op} {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        source: io::Error,
    },

    #[error("failed to rename {} to {}: {source}", from.display(), to.display())]
    Rename {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },

    #[error("write of {len} bytes at offset {offset} exceeds store size {size}")]
    OutOfBounds { offset: u64, len: usize, size: u64 },

    #[error("file size {0} cannot be mapped on this platform")]
    TooLarge(u64),
}

impl StoreError {
    fn io(op: &'static str, path: &Path, source: io::Error) -> Self {
        StoreError::Io {
            op,
            path: path.to_path_buf(),
            source,
        }
    }
}
