//! Backing store: per-segment data/log file paths, file growth, and the in-memory buffer that
//! realizes the "virtual memory" the library hands back to the caller through an opaque handle.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};

use crate::error::{Result, RvmError};

pub fn data_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.rvm"))
}

pub fn log_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.rvmlog"))
}

/// A segment's in-memory buffer.
///
/// Deliberately a private heap copy of the data file's bytes, not a writable mapping backed by
/// it: the whole point of the redo/undo discipline is that a write the caller makes between
/// `about_to_modify` and `commit_trans` must not reach the data file except through the log codec.
/// A shared writable mapping would let the OS page cache flush an uncommitted write straight to
/// disk on its own schedule, silently defeating that contract. `flush` is therefore the only path
/// from buffer to file, and it only ever runs at a point SPEC_FULL.md's recovery/checkpoint rules
/// call for (map-time recovery, `truncate_log`).
pub struct SegmentBuffer(Vec<u8>);

impl SegmentBuffer {
    pub fn new(bytes: Vec<u8>) -> Self {
        SegmentBuffer(bytes)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Overwrite `file`'s contents in full with this buffer's current bytes.
    pub fn flush(&self, file: &File, path: &Path) -> Result<()> {
        let mut file = file;
        file.seek(SeekFrom::Start(0))
            .map_err(|err| RvmError::io(path, err))?;
        file.write_all(&self.0).map_err(|err| RvmError::io(path, err))
    }
}

impl Deref for SegmentBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl DerefMut for SegmentBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

/// Open (creating if absent) the data file for `name`, grow it to `requested_size` if that is
/// larger than its current length, and read its full contents into a fresh buffer.
/// `requested_size == 0` adopts the file's existing length as the effective size.
///
/// New bytes introduced by growth are zero, which `File::set_len` guarantees on ordinary
/// POSIX-like filesystems (the gap becomes a hole or is explicitly zero-filled by the OS).
pub fn open_and_map(dir: &Path, name: &str, requested_size: u64) -> Result<(File, SegmentBuffer)> {
    let path = data_path(dir, name);

    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&path)
        .map_err(|err| RvmError::io(&path, err))?;

    let current_len = file
        .metadata()
        .map_err(|err| RvmError::io(&path, err))?
        .len();

    let effective_size = if requested_size > current_len {
        file.set_len(requested_size)
            .map_err(|err| RvmError::io(&path, err))?;
        requested_size
    } else {
        current_len
    };

    let mut bytes = vec![0u8; effective_size as usize];
    if effective_size > 0 {
        file.seek(SeekFrom::Start(0))
            .map_err(|err| RvmError::io(&path, err))?;
        file.read_exact(&mut bytes)
            .map_err(|err| RvmError::io(&path, err))?;
    }

    Ok((file, SegmentBuffer(bytes)))
}

/// Create the library's backing directory if it does not already exist.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|err| RvmError::io(dir, err))
}

/// Unlink a file, treating "already absent" as success.
pub fn remove_if_present(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(RvmError::io(path, err)),
    }
}
