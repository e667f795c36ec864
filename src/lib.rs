//! Recoverable Virtual Memory (RVM): an embeddable persistence engine that lets a caller treat
//! named byte-range segments as crash-durable, transactionally updated storage.
//!
//! The façade is [`Rvm`]: `init` a directory, `map` named segments into it, obtain a
//! [`Transaction`] via [`Rvm::begin_trans`], declare modifications with [`Rvm::about_to_modify`],
//! and call [`Rvm::commit_trans`] or [`Rvm::abort_trans`] to make them durable or discard them.
//! `truncate_log` checkpoints committed-but-unapplied redo logs back into their data files.

pub mod checkpoint;
pub mod codec;
pub mod config;
pub mod error;
pub mod segment;
pub mod store;
pub mod txn;

use std::path::PathBuf;

use error::{Result, RvmError};
use segment::{SegmentHandle, SegmentTable};
use txn::Transaction;

/// One library instance, bound to a single backing directory for its whole lifetime.
///
/// Owns the segment table and staging set. There is no
/// explicit `close`: the instance lives until dropped, at which point any still-mapped segments
/// are released without further I/O (their committed state already lives in their data/log
/// files).
pub struct Rvm {
    pub(crate) dir: PathBuf,
    pub(crate) table: SegmentTable,
}

impl Rvm {
    /// Bind a library instance to `dir`, creating it if absent and reusing it if present.
    pub fn init(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        store::ensure_dir(&dir)?;
        tracing::debug!(dir = %dir.display(), "rvm instance initialized");
        Ok(Rvm {
            dir,
            table: SegmentTable::new(),
        })
    }

    /// Map `name` into memory, creating/growing its data file to `requested_size` bytes and
    /// replaying any committed-but-not-yet-checkpointed redo log.
    ///
    /// `requested_size == 0` adopts the data file's existing length (or 0 if absent) as the
    /// segment's effective size, which is then immutable for this mapping.
    pub fn map(&mut self, name: &str, requested_size: i64) -> Result<SegmentHandle> {
        if name.is_empty() {
            return Err(RvmError::InvalidArgument(
                "map: segment name must not be empty".to_string(),
            ));
        }
        if requested_size < 0 {
            return Err(RvmError::InvalidArgument(format!(
                "map: requested_size must not be negative, got {requested_size}"
            )));
        }
        if self.table.is_mapped(name) {
            return Err(RvmError::AlreadyMapped(name.to_string()));
        }

        let (file, mut buffer) = store::open_and_map(&self.dir, name, requested_size as u64)?;

        let log_path = store::log_path(&self.dir, name);
        let applied =
            codec::replay_into(&mut buffer, &log_path).map_err(|err| RvmError::io(&log_path, err))?;
        if applied {
            let data_path = store::data_path(&self.dir, name);
            buffer.flush(&file, &data_path)?;
            file.sync_all().map_err(|err| RvmError::io(&data_path, err))?;
            store::remove_if_present(&log_path)?;
            tracing::warn!(segment = name, "recovered committed redo log at map time");
        }

        let size = buffer.len();
        let handle = self.table.insert(name.to_string(), file, buffer);
        tracing::info!(segment = name, size, "segment mapped");
        Ok(handle)
    }

    /// Release a mapped segment. A no-op if `handle` is stale or the segment is currently staged
    /// by a live transaction.
    pub fn unmap(&mut self, handle: SegmentHandle) {
        if self.table.is_staged(handle) {
            tracing::warn!("unmap refused: segment is staged by a live transaction");
            return;
        }
        if let Some(entry) = self.table.remove(handle) {
            tracing::info!(segment = %entry.name, "segment unmapped");
        }
    }

    /// Unlink a segment's data and log files. A no-op if the segment is currently mapped.
    /// Matches the original void-returning contract: I/O failures while unlinking are not
    /// reportable and are only logged.
    pub fn destroy(&mut self, name: &str) {
        if self.table.is_mapped(name) {
            tracing::warn!(segment = name, "destroy refused: segment is mapped");
            return;
        }

        let data_path = store::data_path(&self.dir, name);
        let log_path = store::log_path(&self.dir, name);
        if let Err(err) = store::remove_if_present(&data_path) {
            tracing::warn!(segment = name, %err, "destroy: failed to unlink data file");
        }
        if let Err(err) = store::remove_if_present(&log_path) {
            tracing::warn!(segment = name, %err, "destroy: failed to unlink log file");
        }
        tracing::info!(segment = name, "segment destroyed");
    }

    /// Begin a transaction spanning `segs`. Fails if `segs` is empty, any handle does not
    /// resolve to a currently mapped segment, or any listed segment is already staged — including
    /// a segment listed twice in `segs`, which stages successfully on its first occurrence and
    /// then fails as "already staged" on its second, exactly as a single check-and-stage pass
    /// over the list would.
    pub fn begin_trans(&mut self, segs: &[SegmentHandle]) -> Result<Transaction> {
        if segs.is_empty() {
            return Err(RvmError::InvalidArgument(
                "begin_trans: segs must not be empty".to_string(),
            ));
        }

        let mut staged = Vec::with_capacity(segs.len());
        for &handle in segs {
            if self.table.get(handle).is_none() {
                for &done in &staged {
                    self.table.unstage(done);
                }
                return Err(RvmError::InvalidArgument(
                    "begin_trans: segment handle is not currently mapped".to_string(),
                ));
            }
            if !self.table.stage(handle) {
                for &done in &staged {
                    self.table.unstage(done);
                }
                return Err(RvmError::StagingConflict(
                    "begin_trans: segment already staged by a live transaction".to_string(),
                ));
            }
            staged.push(handle);
        }

        tracing::debug!(segments = segs.len(), "transaction begun");
        Ok(Transaction::new(segs))
    }

    /// Apply every `*.rvmlog` in this instance's directory to its data file and delete the log.
    /// Refuses with [`RvmError::StagingConflict`] if any segment is currently staged.
    pub fn truncate_log(&mut self) -> Result<()> {
        checkpoint::truncate_log(self)
    }

    /// Whether `name` is currently mapped in this instance.
    pub fn is_mapped(&self, name: &str) -> bool {
        self.table.is_mapped(name)
    }

    /// Look up the handle for a currently mapped segment by name.
    pub fn handle_for_name(&self, name: &str) -> Option<SegmentHandle> {
        self.table.handle_for_name(name)
    }

    /// Read access to a mapped segment's bytes.
    pub fn segment(&self, handle: SegmentHandle) -> Option<&[u8]> {
        self.table.get(handle).map(|entry| &entry.buffer[..])
    }

    /// Write access to a mapped segment's bytes. The caller may write freely within the
    /// segment's fixed length but must declare the range via `about_to_modify` first if the
    /// write needs to survive an `abort_trans`.
    pub fn segment_mut(&mut self, handle: SegmentHandle) -> Option<&mut [u8]> {
        self.table.get_mut(handle).map(|entry| &mut entry.buffer[..])
    }

    /// The fixed byte length of a mapped segment.
    pub fn segment_len(&self, handle: SegmentHandle) -> Option<usize> {
        self.table.get(handle).map(|entry| entry.len())
    }
}
