//! Transaction engine: `begin_trans`/`about_to_modify`/`commit_trans`/`abort_trans`.
//!
//! A [`Transaction`] is plain data: the ordered list of segments it owns and their undo
//! records. It carries no reference back to its [`Rvm`] — every operation on it is a method on
//! `Rvm` that takes the transaction by reference or by value, mirroring the original C API's
//! `rvm_about_to_modify(trans, ...)`/`rvm_commit_trans(trans)` shape. This is deliberate: an
//! `Rvm`-owning transaction would make it impossible for the library instance to serve a second,
//! unrelated segment while the first transaction is outstanding. Two live transactions may
//! coexist as long as they don't touch the same segment, and the staging set, not a borrow, is
//! what enforces that.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;

use crate::error::{Result, RvmError};
use crate::segment::SegmentHandle;
use crate::store;
use crate::Rvm;

/// One declared byte-range snapshot, captured at `about_to_modify` time.
struct UndoRecord {
    offset: u64,
    length: u64,
    snapshot: Vec<u8>,
}

/// A live transaction spanning one or more staged segments.
///
/// Must end via [`Rvm::commit_trans`] or [`Rvm::abort_trans`]. Dropping one without calling
/// either is a caller bug with the same consequence as the original C API's leaked
/// `trans_context`: its segments stay staged until the process using this `Rvm` instance ends.
pub struct Transaction {
    order: Vec<SegmentHandle>,
    undo: HashMap<SegmentHandle, Vec<UndoRecord>>,
    done: bool,
}

impl Transaction {
    pub(crate) fn new(segs: &[SegmentHandle]) -> Self {
        let mut undo = HashMap::with_capacity(segs.len());
        for &handle in segs {
            undo.insert(handle, Vec::new());
        }
        Transaction {
            order: segs.to_vec(),
            undo,
            done: false,
        }
    }

    /// The segments this transaction owns, in `begin_trans` declaration order.
    pub fn segments(&self) -> &[SegmentHandle] {
        &self.order
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if !self.done {
            tracing::warn!(
                "transaction dropped without commit_trans/abort_trans; its segments remain staged"
            );
        }
    }
}

impl Rvm {
    /// Capture `handle`'s bytes at `[offset, offset+length)` before the caller mutates them.
    ///
    /// Silently a no-op if `handle` is not part of `trans`, the range overflows, or the range
    /// extends past the segment's length.
    pub fn about_to_modify(
        &mut self,
        trans: &mut Transaction,
        handle: SegmentHandle,
        offset: u64,
        length: u64,
    ) {
        let Some(records) = trans.undo.get_mut(&handle) else {
            return;
        };
        let Some(entry) = self.table.get(handle) else {
            return;
        };

        let Some(end) = offset.checked_add(length) else {
            return;
        };
        if end > entry.len() as u64 {
            return;
        }

        let snapshot = entry.buffer[offset as usize..end as usize].to_vec();
        tracing::debug!(segment = %entry.name, offset, length, "about_to_modify");
        records.push(UndoRecord {
            offset,
            length,
            snapshot,
        });
    }

    /// Emit a redo record per declared modification (payload = current, post-modification
    /// bytes), fsync the log, and unstage every segment `trans` owns.
    ///
    /// I/O failure mid-commit cannot be reported through this API's contract: each segment's
    /// log write is attempted independently and a failure on one segment does not prevent the
    /// others from being attempted.
    pub fn commit_trans(&mut self, mut trans: Transaction) {
        for &handle in &trans.order {
            let Some(records) = trans.undo.remove(&handle) else {
                continue;
            };
            let Some(entry) = self.table.get(handle) else {
                continue;
            };

            let log_path = store::log_path(&self.dir, &entry.name);
            if let Err(err) = write_redo_log(&log_path, &entry.buffer, &records) {
                tracing::warn!(segment = %entry.name, %err, "commit_trans: log write failed, proceeding per best-effort contract");
            } else {
                tracing::info!(segment = %entry.name, records = records.len(), "transaction committed");
            }

            self.table.unstage(handle);
        }
        trans.done = true;
    }

    /// Restore every captured snapshot in reverse declaration order and unstage every segment
    /// `trans` owns. No disk I/O is performed.
    pub fn abort_trans(&mut self, mut trans: Transaction) {
        for &handle in &trans.order {
            if let Some(records) = trans.undo.remove(&handle) {
                if let Some(entry) = self.table.get_mut(handle) {
                    for record in records.into_iter().rev() {
                        let start = record.offset as usize;
                        let end = start + record.length as usize;
                        entry.buffer[start..end].copy_from_slice(&record.snapshot);
                    }
                    tracing::info!(segment = %entry.name, "transaction aborted");
                }
            }
            self.table.unstage(handle);
        }
        trans.done = true;
    }
}

fn write_redo_log(
    log_path: &std::path::Path,
    buffer: &[u8],
    records: &[UndoRecord],
) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(log_path)
        .map_err(|err| RvmError::io(log_path, err))?;

    for record in records {
        let start = record.offset as usize;
        let end = start + record.length as usize;
        let current = crate::codec::RedoRecord::new(record.offset, buffer[start..end].to_vec());
        current
            .encode(&mut file)
            .map_err(|err| RvmError::io(log_path, err))?;
    }

    file.flush().map_err(|err| RvmError::io(log_path, err))?;
    file.sync_all().map_err(|err| RvmError::io(log_path, err))?;
    Ok(())
}
