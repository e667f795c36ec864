//! Checkpointer: `truncate_log`.
//!
//! Sweeps the library's directory for `*.rvmlog` files and applies each into its data file,
//! loading currently-unmapped segments transiently via `map`/`unmap` to reuse the exact
//! recovery path `map` already runs when it finds a pending log. Best-effort and idempotent:
//! reapplying an already-applied (now-empty) log is a no-op.

use crate::codec;
use crate::error::{Result, RvmError};
use crate::store;
use crate::Rvm;

const LOG_SUFFIX: &str = ".rvmlog";

pub(crate) fn truncate_log(rvm: &mut Rvm) -> Result<()> {
    if rvm.table.any_staged() {
        return Err(RvmError::StagingConflict(
            "truncate_log refused: a segment in this library instance is staged".to_string(),
        ));
    }

    let entries = match std::fs::read_dir(&rvm.dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(RvmError::io(&rvm.dir, err)),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| RvmError::io(&rvm.dir, err))?;
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        if let Some(stem) = file_name.strip_suffix(LOG_SUFFIX) {
            names.push(stem.to_string());
        }
    }

    for name in names {
        truncate_one(rvm, &name)?;
    }

    Ok(())
}

fn truncate_one(rvm: &mut Rvm, name: &str) -> Result<()> {
    let log_path = store::log_path(&rvm.dir, name);

    if let Some(handle) = rvm.table.handle_for_name(name) {
        let entry = rvm
            .table
            .get_mut(handle)
            .expect("handle_for_name returned a handle that does not resolve");
        let applied = codec::replay_into(&mut entry.buffer, &log_path)
            .map_err(|err| RvmError::io(&log_path, err))?;
        if applied {
            let data_path = store::data_path(&rvm.dir, name);
            entry.buffer.flush(&entry.data_file, &data_path)?;
            entry
                .data_file
                .sync_all()
                .map_err(|err| RvmError::io(&data_path, err))?;
            tracing::info!(segment = name, "log truncated (live segment)");
        }
    } else {
        let handle = rvm.map(name, 0)?;
        rvm.unmap(handle);
        tracing::info!(segment = name, "log truncated (transient map)");
    }

    store::remove_if_present(&log_path)
}
