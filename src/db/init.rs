use std::io;

use crate::error::{Error, Result};
use crate::fs::DIR_MODE;

use super::metadata::METADATA_DIR;
use super::shard::{ShardIndex, SENTINEL_SHARD};
use super::{Shared, State};

/// Opens the on-disk layout: creates it on first use, otherwise loads and
/// validates it, recovering the entry count after an unclean shutdown.
pub(super) fn initialize(shared: &Shared) -> Result<()> {
    let mut state = shared.state.write()?;

    let info = match shared.fs.stat(&shared.config.dir) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return create_storage(shared, &mut state);
        }
        Err(e) => return Err(Error::io("stat database path", e)),
        Ok(info) => info,
    };

    if !info.is_dir {
        return Err(Error::Corruption(
            "database path is not a directory".to_string(),
        ));
    }
    if info.mode & 0o700 != 0o700 {
        return Err(Error::Corruption(
            "database path permissions are not 0700".to_string(),
        ));
    }

    state.metadata = shared.metadata_store.load()?;
    state.metadata.validate()?;
    state.shards = ShardIndex::load(shared.fs.as_ref(), &shared.data_root)?;

    if state.metadata.generation != state.metadata.checkpoint {
        recover(shared, &mut state)?;
    }
    Ok(())
}

fn create_storage(shared: &Shared, state: &mut State) -> Result<()> {
    let paths = [
        shared.config.dir.clone(),
        shared.data_root.clone(),
        shared.data_root.join(SENTINEL_SHARD),
        shared.config.dir.join(METADATA_DIR),
    ];
    for path in &paths {
        shared
            .fs
            .create_dir_all(path, DIR_MODE)
            .map_err(|e| Error::io("create directory", e))?;
    }
    shared.sync_internal(state)
}

/// The previous process did not close cleanly. Every record write is atomic
/// and a deletion is a single remove, so the only state that can drift is
/// the entry count: recount the record files and persist a clean checkpoint.
fn recover(shared: &Shared, state: &mut State) -> Result<()> {
    let total = state.shards.total_files();
    state.metadata.total_entries = total;
    state.metadata.checkpoint = state.metadata.generation;
    shared.metadata_store.save(&state.metadata)?;

    tracing::info!(
        total_entries = total,
        "recovered entry count after unclean shutdown"
    );
    Ok(())
}
