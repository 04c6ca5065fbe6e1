use std::io;
use std::path::Path;

use tracing::warn;

use crate::path::validate_name;
use crate::stat::FileStat;

/// Snapshots the regular files directly inside `root`.
///
/// Directories, symlinks, and other non-regular entries are skipped, as are
/// entries whose names are not valid UTF-8 or would not survive a round trip
/// through [`crate::MountPath::wrap`]. Entries that disappear between the
/// directory read and the stat are skipped rather than failing the snapshot.
pub fn list_regular(root: &Path) -> io::Result<Vec<(String, FileStat)>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if !file_type.is_file() {
            continue;
        }
        let Ok(name) = entry.file_name().into_string() else {
            warn!(path = %entry.path().display(), "skipping non-UTF-8 entry");
            continue;
        };
        if validate_name(&name).is_err() {
            warn!(%name, "skipping entry with unusable name");
            continue;
        }
        match FileStat::read(&entry.path()) {
            Ok(stat) => files.push((name, stat)),
            Err(error) => {
                warn!(%name, %error, "skipping entry that failed to stat");
            }
        }
    }
    Ok(files)
}
