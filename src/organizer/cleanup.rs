use std::path::{Path, PathBuf};

use miette::Result;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Remove every empty directory below `root`, deepest first, so that
/// directories only containing empty directories are removed too.
///
/// `root` itself is kept. Directories that cannot be read or removed are
/// logged and left in place.
pub fn remove_empty_dirs(root: &Path) -> Result<Vec<PathBuf>> {
    let mut removed = Vec::new();
    if !root.is_dir() {
        return Ok(removed);
    }

    let walker = WalkDir::new(root)
        .min_depth(1)
        .contents_first(true)
        .follow_links(false);

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!("Could not walk directory: {err}");
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }

        let path = entry.path();
        let is_empty = match std::fs::read_dir(path) {
            Ok(mut entries) => entries.next().is_none(),
            Err(err) => {
                warn!("Could not read {}: {err}", path.display());
                continue;
            }
        };

        if is_empty {
            match std::fs::remove_dir(path) {
                Ok(()) => {
                    debug!("Removed empty directory {}", path.display());
                    removed.push(path.to_path_buf());
                }
                Err(err) => warn!("Could not remove {}: {err}", path.display()),
            }
        }
    }

    Ok(removed)
}
