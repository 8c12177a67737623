// Import a host directory tree into an entry tree

use super::entry_tree::{EntryMeta, EntryTree};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use mkfat_core::{FileSource, MkfatError};
use std::fs;
use std::path::Path;

/// Recursively declare the contents of `host_path` under the root directory.
/// Entries are sorted by name and each directory is declared before its
/// contents. Returns the number of entries declared.
pub fn import_host_directory(tree: &mut EntryTree, host_path: &Path) -> Result<usize, MkfatError> {
    if !host_path.is_dir() {
        return Err(MkfatError::Configuration(format!(
            "{} is not a directory",
            host_path.display()
        )));
    }
    import_into(tree, host_path, "")
}

fn import_into(tree: &mut EntryTree, host_dir: &Path, image_dir: &str) -> Result<usize, MkfatError> {
    let mut children: Vec<_> = fs::read_dir(host_dir)?.collect::<Result<_, _>>()?;
    children.sort_by_key(|entry| entry.file_name());

    let mut count = 0;
    for child in children {
        let file_name = child.file_name();
        let name = file_name.to_str().ok_or_else(|| {
            MkfatError::InvalidName(format!("{} is not valid UTF-8", child.path().display()))
        })?;
        let image_path = format!("{}/{}", image_dir, name);

        // Follows host symlinks
        let metadata = fs::metadata(child.path())?;
        let meta = EntryMeta {
            mtime: metadata.modified().ok().map(DateTime::<Utc>::from),
            read_only: metadata.permissions().readonly(),
            ..Default::default()
        };

        if metadata.is_dir() {
            tree.add_directory_with(&image_path, meta)?;
            count += 1 + import_into(tree, &child.path(), &image_path)?;
        } else if metadata.is_file() {
            debug!("{} <- {}", image_path, child.path().display());
            tree.add_file_with(&image_path, FileSource::new(child.path()), meta)?;
            count += 1;
        } else {
            warn!("Skipping {}: not a regular file or directory", child.path().display());
        }
    }
    Ok(count)
}
