// Directory buffer builder: short names per directory, LFN chains, and the
// serialized root and subdirectory regions.

use super::entry_tree::{EntryId, EntryTree};
use super::geometry::Layout;
use crate::fat_common::attributes::*;
use crate::fat_common::long_names::{
    build_lfn_entries, case_flags, needs_long_name, short_name_for, ShortNameAllocator,
};
use crate::fat_common::{DirEntry, FatTimestamp};
use chrono::{DateTime, Utc};
use log::{debug, trace};
use mkfat_core::MkfatError;

/// On-disk naming of one entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryNames {
    pub short_name: [u8; 11],
    pub case_flags: u8,
    /// LFN entries in on-disk order, empty when the short name is lossless.
    pub lfn_entries: Vec<[u8; 32]>,
}

/// Names for every entry, keyed by `EntryId`.
#[derive(Debug, Clone)]
pub struct NameTable {
    names: Vec<EntryNames>,
}

impl NameTable {
    /// Allocate short names directory by directory. Names that fit 8.3 claim
    /// their exact short name first, so an alias can never take it from them.
    pub fn build(tree: &EntryTree) -> Result<Self, MkfatError> {
        let mut names = vec![EntryNames::default(); tree.len()];

        for (_, dir) in tree.iter().filter(|(_, e)| e.is_directory()) {
            let mut allocator = ShortNameAllocator::new();
            let (short, long): (Vec<EntryId>, Vec<EntryId>) = dir
                .children()
                .iter()
                .copied()
                .partition(|&child| !needs_long_name(tree.get(child).name()));

            for child in short {
                let name = tree.get(child).name();
                names[child.index()] = EntryNames {
                    short_name: allocator.claim(name),
                    case_flags: case_flags(name),
                    lfn_entries: Vec::new(),
                };
            }
            for child in long {
                let name = tree.get(child).name();
                let short_name = allocator.allocate(name)?;
                trace!("{} -> {}", name, String::from_utf8_lossy(&short_name));
                names[child.index()] = EntryNames {
                    short_name,
                    case_flags: 0,
                    lfn_entries: build_lfn_entries(name, &short_name),
                };
            }
        }

        Ok(Self { names })
    }

    pub fn get(&self, id: EntryId) -> &EntryNames {
        &self.names[id.index()]
    }

    /// Number of LFN entries preceding the entry's short entry.
    pub fn lfn_count(&self, id: EntryId) -> usize {
        self.names[id.index()].lfn_entries.len()
    }

    /// Directory slots the entry occupies in its parent (LFN entries + 1).
    pub fn slot_count(&self, id: EntryId) -> usize {
        self.lfn_count(id) + 1
    }
}

/// Root directory region, padded to `max_root_entries` slots.
pub fn build_root_directory(
    tree: &EntryTree,
    names: &NameTable,
    layout: &Layout,
    default_time: Option<DateTime<Utc>>,
) -> Vec<u8> {
    let capacity = layout.geometry.root_dir_sectors() as usize * 512;
    let mut buffer = Vec::with_capacity(capacity);
    append_children(&mut buffer, tree, names, layout, EntryId::ROOT, default_time);
    buffer.resize(capacity, 0);

    debug!(
        "Root directory: {} children, {} of {} slots used",
        tree.get(EntryId::ROOT).children().len(),
        layout.sizes[0] / 32,
        layout.geometry.max_root_entries
    );
    buffer
}

/// Subdirectory cluster chain contents: `.` and `..` first, then children,
/// zero-filled to the end of the chain.
pub fn build_subdirectory(
    tree: &EntryTree,
    names: &NameTable,
    layout: &Layout,
    dir: EntryId,
    default_time: Option<DateTime<Utc>>,
) -> Vec<u8> {
    let entry = tree.get(dir);
    let capacity = (layout.cluster_count(dir) as u64 * layout.geometry.cluster_bytes()) as usize;
    let mut buffer = Vec::with_capacity(capacity);
    let timestamp = timestamp_for(tree, dir, default_time);

    let dot = DirEntry {
        short_name: short_name_for("."),
        attributes: ATTR_DIRECTORY,
        case_flags: 0,
        first_cluster: layout.clusters[dir.index()] as u32,
        size: 0,
        timestamp,
    };
    // Cluster 0 stands for the root directory
    let parent_cluster = match entry.parent() {
        Some(EntryId::ROOT) | None => 0,
        Some(parent) => layout.clusters[parent.index()] as u32,
    };
    let dotdot = DirEntry {
        short_name: short_name_for(".."),
        first_cluster: parent_cluster,
        ..dot
    };
    buffer.extend_from_slice(&dot.encode());
    buffer.extend_from_slice(&dotdot.encode());

    append_children(&mut buffer, tree, names, layout, dir, default_time);
    buffer.resize(capacity, 0);
    buffer
}

fn append_children(
    buffer: &mut Vec<u8>,
    tree: &EntryTree,
    names: &NameTable,
    layout: &Layout,
    dir: EntryId,
    default_time: Option<DateTime<Utc>>,
) {
    for &child in tree.get(dir).children() {
        let entry_names = names.get(child);
        for lfn in &entry_names.lfn_entries {
            buffer.extend_from_slice(lfn);
        }
        let raw = dir_entry_for(tree, names, layout, child, default_time).encode();
        buffer.extend_from_slice(&raw);
    }
}

/// Short entry for `id`. Links take cluster, size and directory bit from
/// their resolved target.
pub fn dir_entry_for(
    tree: &EntryTree,
    names: &NameTable,
    layout: &Layout,
    id: EntryId,
    default_time: Option<DateTime<Utc>>,
) -> DirEntry {
    let entry = tree.get(id);
    let entry_names = names.get(id);

    let mut attributes = entry.meta().attribute_bits();
    if tree.is_directory_like(id) {
        attributes |= ATTR_DIRECTORY;
    }

    DirEntry {
        short_name: entry_names.short_name,
        attributes,
        case_flags: entry_names.case_flags,
        first_cluster: layout.clusters[id.index()] as u32,
        size: layout.sizes[id.index()] as u32,
        timestamp: timestamp_for(tree, id, default_time),
    }
}

fn timestamp_for(tree: &EntryTree, id: EntryId, default_time: Option<DateTime<Utc>>) -> Option<FatTimestamp> {
    tree.get(id)
        .meta()
        .mtime
        .or_else(|| tree.get(tree.resolve(id)).meta().mtime)
        .or(default_time)
        .map(|t| FatTimestamp::from_datetime(&t))
}
