// Geometry calculator: directory sizes, cluster size, cluster assignment and
// the resulting region layout. Everything here is computed before the first
// byte is written, so capacity errors never leave a partial image behind.

use super::directory::NameTable;
use super::entry_tree::{EntryId, EntryKind, EntryTree};
use crate::fat_common::constants::*;
use log::{debug, info};
use mkfat_core::{ImageOptions, MkfatError};
use serde::Serialize;

/// Volume geometry derived from the entry set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Geometry {
    pub sectors_per_cluster: u8,
    pub reserved_sectors: u16,
    pub fat_count: u8,
    pub max_root_entries: u16,
    /// Clusters referenced by entries.
    pub data_clusters: u32,
    /// Unreferenced clusters appended for caller-reserved space and to stay
    /// above the FAT12 cluster-count threshold.
    pub empty_clusters: u32,
    pub fat_sectors: u32,
    pub media_descriptor: u8,
}

impl Geometry {
    pub fn cluster_bytes(&self) -> u64 {
        self.sectors_per_cluster as u64 * SECTOR_SIZE
    }

    /// Clusters needed for `size` bytes; every entry owns at least one.
    pub fn clusters_for(&self, size: u64) -> u32 {
        clusters_for(size, self.cluster_bytes())
    }

    pub fn total_clusters(&self) -> u32 {
        self.data_clusters + self.empty_clusters
    }

    pub fn root_dir_sectors(&self) -> u32 {
        (self.max_root_entries as u64 * DIR_ENTRY_SIZE / SECTOR_SIZE) as u32
    }

    pub fn fat_offset(&self, copy: u8) -> u64 {
        (self.reserved_sectors as u64 + copy as u64 * self.fat_sectors as u64) * SECTOR_SIZE
    }

    pub fn root_dir_offset(&self) -> u64 {
        self.fat_offset(self.fat_count)
    }

    pub fn data_area_offset(&self) -> u64 {
        self.root_dir_offset() + self.root_dir_sectors() as u64 * SECTOR_SIZE
    }

    /// Byte offset of a data cluster (clusters start at 2).
    pub fn cluster_offset(&self, cluster: u16) -> u64 {
        self.data_area_offset() + (cluster as u64 - FIRST_DATA_CLUSTER as u64) * self.cluster_bytes()
    }

    pub fn total_sectors(&self) -> u32 {
        self.reserved_sectors as u32
            + self.fat_count as u32 * self.fat_sectors
            + self.root_dir_sectors()
            + self.total_clusters() * self.sectors_per_cluster as u32
    }

    pub fn image_size(&self) -> u64 {
        self.total_sectors() as u64 * SECTOR_SIZE
    }
}

/// Output of the geometry phase. `sizes` and `clusters` are indexed by
/// `EntryId`; links carry their target's values, the root carries cluster 0.
#[derive(Debug, Clone)]
pub struct Layout {
    pub geometry: Geometry,
    pub sizes: Vec<u64>,
    pub clusters: Vec<u16>,
}

impl Layout {
    pub fn size(&self, id: EntryId) -> u64 {
        self.sizes[id.index()]
    }

    pub fn cluster(&self, id: EntryId) -> u16 {
        self.clusters[id.index()]
    }

    pub fn cluster_count(&self, id: EntryId) -> u32 {
        self.geometry.clusters_for(self.size(id))
    }

    pub fn offset(&self, id: EntryId) -> u64 {
        self.geometry.cluster_offset(self.cluster(id))
    }

    /// `(first_cluster, cluster_count)` for every entry that owns clusters.
    pub fn chains<'a>(&'a self, tree: &'a EntryTree) -> impl Iterator<Item = (u32, u32)> + 'a {
        tree.iter()
            .filter(|(id, entry)| *id != EntryId::ROOT && !entry.is_link())
            .map(move |(id, _)| (self.cluster(id) as u32, self.cluster_count(id)))
    }
}

fn clusters_for(size: u64, cluster_bytes: u64) -> u32 {
    size.div_ceil(cluster_bytes).max(1) as u32
}

fn sectors_for(bytes: u64) -> u64 {
    bytes.div_ceil(SECTOR_SIZE)
}

fn too_much_data() -> MkfatError {
    MkfatError::CapacityExceeded("requested data size overflows a 64-bit byte count".to_string())
}

/// Pick sectors per cluster for `data_bytes` of content spread over
/// `entry_count` cluster-owning entries.
///
/// The smallest size whose FAT16 minimum cluster count plus one cluster of
/// slack per entry covers the data wins; 64 is the fallback as long as the
/// data stays below the FAT16 ceiling. Data is compared in bytes so partial
/// sectors are not rounded up entry by entry.
pub fn choose_cluster_size(data_bytes: u64, entry_count: u64) -> Result<u8, MkfatError> {
    for &size in CLUSTER_SIZES.iter() {
        let limit = (size as u64 * SECTOR_SIZE)
            .saturating_mul((FAT16_MIN_CLUSTERS as u64).saturating_add(entry_count));
        if data_bytes < limit {
            return Ok(size);
        }
    }

    let largest = CLUSTER_SIZES[CLUSTER_SIZES.len() - 1];
    if data_bytes < largest as u64 * SECTOR_SIZE * FAT32_MIN_CLUSTERS as u64 {
        return Ok(largest);
    }

    Err(MkfatError::CapacityExceeded(format!(
        "{} bytes of data do not fit in FAT16 even with {}-sector clusters",
        data_bytes, largest
    )))
}

/// Run the geometry phase.
///
/// `file_sizes` is indexed by `EntryId` and only consulted for files.
pub fn compute_layout(
    tree: &EntryTree,
    names: &NameTable,
    file_sizes: &[u64],
    options: &ImageOptions,
) -> Result<Layout, MkfatError> {
    let count = tree.len();
    let mut sizes = vec![0u64; count];

    // Directory sizes from their children's slot counts
    for (id, entry) in tree.iter() {
        sizes[id.index()] = match entry.kind() {
            EntryKind::File(_) => file_sizes.get(id.index()).copied().unwrap_or(0),
            EntryKind::Directory => {
                let slots: usize = entry.children().iter().map(|&c| names.slot_count(c)).sum();
                // `.` and `..` live in every directory but the root
                let dots = if id == EntryId::ROOT { 0 } else { 2 };
                (slots + dots) as u64 * DIR_ENTRY_SIZE
            }
            EntryKind::Link(_) => 0,
        };
    }

    let root_slots = sizes[0] / DIR_ENTRY_SIZE;
    let max_root_entries = (root_slots.max(1) + DIR_ENTRIES_PER_SECTOR - 1) / DIR_ENTRIES_PER_SECTOR
        * DIR_ENTRIES_PER_SECTOR;
    if max_root_entries > u16::MAX as u64 {
        return Err(MkfatError::CapacityExceeded(format!(
            "root directory needs {} entries; at most {} fit",
            root_slots,
            u16::MAX
        )));
    }

    let owners: Vec<EntryId> = tree
        .iter()
        .filter(|(id, entry)| *id != EntryId::ROOT && !entry.is_link())
        .map(|(id, _)| id)
        .collect();
    let content_bytes = owners
        .iter()
        .try_fold(0u64, |total, id| total.checked_add(sizes[id.index()]))
        .ok_or_else(too_much_data)?;
    // Reserved space counts in whole sectors
    let data_bytes = sectors_for(options.extra_space)
        .checked_mul(SECTOR_SIZE)
        .and_then(|extra| extra.checked_add(content_bytes))
        .ok_or_else(too_much_data)?;
    let sectors_per_cluster = choose_cluster_size(data_bytes, owners.len() as u64)?;
    let cluster_bytes = sectors_per_cluster as u64 * SECTOR_SIZE;
    info!(
        "FAT16 geometry: {} data bytes in {} entries, {} sectors per cluster",
        content_bytes,
        owners.len(),
        sectors_per_cluster
    );

    // Declaration order: a link always follows its target in the arena
    let mut clusters = vec![0u16; count];
    let mut next = FIRST_DATA_CLUSTER as u64;
    for (id, entry) in tree.iter().skip(1) {
        let i = id.index();
        match entry.kind() {
            EntryKind::Link(target) => {
                clusters[i] = clusters[target.index()];
                sizes[i] = sizes[target.index()];
            }
            _ => {
                if next > (FAT16_MAX_CLUSTERS + 1) as u64 {
                    return Err(too_many_clusters(next - FIRST_DATA_CLUSTER as u64));
                }
                clusters[i] = next as u16;
                next += clusters_for(sizes[i], cluster_bytes) as u64;
            }
        }
        debug!("{} -> cluster {} ({} bytes)", entry.path(), clusters[i], sizes[i]);
    }

    let data_clusters = next - FIRST_DATA_CLUSTER as u64;
    let reserved_clusters = options.extra_space.div_ceil(cluster_bytes);
    let empty_clusters =
        reserved_clusters.max((FAT16_MIN_CLUSTERS as u64).saturating_sub(data_clusters));
    let total_clusters = data_clusters + empty_clusters;
    if total_clusters > FAT16_MAX_CLUSTERS as u64 {
        return Err(too_many_clusters(total_clusters));
    }

    let fat_bytes = (total_clusters + FIRST_DATA_CLUSTER as u64) * FAT16_ENTRY_SIZE;
    let geometry = Geometry {
        sectors_per_cluster,
        reserved_sectors: options.reserved_sectors,
        fat_count: options.fat_count,
        max_root_entries: max_root_entries as u16,
        data_clusters: data_clusters as u32,
        empty_clusters: empty_clusters as u32,
        fat_sectors: sectors_for(fat_bytes) as u32,
        media_descriptor: options.media_descriptor,
    };

    info!(
        "FAT16 layout: {} data + {} empty clusters, {} sectors per FAT, {} root entries, {} total sectors",
        geometry.data_clusters,
        geometry.empty_clusters,
        geometry.fat_sectors,
        geometry.max_root_entries,
        geometry.total_sectors()
    );

    Ok(Layout { geometry, sizes, clusters })
}

fn too_many_clusters(clusters: u64) -> MkfatError {
    MkfatError::CapacityExceeded(format!(
        "{} clusters needed; FAT16 addresses at most {}",
        clusters, FAT16_MAX_CLUSTERS
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout_for(tree: &EntryTree, file_sizes: &[u64], options: &ImageOptions) -> Result<Layout, MkfatError> {
        let names = NameTable::build(tree)?;
        compute_layout(tree, &names, file_sizes, options)
    }

    #[test]
    fn test_choose_cluster_size() {
        let sector = SECTOR_SIZE;
        assert_eq!(choose_cluster_size(0, 0).unwrap(), 4);
        assert_eq!(choose_cluster_size(4 * 4085 * sector - 1, 0).unwrap(), 4);
        assert_eq!(choose_cluster_size(4 * 4085 * sector, 0).unwrap(), 8);
        assert_eq!(choose_cluster_size(4 * 4086 * sector, 1).unwrap(), 8);
        assert_eq!(choose_cluster_size(32 * 4085 * sector + 1, 0).unwrap(), 64);
        assert_eq!(choose_cluster_size(64 * 65525 * sector - 1, 0).unwrap(), 64);
        assert!(matches!(
            choose_cluster_size(64 * 65525 * sector, 0),
            Err(MkfatError::CapacityExceeded(_))
        ));
        assert!(matches!(
            choose_cluster_size(u64::MAX, u64::MAX),
            Err(MkfatError::CapacityExceeded(_))
        ));
    }

    #[test]
    fn test_file_and_link_scenario() {
        let mut tree = EntryTree::new();
        let file = tree.add_file("/a.bin", vec![0u8; 1500]).unwrap();
        let sub = tree.add_directory("/sub").unwrap();
        let link = tree.add_link("/sub/a.bin", "/a.bin").unwrap();

        let mut sizes = vec![0; tree.len()];
        sizes[file.index()] = 1500;
        let layout = layout_for(&tree, &sizes, &ImageOptions::default()).unwrap();

        assert_eq!(layout.geometry.sectors_per_cluster, 4);
        assert_eq!(layout.cluster(file), 2);
        assert_eq!(layout.cluster(sub), 3);
        assert_eq!(layout.cluster(link), 2);
        assert_eq!(layout.size(link), 1500);
        // `.`, `..` and the link
        assert_eq!(layout.size(sub), 96);
        assert_eq!(layout.size(EntryId::ROOT), 64);
        assert_eq!(layout.geometry.max_root_entries, 16);

        assert_eq!(layout.geometry.data_clusters, 2);
        assert_eq!(layout.geometry.total_clusters(), 4085);
        assert_eq!(layout.chains(&tree).collect::<Vec<_>>(), vec![(2, 1), (3, 1)]);
    }

    #[test]
    fn test_cluster_boundaries() {
        let mut tree = EntryTree::new();
        let empty = tree.add_file("/empty", Vec::new()).unwrap();
        let exact = tree.add_file("/exact", vec![0u8; 4096]).unwrap();
        let over = tree.add_file("/over", vec![0u8; 4097]).unwrap();
        let last = tree.add_file("/last", vec![0u8; 1]).unwrap();

        let mut sizes = vec![0; tree.len()];
        sizes[exact.index()] = 4096;
        sizes[over.index()] = 4097;
        sizes[last.index()] = 1;
        let layout = layout_for(&tree, &sizes, &ImageOptions::default()).unwrap();

        assert_eq!(layout.cluster_count(empty), 1);
        assert_eq!(layout.cluster(empty), 2);
        assert_eq!(layout.cluster(exact), 3);
        assert_eq!(layout.cluster_count(exact), 2);
        assert_eq!(layout.cluster(over), 5);
        assert_eq!(layout.cluster_count(over), 3);
        assert_eq!(layout.cluster(last), 8);
    }

    #[test]
    fn test_regions_are_contiguous() {
        let tree = EntryTree::new();
        let options = ImageOptions { fat_count: 2, reserved_sectors: 4, ..Default::default() };
        let layout = layout_for(&tree, &[0], &options).unwrap();
        let g = layout.geometry;

        // (4085 + 2) * 2 bytes
        assert_eq!(g.fat_sectors, 16);
        assert_eq!(g.fat_offset(0), 4 * 512);
        assert_eq!(g.fat_offset(1), (4 + 16) * 512);
        assert_eq!(g.root_dir_offset(), (4 + 32) * 512);
        assert_eq!(g.data_area_offset(), (4 + 32 + 1) * 512);
        assert_eq!(g.cluster_offset(2), g.data_area_offset());
        assert_eq!(g.total_sectors(), 4 + 32 + 1 + 4085 * 4);
        assert_eq!(g.image_size(), g.total_sectors() as u64 * 512);
    }

    #[test]
    fn test_extra_space_adds_clusters() {
        let tree = EntryTree::new();
        let options = ImageOptions { extra_space: 16 * 1024 * 1024, ..Default::default() };
        let g = layout_for(&tree, &[0], &options).unwrap().geometry;
        assert_eq!(g.sectors_per_cluster, 16);
        // the FAT12 threshold already covers the reservation
        assert_eq!(g.empty_clusters, 4085);
        assert!(g.image_size() >= options.extra_space);

        let options = ImageOptions { extra_space: 200 * 1024 * 1024, ..Default::default() };
        let g = layout_for(&tree, &[0], &options).unwrap().geometry;
        assert_eq!(g.sectors_per_cluster, 64);
        assert_eq!(g.empty_clusters, 6400);
        assert_eq!(g.data_clusters, 0);
    }

    #[test]
    fn test_small_files_are_not_rounded_up_one_by_one() {
        // 998 one-byte files, their directory and one large file: 19500
        // sectors + 1000 bytes over 1000 entries fits 4-sector clusters, while
        // rounding every entry up to a sector would pass 4 * (4085 + 1000).
        let mut tree = EntryTree::new();
        let big = tree.add_file("/big.bin", Vec::new()).unwrap();
        let dir = tree.add_directory("/tiny").unwrap();
        for i in 0..998 {
            tree.add_file(&format!("/tiny/F{}", i), Vec::new()).unwrap();
        }

        let mut sizes = vec![1u64; tree.len()];
        sizes[0] = 0;
        // the directory is sized from its children, so only files count here
        sizes[dir.index()] = 0;
        let dir_bytes = (998 + 2) * DIR_ENTRY_SIZE;
        sizes[big.index()] = 19_500 * SECTOR_SIZE + 1000 - 998 - dir_bytes;

        let layout = layout_for(&tree, &sizes, &ImageOptions::default()).unwrap();
        assert_eq!(layout.geometry.sectors_per_cluster, 4);
    }

    #[test]
    fn test_overflowing_sizes_are_capacity_errors() {
        let tree = EntryTree::new();
        let options = ImageOptions { extra_space: u64::MAX, ..Default::default() };
        assert!(matches!(
            layout_for(&tree, &[0], &options),
            Err(MkfatError::CapacityExceeded(_))
        ));

        let mut tree = EntryTree::new();
        let a = tree.add_file("/a", Vec::new()).unwrap();
        let b = tree.add_file("/b", Vec::new()).unwrap();
        let mut sizes = vec![0; tree.len()];
        sizes[a.index()] = u64::MAX;
        sizes[b.index()] = u64::MAX;
        assert!(matches!(
            layout_for(&tree, &sizes, &ImageOptions::default()),
            Err(MkfatError::CapacityExceeded(_))
        ));
    }

    #[test]
    fn test_capacity_exceeded() {
        let mut tree = EntryTree::new();
        let big = tree.add_file("/big", Vec::new()).unwrap();
        let mut sizes = vec![0; tree.len()];
        sizes[big.index()] = 64 * 65525 * 512;
        assert!(matches!(
            layout_for(&tree, &sizes, &ImageOptions::default()),
            Err(MkfatError::CapacityExceeded(_))
        ));

        // Fits the cluster-size rule but not the cluster-count ceiling
        let options = ImageOptions { extra_space: 64 * 65524 * 512, ..Default::default() };
        sizes[big.index()] = 1;
        assert!(matches!(
            layout_for(&tree, &sizes, &options),
            Err(MkfatError::CapacityExceeded(_))
        ));
    }
}
