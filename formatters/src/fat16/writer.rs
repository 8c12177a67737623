// Disk writer: emits every serialized region at its offset. All regions are
// disjoint, so after the medium is pre-extended the writes run concurrently.

use super::entry_tree::{EntryId, EntryKind, EntryTree};
use super::geometry::Layout;
use futures::future::{try_join_all, BoxFuture};
use log::{debug, info, trace};
use mkfat_core::{MkfatError, OutputMedium};

/// Serialized metadata regions of one image.
#[derive(Debug, Clone)]
pub struct Regions {
    pub boot_sector: [u8; 512],
    pub fat: Vec<u8>,
    pub root_directory: Vec<u8>,
    pub subdirectories: Vec<(EntryId, Vec<u8>)>,
}

/// Write a complete image. The first failed write is returned; writes
/// already in flight are not rolled back.
pub async fn write_image(
    tree: &EntryTree,
    layout: &Layout,
    regions: &Regions,
    medium: &dyn OutputMedium,
) -> Result<(), MkfatError> {
    let geometry = &layout.geometry;
    let image_size = geometry.image_size();

    // Some media only accept out-of-order writes inside their current extent
    debug!("Pre-extending medium to {} bytes", image_size);
    medium.write_at(image_size - 1, &[0u8]).await?;

    let mut writes: Vec<BoxFuture<'_, Result<(), MkfatError>>> = Vec::new();

    writes.push(medium.write_at(0, &regions.boot_sector));
    for copy in 0..geometry.fat_count {
        let offset = geometry.fat_offset(copy);
        trace!("FAT copy {} at {:#x}", copy, offset);
        writes.push(medium.write_at(offset, &regions.fat));
    }

    let root_offset = geometry.root_dir_offset();
    trace!(
        "Root directory at {:#x}: {}",
        root_offset,
        hex::encode(&regions.root_directory[..layout.size(EntryId::ROOT) as usize])
    );
    writes.push(medium.write_at(root_offset, &regions.root_directory));

    for (dir, buffer) in &regions.subdirectories {
        debug!("{} at {:#x}", tree.get(*dir).path(), layout.offset(*dir));
        writes.push(medium.write_at(layout.offset(*dir), buffer));
    }

    let mut file_count = 0usize;
    for (id, entry) in tree.iter() {
        if let EntryKind::File(source) = entry.kind() {
            let size = layout.size(id);
            debug!("{} ({} bytes) at {:#x}", entry.path(), size, layout.offset(id));
            writes.push(source.copy_to(medium, layout.offset(id), size));
            file_count += 1;
        }
    }

    let total = writes.len();
    try_join_all(writes).await?;

    info!(
        "Wrote FAT16 image: {} bytes, {} regions, {} files",
        image_size, total, file_count
    );
    Ok(())
}
