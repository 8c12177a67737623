// FAT16 image orchestrator: runs the phases in order and either reports the
// planned layout or writes it to a medium.

use super::directory::{build_root_directory, build_subdirectory, NameTable};
use super::entry_tree::{EntryId, EntryKind, EntryTree};
use super::geometry::{compute_layout, Geometry, Layout};
use super::writer::{write_image, Regions};
use crate::fat_common::{build_fat16_boot_sector, build_fat16_table, parse_83_name, FatBootSectorParams};
use log::info;
use mkfat_core::{ImageOptions, MkfatError, OutputMedium};
use serde::Serialize;

/// Placement of one entry in a planned image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedEntry {
    pub path: String,
    pub kind: &'static str,
    pub short_name: String,
    pub lfn_entries: usize,
    pub first_cluster: u16,
    pub clusters: u32,
    pub size: u64,
    pub offset: u64,
}

/// Result of a dry run: geometry plus where every entry lands.
#[derive(Debug, Clone, Serialize)]
pub struct ImagePlan {
    pub geometry: Geometry,
    pub image_size: u64,
    pub total_sectors: u32,
    pub root_dir_offset: u64,
    pub data_area_offset: u64,
    pub entries: Vec<PlannedEntry>,
}

impl ImagePlan {
    pub fn entry(&self, path: &str) -> Option<&PlannedEntry> {
        self.entries.iter().find(|e| e.path.eq_ignore_ascii_case(path))
    }
}

/// An image under construction: options plus the entry tree.
#[derive(Debug, Default)]
pub struct Fat16Image {
    options: ImageOptions,
    tree: EntryTree,
}

impl Fat16Image {
    pub fn new(options: ImageOptions) -> Self {
        Self { options, tree: EntryTree::new() }
    }

    pub fn with_tree(options: ImageOptions, tree: EntryTree) -> Self {
        Self { options, tree }
    }

    pub fn options(&self) -> &ImageOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut ImageOptions {
        &mut self.options
    }

    pub fn tree(&self) -> &EntryTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut EntryTree {
        &mut self.tree
    }

    /// Reserve `bytes` of unreferenced space in the data area.
    pub fn reserve_space(&mut self, bytes: u64) {
        self.options.extra_space += bytes;
    }

    /// Compute the layout without writing anything.
    pub async fn plan(&self) -> Result<ImagePlan, MkfatError> {
        let (names, layout) = self.prepare().await?;
        Ok(self.describe(&names, &layout))
    }

    /// Build and write the image. Nothing is written if planning fails.
    pub async fn write_to(&self, medium: &dyn OutputMedium) -> Result<ImagePlan, MkfatError> {
        let (names, layout) = self.prepare().await?;
        let regions = self.serialize(&names, &layout);
        write_image(&self.tree, &layout, &regions, medium).await?;
        Ok(self.describe(&names, &layout))
    }

    async fn prepare(&self) -> Result<(NameTable, Layout), MkfatError> {
        self.options.validate()?;

        let mut file_sizes = vec![0u64; self.tree.len()];
        for (id, entry) in self.tree.iter() {
            if let EntryKind::File(source) = entry.kind() {
                file_sizes[id.index()] = source.len().await?;
            }
        }

        let names = NameTable::build(&self.tree)?;
        let layout = compute_layout(&self.tree, &names, &file_sizes, &self.options)?;
        Ok((names, layout))
    }

    fn serialize(&self, names: &NameTable, layout: &Layout) -> Regions {
        let geometry = &layout.geometry;
        let default_time = self.options.default_time;

        let params = FatBootSectorParams::from_options(
            &self.options,
            geometry.sectors_per_cluster,
            geometry.total_sectors(),
        );
        info!("Volume serial {:08X}", params.volume_serial);
        let boot_sector =
            build_fat16_boot_sector(&params, geometry.max_root_entries, geometry.fat_sectors as u16);

        let fat = build_fat16_table(
            geometry.media_descriptor,
            geometry.fat_sectors,
            geometry.data_clusters,
            layout.chains(&self.tree),
        );

        let subdirectories = self
            .tree
            .iter()
            .filter(|(id, entry)| *id != EntryId::ROOT && entry.is_directory())
            .map(|(id, _)| (id, build_subdirectory(&self.tree, names, layout, id, default_time)))
            .collect();

        Regions {
            boot_sector,
            fat,
            root_directory: build_root_directory(&self.tree, names, layout, default_time),
            subdirectories,
        }
    }

    fn describe(&self, names: &NameTable, layout: &Layout) -> ImagePlan {
        let geometry = layout.geometry;
        let entries = self
            .tree
            .iter()
            .skip(1)
            .map(|(id, entry)| {
                let entry_names = names.get(id);
                let kind = match entry.kind() {
                    EntryKind::Directory => "directory",
                    EntryKind::File(_) => "file",
                    EntryKind::Link(_) => "link",
                };
                PlannedEntry {
                    path: entry.path().to_string(),
                    kind,
                    short_name: parse_83_name(&entry_names.short_name, 0),
                    lfn_entries: entry_names.lfn_entries.len(),
                    first_cluster: layout.cluster(id),
                    clusters: layout.cluster_count(id),
                    size: layout.size(id),
                    offset: layout.offset(id),
                }
            })
            .collect();

        ImagePlan {
            geometry,
            image_size: geometry.image_size(),
            total_sectors: geometry.total_sectors(),
            root_dir_offset: geometry.root_dir_offset(),
            data_area_offset: geometry.data_area_offset(),
            entries,
        }
    }
}
