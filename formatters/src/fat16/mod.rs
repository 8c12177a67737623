// FAT16 image generation: entry tree, geometry, directory buffers, writer

pub mod directory;
pub mod entry_tree;
pub mod geometry;
pub mod host_dir;
pub mod image;
pub mod manifest;
pub mod writer;

pub use directory::NameTable;
pub use entry_tree::{DirectoryBuilder, Entry, EntryId, EntryKind, EntryMeta, EntryTree};
pub use geometry::{choose_cluster_size, compute_layout, Geometry, Layout};
pub use host_dir::import_host_directory;
pub use image::{Fat16Image, ImagePlan, PlannedEntry};
pub use manifest::{Manifest, ManifestEntry, ManifestEntryType};
pub use writer::write_image;
