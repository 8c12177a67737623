pub mod fat_common;
pub mod fat16;

// Re-export the image builder API
pub use fat16::{
    import_host_directory, DirectoryBuilder, EntryId, EntryMeta, EntryTree, Fat16Image, ImagePlan,
    Manifest,
};
