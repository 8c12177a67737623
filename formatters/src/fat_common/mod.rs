// On-disk encoders shared by the FAT16 layout engine

pub mod boot_sector;
pub mod constants;
pub mod directory;
pub mod fat_table;
pub mod long_names;
pub mod timestamps;

pub use boot_sector::{build_fat16_boot_sector, FatBootSectorParams};
pub use directory::{attributes, parse_83_name, DirEntry};
pub use fat_table::{build_fat16_table, Fat16Table};
pub use long_names::{
    build_lfn_entries, decode_lfn_entries, lfn_checksum, lfn_entry_count, ShortNameAllocator,
};
pub use timestamps::FatTimestamp;
