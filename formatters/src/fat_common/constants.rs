// FAT16 on-disk constants

use static_assertions::const_assert_eq;

// Boot sector offsets
pub const BS_JMP_BOOT: usize = 0x00;
pub const BS_OEM_NAME: usize = 0x03;
pub const BPB_BYTES_PER_SEC: usize = 0x0B;
pub const BPB_SEC_PER_CLUS: usize = 0x0D;
pub const BPB_RSVD_SEC_CNT: usize = 0x0E;
pub const BPB_NUM_FATS: usize = 0x10;
pub const BPB_ROOT_ENT_CNT: usize = 0x11;
pub const BPB_TOT_SEC16: usize = 0x13;
pub const BPB_MEDIA: usize = 0x15;
pub const BPB_FAT_SZ16: usize = 0x16;
pub const BPB_SEC_PER_TRK: usize = 0x18;
pub const BPB_NUM_HEADS: usize = 0x1A;
pub const BPB_HIDD_SEC: usize = 0x1C;
pub const BPB_TOT_SEC32: usize = 0x20;

// FAT16 extended BPB (starts at 36)
pub const BS16_DRV_NUM: usize = 0x24;
pub const BS16_RESERVED1: usize = 0x25;
pub const BS16_BOOT_SIG: usize = 0x26;
pub const BS16_VOL_ID: usize = 0x27;
pub const BS16_VOL_LAB: usize = 0x2B;
pub const BS16_FIL_SYS_TYPE: usize = 0x36;
pub const BS16_BOOT_CODE: usize = 0x3E;

// Boot sector signature
pub const BOOT_SIGNATURE: [u8; 2] = [0x55, 0xAA];
pub const BOOT_SIGNATURE_OFFSET: usize = 0x1FE;
pub const EXTENDED_BOOT_SIGNATURE: u8 = 0x29;

// Directory entry offsets
pub const DIR_NAME: usize = 0x00;
pub const DIR_ATTR: usize = 0x0B;
pub const DIR_NT_RES: usize = 0x0C;
pub const DIR_CRT_TIME_TENTH: usize = 0x0D;
pub const DIR_CRT_TIME: usize = 0x0E;
pub const DIR_CRT_DATE: usize = 0x10;
pub const DIR_LST_ACC_DATE: usize = 0x12;
pub const DIR_FST_CLUS_HI: usize = 0x14;
pub const DIR_WRT_TIME: usize = 0x16;
pub const DIR_WRT_DATE: usize = 0x18;
pub const DIR_FST_CLUS_LO: usize = 0x1A;
pub const DIR_FILE_SIZE: usize = 0x1C;

// Long filename entry offsets
pub const LDIR_ORD: usize = 0x00;
pub const LDIR_NAME1: usize = 0x01;
pub const LDIR_ATTR: usize = 0x0B;
pub const LDIR_TYPE: usize = 0x0C;
pub const LDIR_CHKSUM: usize = 0x0D;
pub const LDIR_NAME2: usize = 0x0E;
pub const LDIR_FST_CLUS_LO: usize = 0x1A;
pub const LDIR_NAME3: usize = 0x1C;
pub const LAST_LONG_ENTRY: u8 = 0x40;
pub const LFN_CHARS_PER_ENTRY: usize = 13;
pub const MAX_LFN_LENGTH: usize = 255;

// NT case-info bits (DIR_NT_RES)
pub const CASE_LOWER_BASE: u8 = 0x08;
pub const CASE_LOWER_EXT: u8 = 0x10;

// FAT entry values
pub const FAT16_EOC: u16 = 0xFFFF;
pub const FAT16_FREE: u16 = 0x0000;

// Cluster count thresholds
pub const FAT12_MAX_CLUSTERS: u32 = 4084;
pub const FAT16_MIN_CLUSTERS: u32 = 4085;
pub const FAT16_MAX_CLUSTERS: u32 = 65524;
pub const FAT32_MIN_CLUSTERS: u32 = 65525;

// First usable data cluster; 0 and 1 are reserved
pub const FIRST_DATA_CLUSTER: u32 = 2;

// Standard values
pub const SECTOR_SIZE: u64 = 512;
pub const DIR_ENTRY_SIZE: u64 = 32;
pub const DIR_ENTRIES_PER_SECTOR: u64 = SECTOR_SIZE / DIR_ENTRY_SIZE;
pub const FAT16_ENTRY_SIZE: u64 = 2;

/// Sectors-per-cluster candidates, smallest first.
pub const CLUSTER_SIZES: [u8; 5] = [4, 8, 16, 32, 64];

// CHS placeholders; nothing reads them for LBA media
pub const SECTORS_PER_TRACK: u16 = 63;
pub const NUM_HEADS: u16 = 255;
pub const DRIVE_NUMBER_FIXED: u8 = 0x80;

// Media descriptors
pub const MEDIA_FIXED: u8 = 0xF8;
pub const MEDIA_REMOVABLE: u8 = 0xF0;

const_assert_eq!(SECTOR_SIZE % DIR_ENTRY_SIZE, 0);
const_assert_eq!(FAT12_MAX_CLUSTERS + 1, FAT16_MIN_CLUSTERS);
const_assert_eq!(FAT16_MAX_CLUSTERS + 1, FAT32_MIN_CLUSTERS);
