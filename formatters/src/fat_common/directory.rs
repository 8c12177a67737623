// 32-byte short directory entries

use super::constants::*;
use super::timestamps::FatTimestamp;
use byteorder::{ByteOrder, LittleEndian};

/// Directory entry attribute bits
pub mod attributes {
    pub const ATTR_READ_ONLY: u8 = 0x01;
    pub const ATTR_HIDDEN: u8 = 0x02;
    pub const ATTR_SYSTEM: u8 = 0x04;
    pub const ATTR_VOLUME_ID: u8 = 0x08;
    pub const ATTR_DIRECTORY: u8 = 0x10;
    pub const ATTR_ARCHIVE: u8 = 0x20;
    pub const ATTR_LONG_NAME: u8 = 0x0F;
}

use attributes::*;

/// Fields of one short directory entry before serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    pub short_name: [u8; 11],
    pub attributes: u8,
    pub case_flags: u8,
    pub first_cluster: u32,
    pub size: u32,
    pub timestamp: Option<FatTimestamp>,
}

impl DirEntry {
    pub fn is_directory(&self) -> bool {
        self.attributes & ATTR_DIRECTORY != 0
    }

    pub fn encode(&self) -> [u8; 32] {
        let mut entry = [0u8; 32];
        entry[DIR_NAME..DIR_NAME + 11].copy_from_slice(&self.short_name);
        entry[DIR_ATTR] = self.attributes;
        entry[DIR_NT_RES] = self.case_flags;

        if let Some(ts) = self.timestamp {
            entry[DIR_CRT_TIME_TENTH] = ts.tenths;
            LittleEndian::write_u16(&mut entry[DIR_CRT_TIME..], ts.time);
            LittleEndian::write_u16(&mut entry[DIR_CRT_DATE..], ts.date);
            LittleEndian::write_u16(&mut entry[DIR_LST_ACC_DATE..], ts.date);
            LittleEndian::write_u16(&mut entry[DIR_WRT_TIME..], ts.time);
            LittleEndian::write_u16(&mut entry[DIR_WRT_DATE..], ts.date);
        }

        // The high word only matters on FAT32 but the field exists here too
        LittleEndian::write_u16(&mut entry[DIR_FST_CLUS_HI..], (self.first_cluster >> 16) as u16);
        LittleEndian::write_u16(&mut entry[DIR_FST_CLUS_LO..], (self.first_cluster & 0xFFFF) as u16);

        let size = if self.is_directory() { 0 } else { self.size };
        LittleEndian::write_u32(&mut entry[DIR_FILE_SIZE..], size);
        entry
    }

    /// Parse a raw short entry; LFN and free slots are the caller's concern.
    pub fn decode(raw: &[u8]) -> Self {
        let mut short_name = [0u8; 11];
        short_name.copy_from_slice(&raw[DIR_NAME..DIR_NAME + 11]);
        let hi = LittleEndian::read_u16(&raw[DIR_FST_CLUS_HI..]) as u32;
        let lo = LittleEndian::read_u16(&raw[DIR_FST_CLUS_LO..]) as u32;
        let date = LittleEndian::read_u16(&raw[DIR_WRT_DATE..]);
        let time = LittleEndian::read_u16(&raw[DIR_WRT_TIME..]);

        Self {
            short_name,
            attributes: raw[DIR_ATTR],
            case_flags: raw[DIR_NT_RES],
            first_cluster: (hi << 16) | lo,
            size: LittleEndian::read_u32(&raw[DIR_FILE_SIZE..]),
            timestamp: (date != 0 || time != 0).then_some(FatTimestamp {
                date,
                time,
                tenths: raw[DIR_CRT_TIME_TENTH],
            }),
        }
    }
}

/// Render an 8.3 name for display, applying the NT case-info bits.
pub fn parse_83_name(name: &[u8; 11], case_flags: u8) -> String {
    let render = |bytes: &[u8], lower: bool| -> String {
        let mut part = String::new();
        for (i, &byte) in bytes.iter().enumerate() {
            if byte == 0x20 || byte == 0x00 {
                break;
            }
            let byte = if i == 0 && byte == 0x05 { 0xE5 } else { byte };
            let c = byte as char;
            part.push(if lower { c.to_ascii_lowercase() } else { c });
        }
        part
    };

    let mut result = render(&name[0..8], case_flags & CASE_LOWER_BASE != 0);
    let ext = render(&name[8..11], case_flags & CASE_LOWER_EXT != 0);
    if !ext.is_empty() {
        result.push('.');
        result.push_str(&ext);
    }
    result
}
