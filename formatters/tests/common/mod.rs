// Minimal FAT16 reader used to check generated images

#![allow(dead_code)]

use mkfat_formatters::fat_common::attributes::{ATTR_DIRECTORY, ATTR_LONG_NAME};
use mkfat_formatters::fat_common::timestamps::fat_datetime_to_unix;
use mkfat_formatters::fat_common::{decode_lfn_entries, parse_83_name, DirEntry};

pub fn init_logging() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init();
}

/// A directory record as a reader sees it.
#[derive(Debug, Clone)]
pub struct DirRecord {
    pub name: String,
    pub entry: DirEntry,
    /// Raw LFN slots that preceded the short entry, in on-disk order.
    pub lfn: Vec<[u8; 32]>,
}

impl DirRecord {
    pub fn is_directory(&self) -> bool {
        self.entry.attributes & ATTR_DIRECTORY != 0
    }

    pub fn cluster(&self) -> u16 {
        self.entry.first_cluster as u16
    }

    /// Last-write time as Unix seconds, if the entry carries one.
    pub fn modified_unix(&self) -> Option<u64> {
        self.entry.timestamp.map(|ts| fat_datetime_to_unix(ts.date, ts.time))
    }
}

pub struct Fat16Volume {
    pub data: Vec<u8>,
    pub bytes_per_sector: u64,
    pub sectors_per_cluster: u64,
    pub reserved_sectors: u64,
    pub fat_count: u64,
    pub root_entries: u64,
    pub fat_sectors: u64,
    pub total_sectors: u64,
    pub media: u8,
}

fn u16_at(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

fn u32_at(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
}

impl Fat16Volume {
    pub fn parse(data: Vec<u8>) -> Self {
        assert_eq!(&data[510..512], &[0x55, 0xAA], "missing boot signature");
        assert_eq!(&data[54..62], b"FAT16   ");

        let total16 = u16_at(&data, 19) as u64;
        let total_sectors = if total16 != 0 { total16 } else { u32_at(&data, 32) as u64 };

        Self {
            bytes_per_sector: u16_at(&data, 11) as u64,
            sectors_per_cluster: data[13] as u64,
            reserved_sectors: u16_at(&data, 14) as u64,
            fat_count: data[16] as u64,
            root_entries: u16_at(&data, 17) as u64,
            media: data[21],
            fat_sectors: u16_at(&data, 22) as u64,
            total_sectors,
            data,
        }
    }

    pub fn cluster_bytes(&self) -> u64 {
        self.sectors_per_cluster * self.bytes_per_sector
    }

    pub fn fat_copy(&self, copy: u64) -> &[u8] {
        let start = ((self.reserved_sectors + copy * self.fat_sectors) * self.bytes_per_sector) as usize;
        let len = (self.fat_sectors * self.bytes_per_sector) as usize;
        &self.data[start..start + len]
    }

    pub fn fat_entry(&self, cluster: u16) -> u16 {
        u16_at(self.fat_copy(0), cluster as usize * 2)
    }

    pub fn root_dir_offset(&self) -> u64 {
        (self.reserved_sectors + self.fat_count * self.fat_sectors) * self.bytes_per_sector
    }

    pub fn data_offset(&self) -> u64 {
        self.root_dir_offset() + self.root_entries * 32
    }

    /// Cluster count as a FAT driver computes it to pick the FAT type.
    pub fn cluster_count(&self) -> u64 {
        let data_sectors = self.total_sectors - self.data_offset() / self.bytes_per_sector;
        data_sectors / self.sectors_per_cluster
    }

    pub fn chain(&self, first: u16) -> Vec<u16> {
        let mut chain = vec![first];
        let mut current = first;
        loop {
            let next = self.fat_entry(current);
            if next >= 0xFFF8 {
                break;
            }
            assert!(next >= 2 && chain.len() < 70_000, "broken chain at {}", current);
            chain.push(next);
            current = next;
        }
        chain
    }

    pub fn read_chain(&self, first: u16) -> Vec<u8> {
        let mut bytes = Vec::new();
        for cluster in self.chain(first) {
            let start = (self.data_offset() + (cluster as u64 - 2) * self.cluster_bytes()) as usize;
            bytes.extend_from_slice(&self.data[start..start + self.cluster_bytes() as usize]);
        }
        bytes
    }

    pub fn read_file(&self, record: &DirRecord) -> Vec<u8> {
        let mut bytes = self.read_chain(record.cluster());
        bytes.truncate(record.entry.size as usize);
        bytes
    }

    pub fn root_dir(&self) -> Vec<DirRecord> {
        let start = self.root_dir_offset() as usize;
        let end = start + (self.root_entries * 32) as usize;
        parse_directory(&self.data[start..end])
    }

    pub fn list(&self, dir: &DirRecord) -> Vec<DirRecord> {
        assert!(dir.is_directory());
        if dir.cluster() == 0 {
            return self.root_dir();
        }
        parse_directory(&self.read_chain(dir.cluster()))
    }

    /// Look up a `/`-separated path, matching long or short names case-insensitively.
    pub fn find(&self, path: &str) -> Option<DirRecord> {
        let mut records = self.root_dir();
        let mut found = None;
        for component in path.split('/').filter(|c| !c.is_empty()) {
            let record = records
                .iter()
                .find(|r| {
                    r.name.eq_ignore_ascii_case(component)
                        || parse_83_name(&r.entry.short_name, 0).eq_ignore_ascii_case(component)
                })?
                .clone();
            records = if record.is_directory() && record.name != "." && record.name != ".." {
                self.list(&record)
            } else {
                Vec::new()
            };
            found = Some(record);
        }
        found
    }
}

pub fn parse_directory(bytes: &[u8]) -> Vec<DirRecord> {
    let mut records = Vec::new();
    let mut pending: Vec<[u8; 32]> = Vec::new();

    for slot in bytes.chunks_exact(32) {
        match slot[0] {
            0x00 => break,
            0xE5 => {
                pending.clear();
                continue;
            }
            _ => {}
        }
        let mut raw = [0u8; 32];
        raw.copy_from_slice(slot);

        if slot[11] == ATTR_LONG_NAME {
            pending.push(raw);
            continue;
        }

        let entry = DirEntry::decode(&raw);
        let name = if pending.is_empty() {
            parse_83_name(&entry.short_name, entry.case_flags)
        } else {
            decode_lfn_entries(&pending, &entry.short_name).expect("LFN chain does not match its short entry")
        };
        records.push(DirRecord { name, entry, lfn: std::mem::take(&mut pending) });
    }
    records
}
