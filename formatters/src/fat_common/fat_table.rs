// In-memory FAT16 table
// Clusters are handed out contiguously, so every chain is a run of
// consecutive clusters ending in an end-of-chain marker.

use super::constants::*;
use byteorder::{ByteOrder, LittleEndian};
use log::trace;

/// A FAT16 table being assembled before it is written to each FAT slot.
#[derive(Debug, Clone)]
pub struct Fat16Table {
    bytes: Vec<u8>,
}

impl Fat16Table {
    /// Create a table of `fat_sectors` sectors with the reserved entries set
    /// and clusters `2..2 + data_clusters` pre-linked to their successor.
    pub fn new(media_descriptor: u8, fat_sectors: u32, data_clusters: u32) -> Self {
        let mut table = Self {
            bytes: vec![0u8; fat_sectors as usize * SECTOR_SIZE as usize],
        };

        // Entry 0 carries the media descriptor in its low byte
        table.write_entry(0, 0xFF00 | media_descriptor as u16);
        table.write_entry(1, FAT16_EOC);

        let end = FIRST_DATA_CLUSTER + data_clusters;
        for cluster in FIRST_DATA_CLUSTER..end {
            table.write_entry(cluster, (cluster + 1) as u16);
        }
        table
    }

    /// Number of entries the table can hold.
    pub fn capacity(&self) -> u32 {
        (self.bytes.len() as u64 / FAT16_ENTRY_SIZE) as u32
    }

    pub fn write_entry(&mut self, cluster: u32, value: u16) {
        let offset = cluster as usize * FAT16_ENTRY_SIZE as usize;
        LittleEndian::write_u16(&mut self.bytes[offset..offset + 2], value);
    }

    pub fn read_entry(&self, cluster: u32) -> u16 {
        let offset = cluster as usize * FAT16_ENTRY_SIZE as usize;
        LittleEndian::read_u16(&self.bytes[offset..offset + 2])
    }

    pub fn mark_end_of_chain(&mut self, cluster: u32) {
        self.write_entry(cluster, FAT16_EOC);
    }

    /// Terminate the chain of `count` clusters that starts at `first`.
    pub fn link_chain(&mut self, first: u32, count: u32) {
        let last = first + count.max(1) - 1;
        trace!("FAT16 chain {}..={} terminated", first, last);
        self.mark_end_of_chain(last);
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Build the serialized FAT for a set of `(first_cluster, cluster_count)` chains.
pub fn build_fat16_table<I>(
    media_descriptor: u8,
    fat_sectors: u32,
    data_clusters: u32,
    chains: I,
) -> Vec<u8>
where
    I: IntoIterator<Item = (u32, u32)>,
{
    let mut table = Fat16Table::new(media_descriptor, fat_sectors, data_clusters);
    for (first, count) in chains {
        table.link_chain(first, count);
    }
    table.into_bytes()
}
