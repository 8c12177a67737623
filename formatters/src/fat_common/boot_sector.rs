// Boot sector builder for FAT16 volumes
// BPB fields come from the computed geometry and the image options

use super::constants::*;
use mkfat_core::ImageOptions;

/// Values stamped into the BIOS Parameter Block
#[derive(Debug, Clone)]
pub struct FatBootSectorParams {
    pub oem_name: [u8; 8],
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub reserved_sectors: u16,
    pub num_fats: u8,
    pub media_descriptor: u8,
    pub sectors_per_track: u16,
    pub num_heads: u16,
    pub hidden_sectors: u32,
    pub total_sectors: u32,
    pub volume_serial: u32,
    pub volume_label: [u8; 11],
    pub boot_code: Option<Vec<u8>>,
}

impl Default for FatBootSectorParams {
    fn default() -> Self {
        Self {
            oem_name: *b"MSWIN4.1",
            bytes_per_sector: SECTOR_SIZE as u16,
            sectors_per_cluster: 0, // Must be set
            reserved_sectors: 1,
            num_fats: 1,
            media_descriptor: MEDIA_FIXED,
            sectors_per_track: SECTORS_PER_TRACK,
            num_heads: NUM_HEADS,
            hidden_sectors: 0,
            total_sectors: 0, // Must be set
            volume_serial: 0,
            volume_label: *b"NO NAME    ",
            boot_code: None,
        }
    }
}

impl FatBootSectorParams {
    /// Parameters for a volume described by `options` with the given geometry.
    /// The serial is resolved here, so a random one is drawn once per image.
    pub fn from_options(options: &ImageOptions, sectors_per_cluster: u8, total_sectors: u32) -> Self {
        Self {
            oem_name: options.oem_name_bytes(),
            sectors_per_cluster,
            reserved_sectors: options.reserved_sectors,
            num_fats: options.fat_count,
            media_descriptor: options.media_descriptor,
            total_sectors,
            volume_serial: options.resolved_serial(),
            volume_label: options.label_bytes(),
            boot_code: options.boot_code.clone(),
            ..Default::default()
        }
    }
}

/// Build a FAT16 boot sector
pub fn build_fat16_boot_sector(
    params: &FatBootSectorParams,
    root_entries: u16,
    sectors_per_fat: u16,
) -> [u8; 512] {
    let mut boot_sector = [0u8; 512];

    // Jump over the BPB to the boot code area
    boot_sector[BS_JMP_BOOT..BS_JMP_BOOT + 3].copy_from_slice(&[0xEB, 0x3C, 0x90]);
    boot_sector[BS_OEM_NAME..BS_OEM_NAME + 8].copy_from_slice(&params.oem_name);

    boot_sector[BPB_BYTES_PER_SEC..BPB_BYTES_PER_SEC + 2]
        .copy_from_slice(&params.bytes_per_sector.to_le_bytes());
    boot_sector[BPB_SEC_PER_CLUS] = params.sectors_per_cluster;
    boot_sector[BPB_RSVD_SEC_CNT..BPB_RSVD_SEC_CNT + 2]
        .copy_from_slice(&params.reserved_sectors.to_le_bytes());
    boot_sector[BPB_NUM_FATS] = params.num_fats;
    boot_sector[BPB_ROOT_ENT_CNT..BPB_ROOT_ENT_CNT + 2]
        .copy_from_slice(&root_entries.to_le_bytes());

    // 16-bit count only when it fits, otherwise the 32-bit field
    if params.total_sectors < 65536 {
        boot_sector[BPB_TOT_SEC16..BPB_TOT_SEC16 + 2]
            .copy_from_slice(&(params.total_sectors as u16).to_le_bytes());
    } else {
        boot_sector[BPB_TOT_SEC32..BPB_TOT_SEC32 + 4]
            .copy_from_slice(&params.total_sectors.to_le_bytes());
    }

    boot_sector[BPB_MEDIA] = params.media_descriptor;
    boot_sector[BPB_FAT_SZ16..BPB_FAT_SZ16 + 2].copy_from_slice(&sectors_per_fat.to_le_bytes());
    boot_sector[BPB_SEC_PER_TRK..BPB_SEC_PER_TRK + 2]
        .copy_from_slice(&params.sectors_per_track.to_le_bytes());
    boot_sector[BPB_NUM_HEADS..BPB_NUM_HEADS + 2]
        .copy_from_slice(&params.num_heads.to_le_bytes());
    boot_sector[BPB_HIDD_SEC..BPB_HIDD_SEC + 4]
        .copy_from_slice(&params.hidden_sectors.to_le_bytes());

    // FAT16 extended BPB
    boot_sector[BS16_DRV_NUM] = DRIVE_NUMBER_FIXED;
    boot_sector[BS16_RESERVED1] = 0;
    boot_sector[BS16_BOOT_SIG] = EXTENDED_BOOT_SIGNATURE;
    boot_sector[BS16_VOL_ID..BS16_VOL_ID + 4].copy_from_slice(&params.volume_serial.to_le_bytes());
    boot_sector[BS16_VOL_LAB..BS16_VOL_LAB + 11].copy_from_slice(&params.volume_label);
    boot_sector[BS16_FIL_SYS_TYPE..BS16_FIL_SYS_TYPE + 8].copy_from_slice(b"FAT16   ");

    if let Some(code) = &params.boot_code {
        let len = code.len().min(BOOT_SIGNATURE_OFFSET - BS16_BOOT_CODE);
        boot_sector[BS16_BOOT_CODE..BS16_BOOT_CODE + len].copy_from_slice(&code[..len]);
    }

    boot_sector[BOOT_SIGNATURE_OFFSET..BOOT_SIGNATURE_OFFSET + 2].copy_from_slice(&BOOT_SIGNATURE);

    boot_sector
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(total_sectors: u32) -> FatBootSectorParams {
        FatBootSectorParams {
            sectors_per_cluster: 4,
            total_sectors,
            volume_serial: 0xDEAD_BEEF,
            volume_label: *b"BOOTVOL    ",
            ..Default::default()
        }
    }

    #[test]
    fn test_bpb_fields() {
        let bs = build_fat16_boot_sector(&params(16_400), 16, 65);

        assert_eq!(&bs[0..3], &[0xEB, 0x3C, 0x90]);
        assert_eq!(&bs[3..11], b"MSWIN4.1");
        assert_eq!(u16::from_le_bytes([bs[11], bs[12]]), 512);
        assert_eq!(bs[13], 4);
        assert_eq!(u16::from_le_bytes([bs[14], bs[15]]), 1);
        assert_eq!(bs[16], 1);
        assert_eq!(u16::from_le_bytes([bs[17], bs[18]]), 16);
        assert_eq!(u16::from_le_bytes([bs[19], bs[20]]), 16_400);
        assert_eq!(bs[21], 0xF8);
        assert_eq!(u16::from_le_bytes([bs[22], bs[23]]), 65);
        assert_eq!(u16::from_le_bytes([bs[24], bs[25]]), 63);
        assert_eq!(u16::from_le_bytes([bs[26], bs[27]]), 255);
        assert_eq!(&bs[28..36], &[0u8; 8]);

        assert_eq!(bs[36], 0x80);
        assert_eq!(bs[38], 0x29);
        assert_eq!(&bs[39..43], &0xDEAD_BEEFu32.to_le_bytes());
        assert_eq!(&bs[43..54], b"BOOTVOL    ");
        assert_eq!(&bs[54..62], b"FAT16   ");
        assert_eq!(&bs[510..512], &[0x55, 0xAA]);
    }

    #[test]
    fn test_large_volume_uses_32bit_total() {
        let bs = build_fat16_boot_sector(&params(70_000), 16, 140);
        assert_eq!(u16::from_le_bytes([bs[19], bs[20]]), 0);
        assert_eq!(u32::from_le_bytes([bs[32], bs[33], bs[34], bs[35]]), 70_000);
    }

    #[test]
    fn test_boot_code_and_options() {
        let options = ImageOptions {
            serial: Some(0x0102_0304),
            label: "efi".to_string(),
            fat_count: 2,
            reserved_sectors: 4,
            boot_code: Some(vec![0xFA, 0xF4]),
            ..Default::default()
        };
        let p = FatBootSectorParams::from_options(&options, 8, 20_000);
        let bs = build_fat16_boot_sector(&p, 512, 40);

        assert_eq!(bs[13], 8);
        assert_eq!(u16::from_le_bytes([bs[14], bs[15]]), 4);
        assert_eq!(bs[16], 2);
        assert_eq!(&bs[39..43], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(&bs[43..54], b"EFI        ");
        assert_eq!(&bs[0x3E..0x40], &[0xFA, 0xF4]);
        assert_eq!(bs[0x40], 0);
        assert_eq!(&bs[510..512], &[0x55, 0xAA]);
    }
}
