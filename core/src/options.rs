use crate::MkfatError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Largest bootstrap code that fits between the extended BPB and the
/// boot signature (0x3E..0x1FE).
pub const MAX_BOOT_CODE_LEN: usize = 448;

pub const DEFAULT_LABEL: &str = "NO NAME";
pub const DEFAULT_OEM_NAME: &str = "MSWIN4.1";

/// Volume-level options for an image.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ImageOptions {
    /// Volume serial number; random when unset.
    pub serial: Option<u32>,
    pub label: String,
    pub oem_name: String,
    pub fat_count: u8,
    pub reserved_sectors: u16,
    pub media_descriptor: u8,
    /// Bytes of unreferenced space appended to the data area.
    pub extra_space: u64,
    /// Timestamp for entries that do not carry their own.
    pub default_time: Option<DateTime<Utc>>,
    pub boot_code: Option<Vec<u8>>,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            serial: None,
            label: DEFAULT_LABEL.to_string(),
            oem_name: DEFAULT_OEM_NAME.to_string(),
            fat_count: 1,
            reserved_sectors: 1,
            media_descriptor: 0xF8,
            extra_space: 0,
            default_time: None,
            boot_code: None,
        }
    }
}

impl ImageOptions {
    pub fn validate(&self) -> Result<(), MkfatError> {
        if self.fat_count == 0 {
            return Err(MkfatError::Configuration("FAT count must be at least 1".to_string()));
        }
        if self.reserved_sectors == 0 {
            return Err(MkfatError::Configuration(
                "Reserved sector count must be at least 1 (the boot sector)".to_string(),
            ));
        }
        if self.media_descriptor != 0xF0 && self.media_descriptor < 0xF8 {
            return Err(MkfatError::Configuration(format!(
                "Invalid media descriptor {:#04x}; expected 0xF0 or 0xF8-0xFF",
                self.media_descriptor
            )));
        }
        if !self.label.is_ascii() || self.label.len() > 11 {
            return Err(MkfatError::Configuration(format!(
                "Volume label '{}' must be at most 11 ASCII characters",
                self.label
            )));
        }
        if !self.oem_name.is_ascii() || self.oem_name.len() > 8 {
            return Err(MkfatError::Configuration(format!(
                "OEM name '{}' must be at most 8 ASCII characters",
                self.oem_name
            )));
        }
        if let Some(code) = &self.boot_code {
            if code.len() > MAX_BOOT_CODE_LEN {
                return Err(MkfatError::Configuration(format!(
                    "Boot code is {} bytes; at most {} fit in the boot sector",
                    code.len(),
                    MAX_BOOT_CODE_LEN
                )));
            }
        }
        Ok(())
    }

    /// Serial number to stamp into the boot sector.
    pub fn resolved_serial(&self) -> u32 {
        self.serial.unwrap_or_else(rand::random::<u32>)
    }

    /// Label as the 11 space-padded bytes stored on disk.
    pub fn label_bytes(&self) -> [u8; 11] {
        let mut bytes = [b' '; 11];
        let label = self.label.to_ascii_uppercase();
        let len = label.len().min(11);
        bytes[..len].copy_from_slice(&label.as_bytes()[..len]);
        bytes
    }

    pub fn oem_name_bytes(&self) -> [u8; 8] {
        let mut bytes = [b' '; 8];
        let len = self.oem_name.len().min(8);
        bytes[..len].copy_from_slice(&self.oem_name.as_bytes()[..len]);
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ImageOptions::default();
        assert_eq!(options.fat_count, 1);
        assert_eq!(options.reserved_sectors, 1);
        assert_eq!(options.media_descriptor, 0xF8);
        assert_eq!(options.extra_space, 0);
        assert!(options.default_time.is_none());
        assert_eq!(&options.label_bytes(), b"NO NAME    ");
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let options: ImageOptions =
            serde_json::from_str(r#"{ "label": "boot", "fat_count": 2, "serial": 305419896 }"#)
                .unwrap();
        assert_eq!(options.fat_count, 2);
        assert_eq!(options.reserved_sectors, 1);
        assert_eq!(&options.label_bytes(), b"BOOT       ");
        assert_eq!(options.resolved_serial(), 0x1234_5678);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut options = ImageOptions { fat_count: 0, ..Default::default() };
        assert!(matches!(options.validate(), Err(MkfatError::Configuration(_))));

        options = ImageOptions { label: "MUCH TOO LONG".to_string(), ..Default::default() };
        assert!(options.validate().is_err());

        options = ImageOptions { media_descriptor: 0x12, ..Default::default() };
        assert!(options.validate().is_err());

        options = ImageOptions { boot_code: Some(vec![0x90; 449]), ..Default::default() };
        assert!(options.validate().is_err());
    }
}
