// MS-DOS date/time encoding for directory entries
// FAT date: bits 15-9: year (0=1980), bits 8-5: month, bits 4-0: day
// FAT time: bits 15-11: hours, bits 10-5: minutes, bits 4-0: seconds/2

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};

/// Packed FAT timestamp as stored in a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FatTimestamp {
    pub date: u16,
    pub time: u16,
    /// Creation time fine resolution in 10 ms units (0-199).
    pub tenths: u8,
}

impl FatTimestamp {
    pub fn from_datetime(datetime: &DateTime<Utc>) -> Self {
        let year = datetime.year();

        // FAT can only represent 1980-2107
        if year < 1980 {
            return Self {
                date: (1 << 5) | 1,
                time: 0,
                tenths: 0,
            };
        }
        if year > 2107 {
            return Self {
                date: (127 << 9) | (12 << 5) | 31,
                time: (23 << 11) | (59 << 5) | 29,
                tenths: 199,
            };
        }

        let fat_year = (year - 1980) as u16;
        let date = (fat_year << 9) | ((datetime.month() as u16) << 5) | (datetime.day() as u16);

        let second = datetime.second().min(59);
        let time = ((datetime.hour() as u16) << 11)
            | ((datetime.minute() as u16) << 5)
            | ((second / 2) as u16);

        let centis = (datetime.timestamp_subsec_millis().min(999) / 10) as u8;
        let tenths = ((second % 2) as u8) * 100 + centis;

        Self { date, time, tenths }
    }
}

/// Convert FAT date/time back to a Unix timestamp (0 if the fields are invalid).
pub fn fat_datetime_to_unix(date: u16, time: u16) -> u64 {
    let year = ((date >> 9) & 0x7F) as i32 + 1980;
    let month = ((date >> 5) & 0x0F) as u32;
    let day = (date & 0x1F) as u32;

    let hour = ((time >> 11) & 0x1F) as u32;
    let minute = ((time >> 5) & 0x3F) as u32;
    let second = ((time & 0x1F) * 2) as u32;

    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, second))
        .map(|dt| dt.and_utc().timestamp() as u64)
        .unwrap_or(0)
}
