// Long filename (VFAT) support and 8.3 short-name generation

use super::constants::*;
use super::directory::attributes::ATTR_LONG_NAME;
use byteorder::{ByteOrder, LittleEndian};
use mkfat_core::MkfatError;
use std::collections::HashSet;

const DOT_NAME: [u8; 11] = *b".          ";
const DOTDOT_NAME: [u8; 11] = *b"..         ";

/// Largest `~N` tail; `~999999` leaves one character of stem.
const MAX_NUMERIC_TAIL: u32 = 999_999;

/// Split a component into base and extension.
///
/// The extension follows the last dot unless that dot is the first
/// character (`.bashrc` has no extension).
pub fn split_name(name: &str) -> (&str, &str) {
    if name == "." || name == ".." {
        return (name, "");
    }
    match name.rfind('.') {
        None | Some(0) => (name, ""),
        Some(i) => (&name[..i], &name[i + 1..]),
    }
}

/// Characters allowed in a short name, ignoring case.
fn is_valid_83_char(c: char) -> bool {
    matches!(c,
        'A'..='Z' | 'a'..='z' | '0'..='9' | '!' | '#' | '$' | '%' | '&' |
        '\'' | '(' | ')' | '-' | '@' | '^' | '_' | '`' | '{' | '}' | '~')
}

fn is_mixed_case(part: &str) -> bool {
    part.chars().any(|c| c.is_ascii_lowercase()) && part.chars().any(|c| c.is_ascii_uppercase())
}

/// True when `name` cannot be stored losslessly as an 8.3 short name.
pub fn needs_long_name(name: &str) -> bool {
    if name == "." || name == ".." {
        return false;
    }
    let (base, ext) = split_name(name);

    if base.is_empty() || base.chars().count() > 8 || ext.chars().count() > 3 {
        return true;
    }
    if !base.chars().all(is_valid_83_char) || !ext.chars().all(is_valid_83_char) {
        return true;
    }
    // Case-info bits cover a uniformly lower-case base or extension only
    is_mixed_case(base) || is_mixed_case(ext)
}

/// Number of LFN entries stored ahead of the short entry (0 if none).
pub fn lfn_entry_count(name: &str) -> usize {
    if needs_long_name(name) {
        (name.encode_utf16().count() + LFN_CHARS_PER_ENTRY - 1) / LFN_CHARS_PER_ENTRY
    } else {
        0
    }
}

/// NT case-info byte for a name stored without LFN entries.
pub fn case_flags(name: &str) -> u8 {
    if needs_long_name(name) {
        return 0;
    }
    let (base, ext) = split_name(name);
    let mut flags = 0;
    if base.chars().any(|c| c.is_ascii_lowercase()) {
        flags |= CASE_LOWER_BASE;
    }
    if ext.chars().any(|c| c.is_ascii_lowercase()) {
        flags |= CASE_LOWER_EXT;
    }
    flags
}

/// Upper-case, drop spaces and dots, replace anything else invalid with `_`.
pub fn short_name_stem(part: &str) -> Vec<u8> {
    part.chars()
        .filter(|&c| c != ' ' && c != '.')
        .map(|c| {
            if is_valid_83_char(c) {
                c.to_ascii_uppercase() as u8
            } else {
                b'_'
            }
        })
        .collect()
}

/// Lay out a stem and extension as 11 space-padded bytes, optionally with a
/// `~N` numeric tail.
pub fn format_short_name(stem: &[u8], ext: &[u8], numeric_tail: Option<u32>) -> [u8; 11] {
    let mut result = [0x20u8; 11];
    let stem: &[u8] = if stem.is_empty() { b"_" } else { stem };

    if let Some(num) = numeric_tail {
        let tail = format!("~{}", num);
        let base_len = (8 - tail.len()).min(stem.len());
        result[0..base_len].copy_from_slice(&stem[0..base_len]);
        result[base_len..base_len + tail.len()].copy_from_slice(tail.as_bytes());
    } else {
        let len = stem.len().min(8);
        result[0..len].copy_from_slice(&stem[0..len]);
    }

    let ext_len = ext.len().min(3);
    result[8..8 + ext_len].copy_from_slice(&ext[..ext_len]);

    // 0xE5 marks a deleted entry
    if result[0] == 0xE5 {
        result[0] = 0x05;
    }
    result
}

/// Plain 8.3 form of a name: truncated, upper-cased, space padded.
pub fn short_name_for(name: &str) -> [u8; 11] {
    match name {
        "." => DOT_NAME,
        ".." => DOTDOT_NAME,
        _ => {
            let (base, ext) = split_name(name);
            format_short_name(&short_name_stem(base), &short_name_stem(ext), None)
        }
    }
}

/// Hands out short names that are unique within one directory.
#[derive(Debug, Default)]
pub struct ShortNameAllocator {
    taken: HashSet<[u8; 11]>,
}

impl ShortNameAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the exact short name of a name that fits 8.3.
    pub fn claim(&mut self, name: &str) -> [u8; 11] {
        let short = short_name_for(name);
        self.taken.insert(short);
        short
    }

    /// Short alias for a long name: the truncated form when free, otherwise
    /// `STEM~N` with the first free N.
    pub fn allocate(&mut self, name: &str) -> Result<[u8; 11], MkfatError> {
        let (base, ext) = split_name(name);
        let stem = short_name_stem(base);
        let ext = short_name_stem(ext);

        let candidate = format_short_name(&stem, &ext, None);
        if self.taken.insert(candidate) {
            return Ok(candidate);
        }
        for i in 1..=MAX_NUMERIC_TAIL {
            let candidate = format_short_name(&stem, &ext, Some(i));
            if self.taken.insert(candidate) {
                return Ok(candidate);
            }
        }
        Err(MkfatError::CapacityExceeded(format!(
            "no free short name left for '{}' in its directory",
            name
        )))
    }
}

/// Checksum of a short name, stored in each of its LFN entries.
pub fn lfn_checksum(short_name: &[u8; 11]) -> u8 {
    let mut sum = 0u8;
    for &byte in short_name {
        sum = ((sum >> 1) | ((sum & 1) << 7)).wrapping_add(byte);
    }
    sum
}

// Byte offsets of the 13 UTF-16 slots inside an LFN entry
const LFN_SLOT_OFFSETS: [usize; 13] = [
    LDIR_NAME1,
    LDIR_NAME1 + 2,
    LDIR_NAME1 + 4,
    LDIR_NAME1 + 6,
    LDIR_NAME1 + 8,
    LDIR_NAME2,
    LDIR_NAME2 + 2,
    LDIR_NAME2 + 4,
    LDIR_NAME2 + 6,
    LDIR_NAME2 + 8,
    LDIR_NAME2 + 10,
    LDIR_NAME3,
    LDIR_NAME3 + 2,
];

/// Build the LFN entries for `long_name` in on-disk order.
///
/// The first entry carries the last chunk of the name and has its ordinal
/// OR-ed with 0x40; the entry right before the short entry holds the first
/// 13 characters.
pub fn build_lfn_entries(long_name: &str, short_name: &[u8; 11]) -> Vec<[u8; 32]> {
    let units: Vec<u16> = long_name.encode_utf16().collect();
    let count = (units.len() + LFN_CHARS_PER_ENTRY - 1) / LFN_CHARS_PER_ENTRY;
    let checksum = lfn_checksum(short_name);

    (0..count)
        .rev()
        .map(|seq| {
            let start = seq * LFN_CHARS_PER_ENTRY;
            let chunk = &units[start..units.len().min(start + LFN_CHARS_PER_ENTRY)];

            let mut slots = [0xFFFFu16; LFN_CHARS_PER_ENTRY];
            slots[..chunk.len()].copy_from_slice(chunk);
            if chunk.len() < LFN_CHARS_PER_ENTRY {
                slots[chunk.len()] = 0x0000;
            }

            let mut entry = [0u8; 32];
            entry[LDIR_ORD] = (seq + 1) as u8;
            if seq == count - 1 {
                entry[LDIR_ORD] |= LAST_LONG_ENTRY;
            }
            for (slot, &offset) in slots.iter().zip(LFN_SLOT_OFFSETS.iter()) {
                LittleEndian::write_u16(&mut entry[offset..offset + 2], *slot);
            }
            entry[LDIR_ATTR] = ATTR_LONG_NAME;
            entry[LDIR_TYPE] = 0;
            entry[LDIR_CHKSUM] = checksum;
            LittleEndian::write_u16(&mut entry[LDIR_FST_CLUS_LO..LDIR_FST_CLUS_LO + 2], 0);
            entry
        })
        .collect()
}

/// Reassemble a long name from its LFN entries (on-disk order).
///
/// Returns `None` if the chain is malformed or does not belong to
/// `short_name`.
pub fn decode_lfn_entries(entries: &[[u8; 32]], short_name: &[u8; 11]) -> Option<String> {
    let first = entries.first()?;
    if first[LDIR_ORD] & LAST_LONG_ENTRY == 0 {
        return None;
    }
    let count = (first[LDIR_ORD] & !LAST_LONG_ENTRY) as usize;
    if count != entries.len() {
        return None;
    }

    let checksum = lfn_checksum(short_name);
    let mut units = Vec::with_capacity(count * LFN_CHARS_PER_ENTRY);

    for (i, entry) in entries.iter().rev().enumerate() {
        if (entry[LDIR_ORD] & !LAST_LONG_ENTRY) as usize != i + 1
            || entry[LDIR_ATTR] != ATTR_LONG_NAME
            || entry[LDIR_CHKSUM] != checksum
        {
            return None;
        }
        for &offset in LFN_SLOT_OFFSETS.iter() {
            units.push(LittleEndian::read_u16(&entry[offset..offset + 2]));
        }
    }

    if let Some(end) = units.iter().position(|&u| u == 0x0000) {
        units.truncate(end);
    }
    String::from_utf16(&units).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_name() {
        assert_eq!(split_name("kernel.elf"), ("kernel", "elf"));
        assert_eq!(split_name("archive.tar.gz"), ("archive.tar", "gz"));
        assert_eq!(split_name(".bashrc"), (".bashrc", ""));
        assert_eq!(split_name("README"), ("README", ""));
        assert_eq!(split_name(".."), ("..", ""));
    }

    #[test]
    fn test_needs_long_name() {
        assert!(!needs_long_name("README.TXT"));
        assert!(!needs_long_name("readme.txt"));
        assert!(!needs_long_name("readme.TXT"));
        assert!(!needs_long_name("KERNEL"));
        assert!(needs_long_name("ReadMe.txt"));
        assert!(needs_long_name("very_long_filename.txt"));
        assert!(needs_long_name("file.jpeg"));
        assert!(needs_long_name("my file.txt"));
        assert!(needs_long_name("a+b.c"));
        assert!(needs_long_name(".bashrc"));
        assert!(needs_long_name("résumé.doc"));
    }

    #[test]
    fn test_lfn_entry_count() {
        assert_eq!(lfn_entry_count("BOOT.CFG"), 0);
        assert_eq!(lfn_entry_count("a really long file name.test"), 3);
        assert_eq!(lfn_entry_count("thirteenchars"), 1);
        assert_eq!(lfn_entry_count("fourteen.chars"), 2);
    }

    #[test]
    fn test_short_name_formatting() {
        assert_eq!(short_name_for("README.TXT"), *b"README  TXT");
        assert_eq!(short_name_for("test.c"), *b"TEST    C  ");
        assert_eq!(short_name_for("FOLDER"), *b"FOLDER     ");
        assert_eq!(short_name_for("a really long file name.test"), *b"AREALLYLTES");
        assert_eq!(short_name_for("."), *b".          ");
        assert_eq!(short_name_for(".."), *b"..         ");
    }

    #[test]
    fn test_case_flags() {
        assert_eq!(case_flags("readme.txt"), CASE_LOWER_BASE | CASE_LOWER_EXT);
        assert_eq!(case_flags("README.txt"), CASE_LOWER_EXT);
        assert_eq!(case_flags("readme.TXT"), CASE_LOWER_BASE);
        assert_eq!(case_flags("README.TXT"), 0);
        assert_eq!(case_flags("a really long file name.test"), 0);
    }

    #[test]
    fn test_allocator_numeric_tails() {
        let mut alloc = ShortNameAllocator::new();
        assert_eq!(alloc.claim("LONGFILE.TXT"), *b"LONGFILETXT");
        assert_eq!(alloc.allocate("longfilename1.txt").unwrap(), *b"LONGFI~1TXT");
        assert_eq!(alloc.allocate("longfilename2.txt").unwrap(), *b"LONGFI~2TXT");
        assert_eq!(alloc.allocate("another long one").unwrap(), *b"ANOTHERL   ");
    }

    #[test]
    fn test_allocator_reports_exhausted_tails() {
        let mut alloc = ShortNameAllocator::new();
        let stem = short_name_stem("longfilename");
        let ext = short_name_stem("txt");
        alloc.taken.insert(format_short_name(&stem, &ext, None));
        for i in 1..=MAX_NUMERIC_TAIL {
            alloc.taken.insert(format_short_name(&stem, &ext, Some(i)));
        }

        assert!(matches!(
            alloc.allocate("longfilename.txt"),
            Err(MkfatError::CapacityExceeded(_))
        ));
        // other stems are unaffected
        assert_eq!(alloc.allocate("different name.txt").unwrap(), *b"DIFFERENTXT");
    }

    #[test]
    fn test_lfn_checksum_matches_reference() {
        // Reference rotate-right-and-add, seeded with the first byte
        let short = short_name_for("a really long file name.test");
        let mut expected = short[0];
        for &b in &short[1..] {
            let rotated = (expected >> 1) | (expected << 7);
            expected = rotated.wrapping_add(b);
        }
        assert_eq!(lfn_checksum(&short), expected);
    }

    #[test]
    fn test_lfn_entries_for_long_name() {
        let name = "a really long file name.test";
        let short = short_name_for(name);
        let entries = build_lfn_entries(name, &short);

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0][LDIR_ORD], 0x43);
        assert_eq!(entries[1][LDIR_ORD], 0x02);
        assert_eq!(entries[2][LDIR_ORD], 0x01);

        let checksum = lfn_checksum(&short);
        for entry in &entries {
            assert_eq!(entry[LDIR_ATTR], 0x0F);
            assert_eq!(entry[LDIR_CHKSUM], checksum);
            assert_eq!(&entry[LDIR_FST_CLUS_LO..LDIR_FST_CLUS_LO + 2], &[0, 0]);
        }

        // The last entry on disk holds the first 13 characters
        assert_eq!(&entries[2][LDIR_NAME1..LDIR_NAME1 + 4], &[b'a', 0, b' ', 0]);

        // 28 characters: two in the final chunk, then terminator and padding
        let last = &entries[0];
        assert_eq!(&last[LDIR_NAME1..LDIR_NAME1 + 4], &[b's', 0, b't', 0]);
        assert_eq!(&last[LDIR_NAME1 + 4..LDIR_NAME1 + 6], &[0, 0]);
        assert_eq!(&last[LDIR_NAME1 + 6..LDIR_NAME1 + 10], &[0xFF; 4]);
        assert_eq!(&last[LDIR_NAME3..LDIR_NAME3 + 4], &[0xFF; 4]);
    }

    #[test]
    fn test_exact_multiple_of_thirteen_has_no_terminator() {
        let name = "thirteenchars";
        let short = short_name_for(name);
        let entries = build_lfn_entries(name, &short);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0][LDIR_ORD], 0x41);
        assert_eq!(&entries[0][LDIR_NAME3 + 2..LDIR_NAME3 + 4], &[b's', 0]);
    }

    #[test]
    fn test_lfn_round_trip() {
        for name in [
            "a really long file name.test",
            "Mixed Case Name.Markdown",
            "thirteenchars",
            "résumé – final.docx",
            "x".repeat(255).as_str(),
        ] {
            let short = short_name_for(name);
            let entries = build_lfn_entries(name, &short);
            assert_eq!(entries.len(), lfn_entry_count(name), "{}", name);
            assert_eq!(decode_lfn_entries(&entries, &short).as_deref(), Some(name));
        }
    }

    #[test]
    fn test_decode_rejects_foreign_checksum() {
        let name = "a really long file name.test";
        let entries = build_lfn_entries(name, &short_name_for(name));
        assert!(decode_lfn_entries(&entries, b"OTHER   TXT").is_none());
    }
}
