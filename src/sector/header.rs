//! CD-ROM sync pattern and 4 byte header found at the start of raw (2352 and 2448 byte) sectors.

use crate::bcd::Bcd;
use crate::msf::{Msf, LBA_OFFSET};

/// The sync pattern at the start of every CD-ROM sector
pub const SYNC_PATTERN: [u8; 12] = [
    0x00, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x00,
];

/// Above this many corrupted sync bytes a sector is considered to be CD audio
pub const MAX_SYNC_ERRORS: u8 = 4;

/// Size of the sync pattern and header
pub const SYNC_HEADER_SIZE: usize = 16;

/// Mode for a CD-ROM sector
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum CdRomMode {
    /// Mode1 ("Regular" CD-ROM)
    Mode1 = 1,
    /// Mode2 (Used for various other sub-formats, such as CD-ROM XA)
    Mode2 = 2,
}

/// One of the three timecode fields of the header
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum TimecodeField {
    /// Byte 12
    Minutes,
    /// Byte 13
    Seconds,
    /// Byte 14
    Frames,
}

/// Parsed sync pattern and header. Every field is kept even when corrupted, validity is exposed
/// separately.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct SyncHeader {
    /// Number of bytes of the sync pattern that didn't match
    sync_errors: u8,
    /// Raw minutes, seconds, frames
    timecode: [u8; 3],
    /// Raw mode byte
    mode: u8,
}

impl SyncHeader {
    /// Parse the first 16 bytes of a raw sector
    pub fn parse(raw: &[u8; SYNC_HEADER_SIZE]) -> SyncHeader {
        let sync_errors = raw[..12]
            .iter()
            .zip(SYNC_PATTERN.iter())
            .filter(|(a, b)| a != b)
            .count() as u8;

        SyncHeader {
            sync_errors,
            timecode: *array_ref![raw, 12, 3],
            mode: raw[15],
        }
    }

    /// Number of sync pattern bytes that didn't match the expected value
    pub fn sync_errors(&self) -> u8 {
        self.sync_errors
    }

    /// Raw value of the given timecode field
    pub fn timecode_raw(&self, field: TimecodeField) -> u8 {
        self.timecode[field as usize]
    }

    /// The given timecode field if it's valid BCD
    pub fn timecode(&self, field: TimecodeField) -> Option<Bcd> {
        Bcd::from_bcd(self.timecode_raw(field))
    }

    /// Timecode fields which are not valid BCD
    pub fn invalid_timecode_fields(&self) -> impl Iterator<Item = TimecodeField> + '_ {
        [
            TimecodeField::Minutes,
            TimecodeField::Seconds,
            TimecodeField::Frames,
        ]
        .into_iter()
        .filter(move |&f| self.timecode(f).is_none())
    }

    /// Raw mode byte
    pub fn mode_raw(&self) -> u8 {
        self.mode
    }

    /// Sector mode, or `None` if the mode byte is neither 1 nor 2
    pub fn mode(&self) -> Option<CdRomMode> {
        match self.mode {
            1 => Some(CdRomMode::Mode1),
            2 => Some(CdRomMode::Mode2),
            _ => None,
        }
    }

    /// A sector with an unusable mode or a sync pattern too damaged to be a coincidence is audio.
    /// Smaller corruptions of the sync or timecode don't change the classification.
    pub fn is_cd_audio(&self) -> bool {
        self.mode().is_none() || self.sync_errors > MAX_SYNC_ERRORS
    }

    /// Return the timecode as an MSF if every field is valid
    pub fn msf(&self) -> Option<Msf> {
        let [m, s, f] = self.timecode;

        Msf::from_bcd(m, s, f)
    }

    /// Sector number computed from the timecode, or `None` if any of the fields is not valid BCD.
    /// It's never guessed.
    pub fn sector_number(&self) -> Option<i32> {
        let m = self.timecode(TimecodeField::Minutes)?.binary() as i32;
        let s = self.timecode(TimecodeField::Seconds)?.binary() as i32;
        let f = self.timecode(TimecodeField::Frames)?.binary() as i32;

        Some(m * 60 * 75 + s * 75 + f - LBA_OFFSET as i32)
    }

    /// Number of corrupted bytes in the sync pattern and timecode
    pub fn error_count(&self) -> usize {
        self.sync_errors as usize + self.invalid_timecode_fields().count()
    }

    /// Build the 16 byte header for the given `lba` and `mode`
    pub fn build(lba: u32, mode: CdRomMode) -> Option<[u8; SYNC_HEADER_SIZE]> {
        let msf = Msf::from_lba(lba)?;
        let mut raw = [0u8; SYNC_HEADER_SIZE];

        raw[..12].copy_from_slice(&SYNC_PATTERN);
        raw[12..15].copy_from_slice(&msf.to_bytes());
        raw[15] = mode as u8;

        Some(raw)
    }
}
