//! CD sector interface.
//!
//! Disc images store their sectors in one of four physical layouts:
//!
//! * 2048 bytes: only the user data, no header of any kind (plain ISO images)
//! * 2336 bytes: Mode 2 sectors without the sync pattern and header, starting with the XA
//!   sub-header
//! * 2352 bytes: the full raw sector (sync, header, optional sub-header, user data, EDC/ECC)
//! * 2448 bytes: the full raw sector followed by 96 bytes of sub-channel data
//!
//! Whatever the layout, a `Sector` exposes the same view: kind, header, sub-header, user data and
//! the defects found while parsing them.

use std::fmt;
use std::io;

use crate::ecc;
use crate::{CdError, CdResult};

pub use self::header::{CdRomMode, SyncHeader, TimecodeField, SYNC_PATTERN};
pub use self::xa::{
    FieldStatus, SubHeaderCopy, XaBitsPerSample, XaCodingAudio, XaCodingInfo, XaCodingVideo,
    XaField, XaForm, XaSamplingFreq, XaSubHeader, XaSubmode,
};

pub mod header;
pub mod xa;

use self::header::SYNC_HEADER_SIZE;
use self::xa::SUBHEADER_SIZE;

/// Size of the sub-channel data appended to 2448 byte sectors
pub const SUBCHANNEL_SIZE: usize = 96;

/// Size of a complete raw sector, without sub-channel data
pub const RAW_SECTOR_SIZE: usize = 2352;

/// Physical sector layout of a disc image
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SectorLayout {
    /// 2048 bytes per sector, user data only
    Fixed2048,
    /// 2336 bytes per sector, Mode 2 without sync and header
    Sub2336,
    /// 2352 bytes per sector, full raw sector
    Raw2352,
    /// 2448 bytes per sector, full raw sector and sub-channel data
    Sub2448,
}

impl SectorLayout {
    /// All the layouts in the order they're tried by the detector
    pub const DETECTION_ORDER: [SectorLayout; 4] = [
        SectorLayout::Sub2448,
        SectorLayout::Raw2352,
        SectorLayout::Sub2336,
        SectorLayout::Fixed2048,
    ];

    /// Largest sector size of all layouts
    pub const MAX_RAW_SIZE: usize = 2448;

    /// Number of bytes per sector in the image
    pub const fn raw_size(self) -> usize {
        match self {
            SectorLayout::Fixed2048 => 2048,
            SectorLayout::Sub2336 => 2336,
            SectorLayout::Raw2352 => 2352,
            SectorLayout::Sub2448 => 2448,
        }
    }

    /// Return the layout for the given sector size, if any
    pub fn from_raw_size(size: usize) -> Option<SectorLayout> {
        SectorLayout::DETECTION_ORDER
            .into_iter()
            .find(|l| l.raw_size() == size)
    }

    /// Returns true if the sectors carry any kind of header
    pub fn has_sector_header(self) -> bool {
        self != SectorLayout::Fixed2048
    }

    /// Parse a single sector. `raw` must be exactly `raw_size()` bytes long.
    pub fn parse(self, index: u32, raw: &[u8]) -> CdResult<Sector> {
        Sector::parse(self, index, raw)
    }
}

impl fmt::Display for SectorLayout {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SectorLayout::Fixed2048 => write!(f, "2048 (ISO)"),
            SectorLayout::Sub2336 => write!(f, "2336 (Mode 2 without sync/header)"),
            SectorLayout::Raw2352 => write!(f, "2352 (raw)"),
            SectorLayout::Sub2448 => write!(f, "2448 (raw + sub-channel)"),
        }
    }
}

/// Sector layout of an image along with the position of its first sector
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ImageLayout {
    /// Physical sector layout
    pub layout: SectorLayout,
    /// Byte offset of the first complete sector in the image, always smaller than a sector
    pub first_sector_offset: u32,
}

impl ImageLayout {
    /// Layout used when nothing better could be identified
    pub const FALLBACK: ImageLayout = ImageLayout {
        layout: SectorLayout::Fixed2048,
        first_sector_offset: 0,
    };

    /// Layout starting at the very beginning of the image
    pub fn new(layout: SectorLayout) -> ImageLayout {
        ImageLayout {
            layout,
            first_sector_offset: 0,
        }
    }

    /// Make sure that the first sector starts within the first sector-sized block of the image
    pub fn validate(&self) -> CdResult<()> {
        let size = self.layout.raw_size();

        if self.first_sector_offset as usize >= size {
            return Err(CdError::BadLayout {
                offset: self.first_sector_offset,
                size,
            });
        }

        Ok(())
    }

    /// Number of complete sectors in an image of `len` bytes. Trailing bytes are ignored.
    pub fn sector_count(&self, len: u64) -> u64 {
        len.saturating_sub(u64::from(self.first_sector_offset)) / self.layout.raw_size() as u64
    }

    /// Byte offset of sector `index` in the image
    pub fn sector_offset(&self, index: u32) -> u64 {
        u64::from(self.first_sector_offset) + u64::from(index) * self.layout.raw_size() as u64
    }
}

/// What a sector contains
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SectorKind {
    /// Sector from a 2048 byte image, nothing is known about it
    Unknown2048,
    /// CD-DA audio
    CdAudio,
    /// Mode 1 data
    Mode1,
    /// Mode 2 XA Form 1
    Mode2Form1,
    /// Mode 2 XA Form 2
    Mode2Form2,
}

impl SectorKind {
    fn from_form(form: XaForm) -> SectorKind {
        match form {
            XaForm::Form1 => SectorKind::Mode2Form1,
            XaForm::Form2 => SectorKind::Mode2Form2,
        }
    }
}

/// Corruption found while parsing a sector
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Defect {
    /// This many bytes of the sync pattern don't match
    SyncPattern(u8),
    /// A timecode field is not valid BCD
    Timecode(TimecodeField),
    /// A sub-header field didn't resolve cleanly
    SubHeader(XaField, FieldStatus),
}

impl Defect {
    /// Number of errors this defect accounts for
    pub fn weight(self) -> usize {
        match self {
            Defect::SyncPattern(n) => n as usize,
            _ => 1,
        }
    }
}

/// A single decoded sector. The sector owns a copy of its bytes so it stays valid whatever
/// happens to the image buffers afterwards.
#[derive(Clone)]
pub struct Sector {
    /// Index of the sector in the image
    index: u32,
    /// Layout the sector was parsed from
    layout: SectorLayout,
    /// `layout.raw_size()` bytes
    raw: Vec<u8>,
    kind: SectorKind,
    header: Option<SyncHeader>,
    subheader: Option<XaSubHeader>,
    /// Offset of the user data in `raw`
    header_size: usize,
    user_data_size: usize,
    defects: Vec<Defect>,
}

impl Sector {
    /// Parse a sector from `raw`, which must be exactly `layout.raw_size()` bytes long
    pub fn parse(layout: SectorLayout, index: u32, raw: &[u8]) -> CdResult<Sector> {
        if raw.len() != layout.raw_size() {
            return Err(CdError::SizeMismatch {
                expected: layout.raw_size(),
                actual: raw.len(),
            });
        }

        let mut sector = Sector {
            index,
            layout,
            raw: raw.to_vec(),
            kind: SectorKind::Unknown2048,
            header: None,
            subheader: None,
            header_size: 0,
            user_data_size: 2048,
            defects: Vec::new(),
        };

        match layout {
            SectorLayout::Fixed2048 => (),
            SectorLayout::Sub2336 => sector.parse_subheader(0),
            SectorLayout::Raw2352 | SectorLayout::Sub2448 => sector.parse_raw(),
        }

        Ok(sector)
    }

    fn parse_raw(&mut self) {
        let header = SyncHeader::parse(array_ref![self.raw, 0, SYNC_HEADER_SIZE]);

        if header.is_cd_audio() {
            self.kind = SectorKind::CdAudio;
            self.header_size = 0;
            self.user_data_size = RAW_SECTOR_SIZE;
            return;
        }

        if header.sync_errors() > 0 {
            self.defects.push(Defect::SyncPattern(header.sync_errors()));
        }

        self.defects
            .extend(header.invalid_timecode_fields().map(Defect::Timecode));

        self.header = Some(header);

        match header.mode() {
            Some(CdRomMode::Mode1) => {
                self.kind = SectorKind::Mode1;
                self.header_size = SYNC_HEADER_SIZE;
                self.user_data_size = 2048;
            }
            _ => self.parse_subheader(SYNC_HEADER_SIZE),
        }
    }

    fn parse_subheader(&mut self, offset: usize) {
        let subheader = XaSubHeader::parse(array_ref![self.raw, offset, SUBHEADER_SIZE]);

        if subheader.error_count() > 0 {
            log::debug!(
                "Sector {}: sub-header copies disagree {:?}",
                self.index,
                subheader
            );
        }

        self.defects.extend(
            subheader
                .defects()
                .map(|(field, status)| Defect::SubHeader(field, status)),
        );

        let form = subheader.form();

        self.kind = SectorKind::from_form(form);
        self.header_size = offset + SUBHEADER_SIZE;
        self.user_data_size = form.user_data_size();
        self.subheader = Some(subheader);
    }

    /// Index of the sector in the image
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Layout this sector was read from
    pub fn layout(&self) -> SectorLayout {
        self.layout
    }

    /// Kind of sector
    pub fn kind(&self) -> SectorKind {
        self.kind
    }

    /// All the bytes of the sector as stored in the image
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Size of the sector in the image
    pub fn raw_size(&self) -> usize {
        self.raw.len()
    }

    /// Number of bytes preceding the user data: 0 (2048 and CD audio), 8 (2336), 16 (Mode 1) or 24
    /// (raw Mode 2)
    pub fn header_size(&self) -> usize {
        self.header_size
    }

    /// Size of the user data: 2048, 2324 or 2352
    pub fn user_data_size(&self) -> usize {
        self.user_data_size
    }

    /// The user data payload
    pub fn user_data(&self) -> &[u8] {
        &self.raw[self.header_size..self.header_size + self.user_data_size]
    }

    /// Copy of the user data payload
    pub fn user_data_copy(&self) -> Vec<u8> {
        self.user_data().to_vec()
    }

    /// `len` bytes of user data starting at `offset`
    pub fn user_data_range(&self, offset: usize, len: usize) -> CdResult<&[u8]> {
        let end = offset.checked_add(len).filter(|&e| e <= self.user_data_size);

        match end {
            Some(end) => Ok(&self.user_data()[offset..end]),
            None => Err(CdError::SizeMismatch {
                expected: self.user_data_size,
                actual: offset.saturating_add(len),
            }),
        }
    }

    /// A reader over the user data
    pub fn user_data_reader(&self) -> io::Cursor<&[u8]> {
        io::Cursor::new(self.user_data())
    }

    /// Parsed sync pattern and header, for raw data sectors
    pub fn sync_header(&self) -> Option<&SyncHeader> {
        self.header.as_ref()
    }

    /// Resolved XA sub-header, for Mode 2 sectors
    pub fn subheader(&self) -> Option<&XaSubHeader> {
        self.subheader.as_ref()
    }

    /// Sector number from the header timecode, only if the timecode is intact
    pub fn header_sector_number(&self) -> Option<i32> {
        self.header.and_then(|h| h.sector_number())
    }

    /// The 96 sub-channel bytes of a 2448 byte sector
    pub fn subchannel(&self) -> Option<&[u8]> {
        match self.layout {
            SectorLayout::Sub2448 => Some(&self.raw[RAW_SECTOR_SIZE..]),
            _ => None,
        }
    }

    /// Corruption found in the header and sub-header
    pub fn defects(&self) -> &[Defect] {
        &self.defects
    }

    /// Returns true if any header field was corrupted
    pub fn has_errors(&self) -> bool {
        !self.defects.is_empty()
    }

    /// Number of corrupted header bytes and sub-header fields
    pub fn error_count(&self) -> usize {
        self.defects.iter().map(|d| d.weight()).sum()
    }

    /// Likelihood of this sector being XA ADPCM audio, see `xa::xa_audio_confidence`
    pub fn xa_audio_confidence(&self) -> Option<u8> {
        self.subheader
            .as_ref()
            .and_then(|sh| xa::xa_audio_confidence(sh, self.user_data()))
    }

    /// Recompute the EDC and compare it with the stored one. Returns `None` for sectors without
    /// EDC (2048 byte images and CD audio).
    pub fn verify_edc(&self) -> Option<bool> {
        match self.kind {
            SectorKind::Unknown2048 | SectorKind::CdAudio => None,
            SectorKind::Mode1 => Some(ecc::mode1_edc_matches(self.raw_2352()?)),
            SectorKind::Mode2Form1 | SectorKind::Mode2Form2 => {
                let form = self.subheader.as_ref()?.form();

                match self.layout {
                    SectorLayout::Sub2336 => {
                        Some(ecc::mode2_edc_matches(&self.frame_2336(), form))
                    }
                    _ => Some(ecc::mode2_edc_matches(self.raw_2352()?, form)),
                }
            }
        }
    }

    fn raw_2352(&self) -> Option<&[u8; RAW_SECTOR_SIZE]> {
        match self.layout {
            SectorLayout::Raw2352 | SectorLayout::Sub2448 => {
                Some(array_ref![self.raw, 0, RAW_SECTOR_SIZE])
            }
            _ => None,
        }
    }

    /// Embed a 2336 byte sector into a full raw sector with a zeroed address
    fn frame_2336(&self) -> Box<[u8; RAW_SECTOR_SIZE]> {
        let mut frame = Box::new([0u8; RAW_SECTOR_SIZE]);

        frame[..12].copy_from_slice(&SYNC_PATTERN);
        frame[15] = CdRomMode::Mode2 as u8;
        frame[SYNC_HEADER_SIZE..].copy_from_slice(&self.raw);

        frame
    }

    /// Build the bytes of this sector with its user data replaced by `user_data`, regenerating the
    /// error detection and correction codes where the layout allows it.
    ///
    /// Mode 1 sectors are not supported.
    pub fn rebuild_raw(&self, user_data: &[u8]) -> CdResult<Vec<u8>> {
        if user_data.len() != self.user_data_size {
            return Err(CdError::SizeMismatch {
                expected: self.user_data_size,
                actual: user_data.len(),
            });
        }

        let mut raw = self.raw.clone();
        raw[self.header_size..self.header_size + self.user_data_size].copy_from_slice(user_data);

        match self.kind {
            SectorKind::Unknown2048 | SectorKind::CdAudio => (),
            SectorKind::Mode1 => {
                return Err(CdError::Unsupported(
                    "rebuilding the error correction of Mode 1 sectors",
                ))
            }
            SectorKind::Mode2Form1 | SectorKind::Mode2Form2 => {
                let form = self.kind_form();

                match self.layout {
                    SectorLayout::Sub2336 => {
                        let mut frame = self.frame_2336();

                        frame[SYNC_HEADER_SIZE..].copy_from_slice(&raw);
                        ecc::rebuild_parity(&mut frame, form);
                        raw.copy_from_slice(&frame[SYNC_HEADER_SIZE..]);
                    }
                    _ => {
                        ecc::rebuild_parity(
                            array_mut_ref![raw, 0, RAW_SECTOR_SIZE],
                            form,
                        );
                    }
                }
            }
        }

        Ok(raw)
    }

    fn kind_form(&self) -> XaForm {
        match self.kind {
            SectorKind::Mode2Form2 => XaForm::Form2,
            _ => XaForm::Form1,
        }
    }

    /// Human readable description of the sector
    pub fn description(&self) -> String {
        let mut desc = format!("[Sector {} ", self.index);

        match self.kind {
            SectorKind::Unknown2048 => desc.push_str("2048"),
            SectorKind::CdAudio => desc.push_str("CD audio"),
            SectorKind::Mode1 => desc.push_str("Mode 1"),
            SectorKind::Mode2Form1 => desc.push_str("Mode 2 Form 1"),
            SectorKind::Mode2Form2 => desc.push_str("Mode 2 Form 2"),
        }

        if let Some(n) = self.header_sector_number() {
            desc.push_str(&format!(" #{}", n));
        }

        if let Some(sh) = &self.subheader {
            desc.push_str(&format!(" {:?}", sh));
        }

        if self.has_errors() {
            desc.push_str(&format!(" {} errors", self.error_count()));
        }

        desc.push(']');
        desc
    }
}

impl fmt::Debug for Sector {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.description())
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;

    /// Build a raw 2352 byte Mode 2 sector with valid EDC/ECC
    pub fn mode2_sector(lba: u32, submode: u8, fill: u8) -> Vec<u8> {
        let form = XaSubmode(submode).form();
        let mut raw = [0u8; RAW_SECTOR_SIZE];

        raw[..16].copy_from_slice(&SyncHeader::build(lba, CdRomMode::Mode2).unwrap());
        raw[16..24].copy_from_slice(&[1, 0, submode, 0, 1, 0, submode, 0]);

        for (i, b) in raw[24..24 + form.user_data_size()].iter_mut().enumerate() {
            *b = fill.wrapping_add(i as u8);
        }

        ecc::rebuild_parity(&mut raw, form);

        raw.to_vec()
    }

    /// Build a raw 2352 byte Mode 1 sector
    pub fn mode1_sector(lba: u32) -> Vec<u8> {
        let mut raw = vec![0u8; RAW_SECTOR_SIZE];

        raw[..16].copy_from_slice(&SyncHeader::build(lba, CdRomMode::Mode1).unwrap());

        raw
    }

    #[test]
    fn fixed_2048() {
        let raw = vec![0x42; 2048];
        let s = Sector::parse(SectorLayout::Fixed2048, 3, &raw).unwrap();

        assert_eq!(s.kind(), SectorKind::Unknown2048);
        assert_eq!(s.header_size(), 0);
        assert_eq!(s.user_data_size(), 2048);
        assert!(!s.has_errors());
        assert!(s.sync_header().is_none());
        assert_eq!(s.verify_edc(), None);
        assert_eq!(s.rebuild_raw(&[0x42; 2048]).unwrap(), raw);
    }

    #[test]
    fn wrong_window_size() {
        let res = Sector::parse(SectorLayout::Raw2352, 0, &[0; 2048]);

        assert!(matches!(
            res,
            Err(CdError::SizeMismatch {
                expected: 2352,
                actual: 2048
            })
        ));
    }

    #[test]
    fn raw_mode2_forms() {
        let raw = mode2_sector(100, 0x08, 0);
        let s = Sector::parse(SectorLayout::Raw2352, 0, &raw).unwrap();

        assert_eq!(s.kind(), SectorKind::Mode2Form1);
        assert_eq!(s.header_size(), 24);
        assert_eq!(s.user_data_size(), 2048);
        assert_eq!(s.header_sector_number(), Some(100));
        assert_eq!(s.verify_edc(), Some(true));
        assert!(!s.has_errors());

        let raw = mode2_sector(101, 0x64, 0);
        let s = Sector::parse(SectorLayout::Raw2352, 0, &raw).unwrap();

        assert_eq!(s.kind(), SectorKind::Mode2Form2);
        assert_eq!(s.user_data_size(), 2324);
        assert_eq!(s.verify_edc(), Some(true));
    }

    #[test]
    fn mode1() {
        let raw = mode1_sector(5);
        let s = Sector::parse(SectorLayout::Raw2352, 0, &raw).unwrap();

        assert_eq!(s.kind(), SectorKind::Mode1);
        assert_eq!(s.header_size(), 16);
        assert_eq!(s.user_data_size(), 2048);
        assert!(s.subheader().is_none());
        assert!(matches!(
            s.rebuild_raw(&[0; 2048]),
            Err(CdError::Unsupported(_))
        ));
    }

    #[test]
    fn broken_sync_is_cd_audio() {
        let mut raw = mode1_sector(5);
        for (b, &p) in raw[..12].iter_mut().zip(SYNC_PATTERN.iter()) {
            *b = !p;
        }

        let s = Sector::parse(SectorLayout::Raw2352, 0, &raw).unwrap();

        assert_eq!(s.kind(), SectorKind::CdAudio);
        assert_eq!(s.header_size(), 0);
        assert_eq!(s.user_data_size(), 2352);
        assert!(s.sync_header().is_none());
        assert!(!s.has_errors());
    }

    #[test]
    fn damaged_header_is_reported() {
        let mut raw = mode2_sector(5, 0x08, 0);

        raw[1] = 0x00;
        raw[14] = 0xfa;
        // Second copy of the channel number
        raw[21] = 3;

        let s = Sector::parse(SectorLayout::Raw2352, 0, &raw).unwrap();

        assert_eq!(s.kind(), SectorKind::Mode2Form1);
        assert_eq!(s.header_sector_number(), None);
        assert_eq!(
            s.defects(),
            &[
                Defect::SyncPattern(1),
                Defect::Timecode(TimecodeField::Frames),
                Defect::SubHeader(XaField::Channel, FieldStatus::TieBroken(SubHeaderCopy::First)),
            ]
        );
        assert_eq!(s.error_count(), 3);
        assert_eq!(s.subheader().unwrap().channel_number(), 0);
    }

    #[test]
    fn rebuild_round_trip() {
        for &submode in &[0x08, 0x64] {
            let raw = mode2_sector(77, submode, 9);
            let s = Sector::parse(SectorLayout::Raw2352, 0, &raw).unwrap();

            assert_eq!(s.rebuild_raw(&s.user_data_copy()).unwrap(), raw);

            let mut data = s.user_data_copy();
            data[0] ^= 0xff;

            let rebuilt = s.rebuild_raw(&data).unwrap();
            let s2 = Sector::parse(SectorLayout::Raw2352, 0, &rebuilt).unwrap();

            assert_eq!(s2.user_data(), &data[..]);
            assert_eq!(s2.verify_edc(), Some(true));
            assert_eq!(&rebuilt[..24], &raw[..24]);
        }

        let mut audio = vec![0x11; 2352];
        audio[15] = 0x33;
        let s = Sector::parse(SectorLayout::Raw2352, 0, &audio).unwrap();
        assert_eq!(s.kind(), SectorKind::CdAudio);
        assert_eq!(s.rebuild_raw(&s.user_data_copy()).unwrap(), audio);
    }

    #[test]
    fn sub_2336() {
        for &submode in &[0x08, 0x64] {
            let raw = mode2_sector(12, submode, 3);
            let s = Sector::parse(SectorLayout::Sub2336, 0, &raw[16..]).unwrap();
            let form = XaSubmode(submode).form();

            assert_eq!(s.kind(), SectorKind::from_form(form));
            assert_eq!(s.header_size(), 8);
            assert_eq!(s.user_data_size(), form.user_data_size());
            assert!(s.sync_header().is_none());
            assert_eq!(s.verify_edc(), Some(true));
            assert_eq!(s.user_data(), &raw[24..24 + form.user_data_size()]);
            assert_eq!(s.rebuild_raw(&s.user_data_copy()).unwrap(), &raw[16..]);

            let data = vec![0x5a; form.user_data_size()];
            let rebuilt = s.rebuild_raw(&data).unwrap();
            let mut expected = raw.clone();
            expected[24..24 + data.len()].copy_from_slice(&data);
            ecc::rebuild_parity(array_mut_ref![expected, 0, RAW_SECTOR_SIZE], form);

            assert_eq!(rebuilt, &expected[16..]);
        }
    }

    #[test]
    fn sub_2448() {
        let mut raw = mode2_sector(12, 0x08, 3);
        raw.extend((0..SUBCHANNEL_SIZE).map(|i| i as u8));

        let s = Sector::parse(SectorLayout::Sub2448, 0, &raw).unwrap();

        assert_eq!(s.kind(), SectorKind::Mode2Form1);
        assert_eq!(s.subchannel().unwrap(), &raw[2352..]);

        let rebuilt = s.rebuild_raw(&vec![0; 2048]).unwrap();
        assert_eq!(&rebuilt[2352..], &raw[2352..]);
        assert_eq!(rebuilt.len(), 2448);
    }

    #[test]
    fn user_data_access() {
        let raw = mode2_sector(0, 0x08, 0);
        let s = Sector::parse(SectorLayout::Raw2352, 0, &raw).unwrap();

        assert_eq!(s.user_data_range(10, 4).unwrap(), &[10, 11, 12, 13]);
        assert!(s.user_data_range(2040, 9).is_err());

        let mut buf = Vec::new();
        io::Read::read_to_end(&mut s.user_data_reader(), &mut buf).unwrap();
        assert_eq!(buf, s.user_data());
    }
}
