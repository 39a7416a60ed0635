//! CD-ROM XA Mode 2 sub-header (from the CDi "green book"):
//!
//! ```text
//!   byte 0: File Number
//!   byte 1: Channel Number
//!   byte 2: Submode
//!   byte 3: Coding Information
//!   byte 4: File Number
//!   byte 5: Channel Number
//!   byte 6: Submode
//!   byte 7: Coding Information
//! ```
//!
//! The data is copied twice for data integrity. Both copies should be identical but on damaged
//! discs or bad rips they often aren't, so every field is resolved from both copies by a vote.

use std::fmt;

/// Size of the sub-header (both copies)
pub const SUBHEADER_SIZE: usize = 8;

/// Identifies one of the two copies of the sub-header
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum SubHeaderCopy {
    /// Bytes 0-3
    First,
    /// Bytes 4-7
    Second,
}

/// Fields of the sub-header
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum XaField {
    /// File number
    FileNumber = 0,
    /// Channel number
    Channel = 1,
    /// Submode flags
    Submode = 2,
    /// Coding information
    CodingInfo = 3,
}

impl XaField {
    const ALL: [XaField; 4] = [
        XaField::FileNumber,
        XaField::Channel,
        XaField::Submode,
        XaField::CodingInfo,
    ];
}

/// How a sub-header field was resolved from its two copies
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum FieldStatus {
    /// Both copies are identical and the value is valid
    EqualGood,
    /// Both copies are identical but the value is not valid
    EqualBad,
    /// The copies differ and only one of them is valid
    OnlyValid(SubHeaderCopy),
    /// The copies differ and they're both valid (or both invalid). The copy was picked from the
    /// confidence balance of the whole sub-header.
    TieBroken(SubHeaderCopy),
}

impl FieldStatus {
    /// Returns true unless both copies agree on a valid value
    pub fn is_error(self) -> bool {
        self != FieldStatus::EqualGood
    }
}

/// Outcome of the vote for a single field, before the sector-wide tie-break
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum Vote {
    Decided(u8, FieldStatus),
    Tie,
}

/// Resolve one field from its two copies. Returns the vote and its contribution to the sector
/// balance: +1 when the second copy proved more trustworthy, -1 when the first one did.
fn resolve_field(copy1: u8, copy2: u8, valid1: bool, valid2: bool) -> (Vote, i32) {
    if copy1 == copy2 {
        let status = if valid1 {
            FieldStatus::EqualGood
        } else {
            FieldStatus::EqualBad
        };

        return (Vote::Decided(copy1, status), 0);
    }

    match (valid1, valid2) {
        (true, false) => (
            Vote::Decided(copy1, FieldStatus::OnlyValid(SubHeaderCopy::First)),
            -1,
        ),
        (false, true) => (
            Vote::Decided(copy2, FieldStatus::OnlyValid(SubHeaderCopy::Second)),
            1,
        ),
        _ => (Vote::Tie, 0),
    }
}

fn break_tie(vote: Vote, copy1: u8, copy2: u8, preferred: SubHeaderCopy) -> (u8, FieldStatus) {
    match vote {
        Vote::Decided(v, status) => (v, status),
        Vote::Tie => match preferred {
            SubHeaderCopy::First => (copy1, FieldStatus::TieBroken(SubHeaderCopy::First)),
            SubHeaderCopy::Second => (copy2, FieldStatus::TieBroken(SubHeaderCopy::Second)),
        },
    }
}

/// Sub-header with every field resolved from its two copies
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct XaSubHeader {
    /// The 8 raw bytes
    raw: [u8; SUBHEADER_SIZE],
    /// Resolved values, indexed by `XaField`
    values: [u8; 4],
    /// Resolution status, indexed by `XaField`
    status: [FieldStatus; 4],
    /// Sum of the balance contributions of the submode and coding info fields
    balance: i32,
}

impl XaSubHeader {
    /// Parse and resolve an 8 byte sub-header
    pub fn parse(raw: &[u8; SUBHEADER_SIZE]) -> XaSubHeader {
        let (c1, c2) = (array_ref![raw, 0, 4], array_ref![raw, 4, 4]);

        let (sm1, sm2) = (XaSubmode(c1[2]), XaSubmode(c2[2]));

        let (submode, submode_balance) =
            resolve_field(sm1.0, sm2.0, sm1.is_valid(), sm2.is_valid());
        // Each copy of the coding info is checked against the submode of the same copy
        let (coding, coding_balance) = resolve_field(
            c1[3],
            c2[3],
            XaCodingInfo::is_valid_for(c1[3], sm1),
            XaCodingInfo::is_valid_for(c2[3], sm2),
        );

        // File and channel numbers accept any value: a mismatch is always a tie and never moves
        // the balance.
        let (file, _) = resolve_field(c1[0], c2[0], true, true);
        let (channel, _) = resolve_field(c1[1], c2[1], true, true);

        let balance = submode_balance + coding_balance;
        let preferred = if balance > 0 {
            SubHeaderCopy::Second
        } else {
            SubHeaderCopy::First
        };

        let votes = [file, channel, submode, coding];
        let mut values = [0; 4];
        let mut status = [FieldStatus::EqualGood; 4];

        for field in XaField::ALL {
            let i = field as usize;
            let (v, s) = break_tie(votes[i], c1[i], c2[i], preferred);

            values[i] = v;
            status[i] = s;
        }

        // Identical coding info copies are judged against the resolved submode
        if let Vote::Decided(ci, FieldStatus::EqualGood | FieldStatus::EqualBad) = coding {
            status[XaField::CodingInfo as usize] =
                if XaCodingInfo::is_valid_for(ci, XaSubmode(values[XaField::Submode as usize])) {
                    FieldStatus::EqualGood
                } else {
                    FieldStatus::EqualBad
                };
        }

        XaSubHeader {
            raw: *raw,
            values,
            status,
            balance,
        }
    }

    /// The 8 raw bytes of the sub-header
    pub fn raw(&self) -> &[u8; SUBHEADER_SIZE] {
        &self.raw
    }

    /// Resolved File Number
    pub fn file_number(&self) -> u8 {
        self.values[XaField::FileNumber as usize]
    }

    /// Resolved Channel Number
    pub fn channel_number(&self) -> u8 {
        self.values[XaField::Channel as usize]
    }

    /// Resolved Submode
    pub fn submode(&self) -> XaSubmode {
        XaSubmode(self.values[XaField::Submode as usize])
    }

    /// Resolved coding info, interpreted based on the resolved submode
    pub fn coding_info(&self) -> XaCodingInfo {
        XaCodingInfo::new(self.coding_info_raw(), self.submode())
    }

    /// Resolved coding info byte
    pub fn coding_info_raw(&self) -> u8 {
        self.values[XaField::CodingInfo as usize]
    }

    /// How `field` was resolved
    pub fn field_status(&self, field: XaField) -> FieldStatus {
        self.status[field as usize]
    }

    /// Every field whose copies disagreed or whose value is invalid
    pub fn defects(&self) -> impl Iterator<Item = (XaField, FieldStatus)> + '_ {
        XaField::ALL
            .into_iter()
            .map(move |f| (f, self.field_status(f)))
            .filter(|(_, s)| s.is_error())
    }

    /// Number of fields that didn't resolve cleanly
    pub fn error_count(&self) -> usize {
        self.defects().count()
    }

    /// Confidence balance of the sub-header: positive if the second copy looked more trustworthy
    pub fn balance(&self) -> i32 {
        self.balance
    }

    /// Sector form, as advertised by the resolved submode
    pub fn form(&self) -> XaForm {
        self.submode().form()
    }
}

impl fmt::Debug for XaSubHeader {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "File.Channel:{}.{} Submode:{:02x} Coding:{:02x}",
            self.file_number(),
            self.channel_number(),
            self.submode().0,
            self.coding_info_raw()
        )?;

        if self.error_count() > 0 {
            write!(f, " ({} errors, balance {})", self.error_count(), self.balance)?;
        }

        Ok(())
    }
}

/// Possible interpretations of the XA sub-header Coding Information
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum XaCodingInfo {
    /// Video coding info
    Video(XaCodingVideo),
    /// Audio coding info
    Audio(XaCodingAudio),
    /// Unknown or unsupported Coding Information
    Unknown(u8),
}

impl XaCodingInfo {
    /// Interpret `coding` based on the sector type advertised by `submode`
    pub fn new(coding: u8, submode: XaSubmode) -> XaCodingInfo {
        if submode.video() {
            XaCodingInfo::Video(XaCodingVideo(coding))
        } else if submode.audio() {
            XaCodingInfo::Audio(XaCodingAudio(coding))
        } else {
            XaCodingInfo::Unknown(coding)
        }
    }

    /// Audio sectors must not use any of the reserved values, other sector types accept anything
    pub fn is_valid_for(coding: u8, submode: XaSubmode) -> bool {
        match XaCodingInfo::new(coding, submode) {
            XaCodingInfo::Audio(a) => a.is_valid(),
            _ => true,
        }
    }
}

/// Video Coding Information byte from an XA sub-header
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct XaCodingVideo(pub u8);

/// Audio Coding Information byte from an XA sub-header
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct XaCodingAudio(pub u8);

impl XaCodingAudio {
    /// The three 2bit fields only define the values 0 and 1, bit 7 is reserved
    pub fn is_valid(self) -> bool {
        self.0 & 0b1010_1010 == 0
    }

    /// Returns `true` if the `stereo` bit is set.
    pub fn stereo(self) -> bool {
        self.0 & 1 != 0
    }

    /// Returns the sampling frequency for this sector.
    pub fn sampling_frequency(self) -> XaSamplingFreq {
        if self.0 & (1 << 2) != 0 {
            XaSamplingFreq::F18_9
        } else {
            XaSamplingFreq::F37_8
        }
    }

    /// Returns the number of bits per sample
    pub fn bits_per_sample(self) -> XaBitsPerSample {
        if self.0 & (1 << 4) != 0 {
            XaBitsPerSample::S8Bits
        } else {
            XaBitsPerSample::S4Bits
        }
    }

    /// Returns true if emphasis is on for this sector
    pub fn emphasis(self) -> bool {
        self.0 & (1 << 6) != 0
    }
}

/// Possible values for the sampling frequency of an audio XA sector
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum XaSamplingFreq {
    /// 37.8 kHz
    F37_8 = 37_800,
    /// 18.9 kHz
    F18_9 = 18_900,
}

/// Possible values for the number of bits per sample of an audio XA sector
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum XaBitsPerSample {
    /// 4 bits per sample
    S4Bits = 4,
    /// 8 bits per sample
    S8Bits = 8,
}

/// The Submode byte in a Mode 2 XA sub-header
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct XaSubmode(pub u8);

impl XaSubmode {
    /// End Of Record
    pub const EOR: u8 = 1 << 0;
    /// Video
    pub const VIDEO: u8 = 1 << 1;
    /// Audio
    pub const AUDIO: u8 = 1 << 2;
    /// Data
    pub const DATA: u8 = 1 << 3;
    /// Trigger
    pub const TRIGGER: u8 = 1 << 4;
    /// Form 2
    pub const FORM2: u8 = 1 << 5;
    /// Real-Time sector
    pub const REAL_TIME: u8 = 1 << 6;
    /// End Of File
    pub const EOF: u8 = 1 << 7;

    /// A sector can't be more than one of video, audio or data
    pub fn is_valid(self) -> bool {
        (self.0 & (XaSubmode::VIDEO | XaSubmode::AUDIO | XaSubmode::DATA)).count_ones() <= 1
    }

    /// True if the End Of Record (EOR) bit is set.
    pub fn end_of_record(self) -> bool {
        self.0 & XaSubmode::EOR != 0
    }

    /// True if the Video (V) bit is set
    pub fn video(self) -> bool {
        self.0 & XaSubmode::VIDEO != 0
    }

    /// True if the Audio (A) bit is set.
    pub fn audio(self) -> bool {
        self.0 & XaSubmode::AUDIO != 0
    }

    /// True if the Data (D) bit is set.
    pub fn data(self) -> bool {
        self.0 & XaSubmode::DATA != 0
    }

    /// True if the Trigger (T) bit is set.
    pub fn trigger(self) -> bool {
        self.0 & XaSubmode::TRIGGER != 0
    }

    /// Return the sector form
    pub fn form(self) -> XaForm {
        if self.0 & XaSubmode::FORM2 != 0 {
            XaForm::Form2
        } else {
            XaForm::Form1
        }
    }

    /// True if the Real-Time Sector (RT) bit is set
    pub fn real_time(self) -> bool {
        self.0 & XaSubmode::REAL_TIME != 0
    }

    /// True if the End Of File (EOF) bit is set
    pub fn end_of_file(self) -> bool {
        self.0 & XaSubmode::EOF != 0
    }

    /// True for a real-time Form 2 audio sector, the only kind that can carry XA ADPCM
    pub fn is_xa_audio(self) -> bool {
        let set = XaSubmode::FORM2 | XaSubmode::AUDIO | XaSubmode::REAL_TIME;
        let clear = XaSubmode::DATA | XaSubmode::VIDEO;

        self.0 & (set | clear) == set
    }
}

/// CD-ROM XA Mode 2 sectors have two possible forms (advertised in the subheader)
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum XaForm {
    /// Mode 2 Form 1: 2048 bytes of data, 4 bytes of error detection and 276 bytes of error
    /// correction
    Form1 = 0,
    /// Mode 2 Form 2: 2324 bytes of data, 4 bytes of "quality control".
    ///
    /// The CDi standard says that those bytes are reserved and ignored by the system and *recommends*
    /// to use the same algorithm as for the Form 1 error detection code. It's also possible to
    /// leave it to zero if unused...
    Form2 = 1,
}

impl XaForm {
    /// Size of the user data for this form
    pub fn user_data_size(self) -> usize {
        match self {
            XaForm::Form1 => 2048,
            XaForm::Form2 => 2324,
        }
    }
}

/// XA ADPCM audio is made of 18 sound groups of 128 bytes
const SOUND_GROUPS: usize = 18;
const SOUND_GROUP_SIZE: usize = 128;

/// Estimate how likely `user_data` is to be XA ADPCM audio, as a percentage.
///
/// Returns `None` if the sub-header doesn't describe a real-time Form 2 audio sector with a usable
/// coding info. Otherwise every sound group header is checked: the sound parameters are always
/// stored twice (4bit) or four times (8bit) and the copies must agree.
pub fn xa_audio_confidence(subheader: &XaSubHeader, user_data: &[u8]) -> Option<u8> {
    if !subheader.submode().is_xa_audio() {
        return None;
    }

    let coding = match subheader.coding_info() {
        XaCodingInfo::Audio(a) if a.is_valid() => a,
        _ => return None,
    };

    if user_data.len() < SOUND_GROUPS * SOUND_GROUP_SIZE {
        return None;
    }

    // (copy, reference) pairs of 4 byte parameter blocks within the 16 byte group header
    let pairs: &[(usize, usize)] = match coding.bits_per_sample() {
        XaBitsPerSample::S4Bits => &[(0, 4), (12, 8)],
        XaBitsPerSample::S8Bits => &[(0, 4), (8, 4), (12, 4)],
    };

    let max_errors = SOUND_GROUPS * pairs.len() * 4;
    let mut errors = 0;

    for group in user_data.chunks_exact(SOUND_GROUP_SIZE).take(SOUND_GROUPS) {
        for &(copy, reference) in pairs {
            errors += group[copy..copy + 4]
                .iter()
                .zip(&group[reference..reference + 4])
                .filter(|(a, b)| a != b)
                .count();
        }
    }

    Some((100 - errors * 100 / max_errors) as u8)
}

#[cfg(test)]
mod test {
    use super::*;

    fn subheader(c1: [u8; 4], c2: [u8; 4]) -> XaSubHeader {
        let mut raw = [0; 8];

        raw[..4].copy_from_slice(&c1);
        raw[4..].copy_from_slice(&c2);

        XaSubHeader::parse(&raw)
    }

    #[test]
    fn identical_copies() {
        let sh = subheader([1, 2, 0x64, 0x01], [1, 2, 0x64, 0x01]);

        for f in XaField::ALL {
            assert_eq!(sh.field_status(f), FieldStatus::EqualGood);
        }

        assert_eq!(sh.balance(), 0);
        assert_eq!(sh.error_count(), 0);
        assert_eq!(sh.file_number(), 1);
        assert_eq!(sh.channel_number(), 2);
        assert_eq!(sh.form(), XaForm::Form2);
        assert!(sh.submode().is_xa_audio());

        match sh.coding_info() {
            XaCodingInfo::Audio(a) => {
                assert!(a.stereo());
                assert_eq!(a.sampling_frequency(), XaSamplingFreq::F37_8);
                assert_eq!(a.bits_per_sample(), XaBitsPerSample::S4Bits);
            }
            other => panic!("unexpected coding info {:?}", other),
        }
    }

    #[test]
    fn identical_but_invalid() {
        // Audio + Video + Data at once
        let sh = subheader([0, 0, 0x0e, 0], [0, 0, 0x0e, 0]);

        assert_eq!(sh.field_status(XaField::Submode), FieldStatus::EqualBad);
        assert_eq!(sh.balance(), 0);
        assert_eq!(sh.error_count(), 1);
    }

    #[test]
    fn only_one_copy_valid() {
        // Second submode copy has both audio and data set
        let sh = subheader([0, 0, 0x64, 0x00], [0, 0, 0x6c, 0x00]);

        assert_eq!(
            sh.field_status(XaField::Submode),
            FieldStatus::OnlyValid(SubHeaderCopy::First)
        );
        assert_eq!(sh.submode(), XaSubmode(0x64));
        assert_eq!(sh.balance(), -1);

        // Coding info copy 1 uses a reserved value for audio
        let sh = subheader([0, 0, 0x64, 0x80], [0, 0, 0x64, 0x01]);

        assert_eq!(
            sh.field_status(XaField::CodingInfo),
            FieldStatus::OnlyValid(SubHeaderCopy::Second)
        );
        assert_eq!(sh.coding_info_raw(), 0x01);
        assert_eq!(sh.balance(), 1);
    }

    #[test]
    fn ties_follow_balance() {
        // Coding info says copy 2 is better, the file number tie follows it
        let sh = subheader([3, 0, 0x64, 0x80], [4, 0, 0x64, 0x01]);

        assert_eq!(sh.balance(), 1);
        assert_eq!(sh.file_number(), 4);
        assert_eq!(
            sh.field_status(XaField::FileNumber),
            FieldStatus::TieBroken(SubHeaderCopy::Second)
        );
        assert_eq!(sh.error_count(), 2);

        // No evidence either way: copy 1 wins
        let sh = subheader([3, 7, 0x08, 0x00], [4, 9, 0x48, 0x00]);

        assert_eq!(sh.balance(), 0);
        assert_eq!(sh.file_number(), 3);
        assert_eq!(sh.channel_number(), 7);
        assert_eq!(sh.submode(), XaSubmode(0x08));
        assert_eq!(
            sh.field_status(XaField::Submode),
            FieldStatus::TieBroken(SubHeaderCopy::First)
        );
    }

    #[test]
    fn file_and_channel_never_move_balance() {
        let sh = subheader([1, 1, 0x08, 0], [2, 2, 0x08, 0]);

        assert_eq!(sh.balance(), 0);
        assert_eq!(sh.error_count(), 2);
    }

    fn audio_data(bits8: bool) -> Vec<u8> {
        let mut data = vec![0u8; 2324];

        for (g, group) in data.chunks_exact_mut(128).take(18).enumerate() {
            let params = [g as u8, 0x10 | g as u8, 0x20, 0x33];
            let params2 = [0x01, 0x02, 0x03, 0x04];

            group[0..4].copy_from_slice(&params);
            group[4..8].copy_from_slice(&params);

            if bits8 {
                group[8..12].copy_from_slice(&params);
                group[12..16].copy_from_slice(&params);
            } else {
                group[8..12].copy_from_slice(&params2);
                group[12..16].copy_from_slice(&params2);
            }
        }

        data
    }

    #[test]
    fn xa_audio_heuristic() {
        let sh = subheader([1, 0, 0x64, 0x00], [1, 0, 0x64, 0x00]);
        let mut data = audio_data(false);

        assert_eq!(xa_audio_confidence(&sh, &data), Some(100));

        // A single bad byte is within the rounding of the score
        data[5] ^= 0xff;
        assert_eq!(xa_audio_confidence(&sh, &data), Some(100));

        for b in &mut data[4..8] {
            *b ^= 0x5a;
        }
        let c = xa_audio_confidence(&sh, &data).unwrap();
        assert!(c < 100 && c > 90);

        let sh8 = subheader([1, 0, 0x64, 0x10], [1, 0, 0x64, 0x10]);
        assert_eq!(xa_audio_confidence(&sh8, &audio_data(true)), Some(100));
        assert!(xa_audio_confidence(&sh8, &audio_data(false)).unwrap() < 100);

        // Data sector
        let data_sh = subheader([1, 0, 0x08, 0x00], [1, 0, 0x08, 0x00]);
        assert_eq!(xa_audio_confidence(&data_sh, &audio_data(false)), None);

        // Audio without the real-time bit
        let nrt = subheader([1, 0, 0x24, 0x00], [1, 0, 0x24, 0x00]);
        assert_eq!(xa_audio_confidence(&nrt, &audio_data(false)), None);
    }
}
