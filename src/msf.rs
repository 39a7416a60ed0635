//! Compact discs were originally meant for storing music so positions on the disc are stored in
//! "minute:second:frame" format, where frame means sector.
//!
//! There are 75 frames/sectors in a second, 60 seconds in a minute. All three components are
//! stored as BCD in the header of every raw CD-ROM sector.

use std::fmt;

use crate::bcd::Bcd;

/// Number of sectors in the two second pregap of track 01. LBA 0 is found at MSF 00:02:00.
pub const LBA_OFFSET: u32 = 150;

/// CD "minute:second:frame" timestamp, given as triplet of *BCD* encoded bytes. In this context
/// "frame" is synonymous with "sector".
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Msf(Bcd, Bcd, Bcd);

impl Msf {
    /// MSF for 00:00:00
    pub const ZERO: Msf = Msf(Bcd::ZERO, Bcd::ZERO, Bcd::ZERO);

    /// MSF for 99:59:74
    pub const MAX: Msf = Msf(Bcd::TABLE[99], Bcd::TABLE[59], Bcd::TABLE[74]);

    /// Build an MSF from a BCD triplet. Returns `None` if `s` is greater than 0x59 or if `f` is
    /// greater than 0x74.
    pub const fn new(m: Bcd, s: Bcd, f: Bcd) -> Option<Msf> {
        if s.bcd() < 0x60 && f.bcd() < 0x75 {
            Some(Msf(m, s, f))
        } else {
            None
        }
    }

    /// Convenience function to build an MSF from BCD values stored in an `u8`. Returns none if one
    /// of the values is not valid BCD or if it's not a valid Msf
    pub const fn from_bcd(m: u8, s: u8, f: u8) -> Option<Msf> {
        let m = match Bcd::from_bcd(m) {
            Some(b) => b,
            None => return None,
        };

        let s = match Bcd::from_bcd(s) {
            Some(b) => b,
            None => return None,
        };

        let f = match Bcd::from_bcd(f) {
            Some(b) => b,
            None => return None,
        };

        Msf::new(m, s, f)
    }

    /// Return the three raw BCD bytes, in the order they appear in a sector header
    pub const fn to_bytes(self) -> [u8; 3] {
        [self.0.bcd(), self.1.bcd(), self.2.bcd()]
    }

    /// Convert an MSF into a sector index. In this convention sector index 0 is MSF 00:00:00
    pub const fn sector_index(self) -> u32 {
        let Msf(m, s, f) = self;

        let m = m.binary() as u32;
        let s = s.binary() as u32;
        let f = f.binary() as u32;

        // 60 seconds in a minute, 75 sectors(frames) in a second
        (60 * 75 * m) + (75 * s) + f
    }

    /// Build an MSF from a sector index. Returns None if the index is out of range.
    pub const fn from_sector_index(si: u32) -> Option<Msf> {
        let m = si / (60 * 75);

        if m > 99 {
            return None;
        }

        let si = si % (60 * 75);

        let s = si / 75;
        let f = si % 75;

        let m = Bcd::TABLE[m as usize];
        let s = Bcd::TABLE[s as usize];
        let f = Bcd::TABLE[f as usize];

        Some(Msf(m, s, f))
    }

    /// Logical block address of this MSF, which can be negative within the first two seconds.
    pub const fn lba(self) -> i32 {
        self.sector_index() as i32 - LBA_OFFSET as i32
    }

    /// Build the MSF found in the header of the sector at `lba`
    pub const fn from_lba(lba: u32) -> Option<Msf> {
        match lba.checked_add(LBA_OFFSET) {
            Some(si) => Msf::from_sector_index(si),
            None => None,
        }
    }

    /// Return the MSF timestamp of the next sector. Returns `None` if the MSF is 99:59:74.
    pub fn next(self) -> Option<Msf> {
        Msf::from_sector_index(self.sector_index() + 1)
    }
}

impl fmt::Display for Msf {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        let Msf(m, s, f) = *self;

        write!(fmt, "{}:{}:{}", m, s, f)
    }
}

impl fmt::Debug for Msf {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}", self)
    }
}

#[cfg(test)]
mod test {
    use super::Msf;

    #[test]
    fn conversions() {
        for &(m, s, f) in &[
            (0x00, 0x00, 0x00),
            (0x01, 0x00, 0x00),
            (0x00, 0x01, 0x00),
            (0x00, 0x00, 0x01),
            (0x12, 0x34, 0x56),
            (0x99, 0x59, 0x74),
        ] {
            let m = Msf::from_bcd(m, s, f).unwrap();

            assert!(m == Msf::from_sector_index(m.sector_index()).unwrap());
        }

        assert!(Msf::from_bcd(0x00, 0x60, 0x00).is_none());
        assert!(Msf::from_bcd(0x00, 0x00, 0x75).is_none());
        assert!(Msf::from_bcd(0x0a, 0x00, 0x00).is_none());
    }

    #[test]
    fn lba() {
        let msf = Msf::from_lba(0).unwrap();

        assert_eq!(msf.to_bytes(), [0x00, 0x02, 0x00]);
        assert_eq!(msf.lba(), 0);

        let msf = Msf::from_bcd(0x00, 0x00, 0x10).unwrap();
        assert_eq!(msf.lba(), -140);

        let msf = Msf::from_lba(4500 * 3 + 75 * 7 + 9 - 150).unwrap();
        assert_eq!(msf.to_bytes(), [0x03, 0x07, 0x09]);

        assert!(Msf::MAX.next().is_none());
        assert_eq!(Msf::ZERO.next().unwrap().to_bytes(), [0x00, 0x00, 0x01]);
    }
}
