//! The CD format stores its timecodes (minute, second and frame of the sector header) as binary
//! coded decimal (BCD), probably in order to make it easier to display them on the first CD
//! players. A corrupted header byte is therefore often detectable: any nibble above 9 is invalid.

use std::fmt;

/// A single packed BCD value in the range 0-99 (2 digits, 4bits per digit).
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bcd(u8);

impl Bcd {
    /// BCD for 0
    pub const ZERO: Bcd = Bcd(0);

    /// BCD for 99
    pub const MAX: Bcd = Bcd(0x99);

    /// Lookup table from binary value to BCD, indexed from 0 to 99
    pub const TABLE: [Bcd; 100] = {
        let mut table = [Bcd(0); 100];
        let mut i = 0;

        while i < 100 {
            table[i] = Bcd((((i / 10) << 4) | (i % 10)) as u8);
            i += 1;
        }

        table
    };

    /// Returns true if both nibbles of `b` are valid decimal digits
    pub const fn is_valid(b: u8) -> bool {
        (b >> 4) <= 9 && (b & 0xf) <= 9
    }

    /// Build a `Bcd` from an `u8` in BCD format. Returns `None` if the value provided is not valid
    /// BCD.
    pub const fn from_bcd(b: u8) -> Option<Bcd> {
        if Bcd::is_valid(b) {
            Some(Bcd(b))
        } else {
            None
        }
    }

    /// Build a `Bcd` from a binary `u8`. Returns `None` if the value is greater than 99.
    pub const fn from_binary(b: u8) -> Option<Bcd> {
        if b > 99 {
            None
        } else {
            Some(Bcd::TABLE[b as usize])
        }
    }

    /// Returns the BCD as an u8
    pub const fn bcd(self) -> u8 {
        self.0
    }

    /// Convert the BCD as a binary byte
    pub const fn binary(self) -> u8 {
        let b = self.0;

        (b >> 4) * 10 + (b & 0xf)
    }
}

impl fmt::Display for Bcd {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:02x}", self.0)
    }
}

impl fmt::Debug for Bcd {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}

#[test]
fn conversions() {
    assert!(Bcd::from_bcd(0) == Some(Bcd(0)));
    assert!(Bcd::from_bcd(1) == Some(Bcd(1)));
    assert!(Bcd::from_bcd(0x42) == Some(Bcd(0x42)));
    assert!(Bcd::from_bcd(0x1a) == None);
    assert!(Bcd::from_bcd(0xf2) == None);
    assert!(Bcd::from_bcd(0xa0) == None);

    assert!(Bcd::from_binary(0) == Some(Bcd(0)));
    assert!(Bcd::from_binary(1) == Some(Bcd(1)));
    assert!(Bcd::from_binary(42) == Some(Bcd(0x42)));
    assert!(Bcd::from_binary(100) == None);
    assert!(Bcd::from_binary(0xff) == None);

    for b in 0..100 {
        assert_eq!(Bcd::TABLE[b as usize].binary(), b);
    }
}
