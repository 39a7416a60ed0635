//! RIFF/CDXA container header, used by some tools to wrap raw 2352 byte sector dumps of XA
//! files.

use std::io::{self, Write};

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};

use crate::sector::RAW_SECTOR_SIZE;
use crate::{CdError, CdResult};

/// Size of the complete header preceding the sector data
pub const RIFF_HEADER_SIZE: usize = 44;

/// Attributes stored in the "fmt " chunk: Mode 2 Form 1/2 with interleaving, readable by everybody
const XA_ATTRIBUTES: u16 = 0x5511;

/// Build the header for `payload_len` bytes of raw sectors. The length must be a whole number of
/// 2352 byte sectors and the resulting RIFF size must fit in 32 bits.
pub fn cdxa_header(payload_len: u64) -> CdResult<[u8; RIFF_HEADER_SIZE]> {
    let riff_size = payload_len + (RIFF_HEADER_SIZE - 8) as u64;

    if payload_len % RAW_SECTOR_SIZE as u64 != 0 || riff_size > u64::from(u32::MAX) {
        return Err(CdError::BadRiffPayload(payload_len));
    }

    let mut header = [0u8; RIFF_HEADER_SIZE];

    write_fields(&mut &mut header[..], riff_size as u32, payload_len as u32)?;

    Ok(header)
}

fn write_fields<W: Write>(w: &mut W, riff_size: u32, data_size: u32) -> io::Result<()> {
    w.write_all(b"RIFF")?;
    w.write_u32::<LittleEndian>(riff_size)?;
    w.write_all(b"CDXA")?;

    w.write_all(b"fmt ")?;
    w.write_u32::<LittleEndian>(16)?;
    // Owner and group IDs
    w.write_u16::<LittleEndian>(0)?;
    w.write_u16::<LittleEndian>(0)?;
    w.write_u16::<LittleEndian>(XA_ATTRIBUTES)?;
    w.write_all(b"XA")?;
    // File number
    w.write_u8(1)?;
    w.write_all(&[0; 7])?;

    w.write_all(b"data")?;
    w.write_u32::<LittleEndian>(data_size)
}

/// Write the header for `payload_len` bytes of raw sectors to `writer`
pub fn write_cdxa_header<W: Write>(writer: &mut W, payload_len: u64) -> CdResult<()> {
    let header = cdxa_header(payload_len)?;

    writer.write_all(&header)?;

    Ok(())
}

/// Returns true if `bytes` starts with a RIFF/CDXA header
pub fn is_cdxa_header(bytes: &[u8]) -> bool {
    bytes.len() >= RIFF_HEADER_SIZE
        && &bytes[0..4] == b"RIFF"
        && &bytes[8..16] == b"CDXAfmt "
        && &bytes[36..40] == b"data"
}

/// Length of the sector data announced by a RIFF/CDXA header
pub fn cdxa_payload_len(bytes: &[u8]) -> Option<u32> {
    if is_cdxa_header(bytes) {
        Some(LittleEndian::read_u32(&bytes[40..44]))
    } else {
        None
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn header_layout() {
        let h = cdxa_header(10 * 2352).unwrap();

        assert_eq!(&h[0..4], b"RIFF");
        assert_eq!(LittleEndian::read_u32(&h[4..8]), 10 * 2352 + 36);
        assert_eq!(&h[8..16], b"CDXAfmt ");
        assert_eq!(LittleEndian::read_u32(&h[16..20]), 16);
        assert_eq!(&h[20..24], &[0, 0, 0, 0]);
        assert_eq!(&h[24..28], &[0x11, 0x55, b'X', b'A']);
        assert_eq!(h[28], 1);
        assert_eq!(&h[29..36], &[0; 7]);
        assert!(is_cdxa_header(&h));
        assert_eq!(cdxa_payload_len(&h), Some(10 * 2352));
    }

    #[test]
    fn bad_payloads() {
        assert!(matches!(
            cdxa_header(2048),
            Err(CdError::BadRiffPayload(2048))
        ));

        let too_big = (u64::from(u32::MAX) / 2352 + 1) * 2352;
        assert!(cdxa_header(too_big).is_err());

        let mut out = Vec::new();
        assert!(write_cdxa_header(&mut out, 100).is_err());
        assert!(out.is_empty());

        write_cdxa_header(&mut out, 0).unwrap();
        assert_eq!(out.len(), RIFF_HEADER_SIZE);
        assert!(!is_cdxa_header(&out[1..]));
    }
}
