//! Sector layout identification.
//!
//! The layout of an image is almost never declared so it has to be guessed from the data itself.
//! Layouts are tried from the most to the least structured:
//!
//! * 2448 and 2352: look for the sync pattern in the first two sectors, then make sure it recurs
//!   at the same stride for the following 3 sectors.
//! * 2336: no sync pattern, look for two XA ADPCM audio sectors whose sound parameters are
//!   perfectly consistent.
//! * 2048: anything else.

use crate::byte_source::ByteSource;
use crate::sector::header::SYNC_PATTERN;
use crate::sector::xa::{self, XaSubHeader, SUBHEADER_SIZE};
use crate::sector::{ImageLayout, SectorLayout, XaForm};
use crate::{CdError, CdResult};

/// Images smaller than this can't be identified at all
pub const MIN_IDENTIFIABLE_SIZE: u64 = 2048;

/// Number of sectors following a sync hit that must also start with the sync pattern
const SYNC_CONFIRMATIONS: u64 = 3;

/// Number of sectors scanned for a first XA audio sector in 2336 images
const XA_SCAN_SECTORS: u64 = 32;

/// Distances (in sectors) at which a second XA audio sector is looked for
const XA_CONFIRMATION_STRIDES: [u64; 5] = [2, 4, 8, 16, 32];

/// Figure out the sector layout of `source`. Fails if the source is too small to contain even a
/// single 2048 byte sector, otherwise falls back to 2048 if nothing else matched.
pub fn identify(source: &mut ByteSource) -> CdResult<ImageLayout> {
    let len = source.len();

    if len < MIN_IDENTIFIABLE_SIZE {
        return Err(CdError::FileTooSmall {
            path: source.path().map(|p| p.to_path_buf()).unwrap_or_default(),
            len,
        });
    }

    for layout in [SectorLayout::Sub2448, SectorLayout::Raw2352] {
        if let Some(offset) = find_sync(source, layout.raw_size() as u64)? {
            log::debug!("Sync pattern found at {} with a {} stride", offset, layout);
            return Ok(ImageLayout {
                layout,
                first_sector_offset: offset,
            });
        }
    }

    if let Some(offset) = find_xa_audio(source)? {
        log::debug!("XA audio found at {} with a 2336 stride", offset);
        return Ok(ImageLayout {
            layout: SectorLayout::Sub2336,
            first_sector_offset: offset,
        });
    }

    match source.path() {
        Some(path) => log::warn!(
            "{}: couldn't identify the sector layout, assuming 2048",
            path.display()
        ),
        None => log::warn!("Couldn't identify the sector layout, assuming 2048"),
    }

    Ok(ImageLayout::FALLBACK)
}

/// Returns true if the sync pattern is found at `position`
fn sync_at(source: &mut ByteSource, position: u64) -> CdResult<bool> {
    let bytes = source.read_range(position, SYNC_PATTERN.len())?;

    Ok(bytes == SYNC_PATTERN)
}

/// Look for sectors of `stride` bytes starting with the sync pattern, returns the offset of the
/// first one
fn find_sync(source: &mut ByteSource, stride: u64) -> CdResult<Option<u32>> {
    let len = source.len();
    let sync_len = SYNC_PATTERN.len() as u64;

    let scan_end = (2 * stride).min(len.saturating_sub(sync_len - 1));

    if scan_end == 0 {
        return Ok(None);
    }

    let scan = source
        .read_range(0, (scan_end + sync_len - 1) as usize)?
        .to_vec();

    for offset in 0..scan_end {
        let o = offset as usize;

        if scan[o..o + SYNC_PATTERN.len()] != SYNC_PATTERN {
            continue;
        }

        let last = offset + SYNC_CONFIRMATIONS * stride;

        if last + sync_len > len {
            // Not enough sectors left to tell
            continue;
        }

        let mut confirmed = true;

        for n in 1..=SYNC_CONFIRMATIONS {
            if !sync_at(source, offset + n * stride)? {
                confirmed = false;
                break;
            }
        }

        if confirmed {
            return Ok(Some((offset % stride) as u32));
        }
    }

    Ok(None)
}

/// Returns true if a 2336 byte sector at `position` is XA audio with perfectly consistent sound
/// parameters
fn xa_audio_at(source: &mut ByteSource, position: u64) -> CdResult<bool> {
    let size = SectorLayout::Sub2336.raw_size();
    let raw = source.read_range(position, size)?;

    let subheader = XaSubHeader::parse(array_ref![raw, 0, SUBHEADER_SIZE]);
    let user_data = &raw[SUBHEADER_SIZE..SUBHEADER_SIZE + XaForm::Form2.user_data_size()];

    Ok(xa::xa_audio_confidence(&subheader, user_data) == Some(100))
}

/// Look for two perfect XA audio sectors at a 2336 byte stride, returns the offset of the first
/// sector
fn find_xa_audio(source: &mut ByteSource) -> CdResult<Option<u32>> {
    let len = source.len();
    let stride = SectorLayout::Sub2336.raw_size() as u64;

    for offset in (0..XA_SCAN_SECTORS * stride).step_by(4) {
        if offset + stride > len {
            break;
        }

        if !xa_audio_at(source, offset)? {
            continue;
        }

        for n in XA_CONFIRMATION_STRIDES {
            let position = offset + n * stride;

            if position + stride > len {
                break;
            }

            if xa_audio_at(source, position)? {
                return Ok(Some((offset % stride) as u32));
            }
        }
    }

    Ok(None)
}
