//! Batched modifications of the user data of an image.
//!
//! Patches are staged in a temporary file as they're added, then applied sector by sector so that
//! the error correction codes of each sector are rebuilt only once whatever the number of patches
//! touching it.

use std::collections::BTreeMap;
use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use tempfile::NamedTempFile;

use crate::sector::SectorLayout;
use crate::store::SectorStore;
use crate::{CdError, CdResult};

/// A single patch, its data lives in the staging file
#[derive(Copy, Clone, Debug)]
struct PatchEntry {
    /// Position of the replacement bytes in the staging file
    staged_at: u64,
    len: usize,
}

/// Progress information for callbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchProgress {
    /// About to patch this many sectors.
    Starting {
        /// Number of distinct sectors patched
        sectors: usize,
    },
    /// A sector has been written.
    Sector {
        /// Index of the sector in the image
        index: u32,
        /// Sectors written so far, this one included
        done: usize,
        /// Number of sectors to write
        total: usize,
    },
    /// Every sector has been written.
    Done,
}

/// A set of non-overlapping patches to the user data of an image
pub struct PatchSet {
    staging: NamedTempFile,
    staged_len: u64,
    /// Entries keyed by (sector, offset in the user data)
    entries: BTreeMap<(u32, usize), PatchEntry>,
}

impl PatchSet {
    /// Create an empty set, backed by a new staging file
    pub fn new() -> CdResult<PatchSet> {
        let staging = NamedTempFile::new()?;

        Ok(PatchSet {
            staging,
            staged_len: 0,
            entries: BTreeMap::new(),
        })
    }

    /// Number of patches in the set
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no patch has been added
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct sectors patched
    pub fn sector_count(&self) -> usize {
        let mut sectors: Vec<u32> = self.entries.keys().map(|&(s, _)| s).collect();

        sectors.dedup();
        sectors.len()
    }

    /// Number of bytes held in the staging file
    pub fn staged_len(&self) -> u64 {
        self.staged_len
    }

    /// Returns true if `[offset, offset + len)` overlaps a patch already added to `sector`
    fn overlaps(&self, sector: u32, offset: usize, len: usize) -> bool {
        let before = self
            .entries
            .range(..=(sector, offset))
            .next_back()
            .filter(|(&(s, o), e)| s == sector && o + e.len > offset);

        let after = self
            .entries
            .range((sector, offset)..)
            .next()
            .filter(|(&(s, o), _)| s == sector && o < offset + len);

        before.is_some() || after.is_some()
    }

    /// Replace `data.len()` bytes of the user data of `sector` starting at `offset`. Patches to the
    /// same sector may not overlap. Empty patches are ignored.
    pub fn add_patch(&mut self, sector: u32, offset: usize, data: &[u8]) -> CdResult<()> {
        let len = data.len();

        if offset
            .checked_add(len)
            .map_or(true, |end| end > SectorLayout::MAX_RAW_SIZE)
        {
            return Err(CdError::PatchOutOfRange { offset, len });
        }

        if len == 0 {
            return Ok(());
        }

        if self.overlaps(sector, offset, len) {
            return Err(CdError::OverlappingPatch {
                sector,
                offset,
                len,
            });
        }

        let staged_at = self.staged_len;
        let path = self.staging.path().to_path_buf();
        let file = self.staging.as_file_mut();

        file.seek(SeekFrom::Start(staged_at))
            .and_then(|_| file.write_all(data))
            .map_err(|e| CdError::Write { path, source: e })?;

        self.staged_len += len as u64;
        self.entries
            .insert((sector, offset), PatchEntry { staged_at, len });

        Ok(())
    }

    fn read_staged(&mut self, entry: &PatchEntry, out: &mut [u8]) -> CdResult<()> {
        let file = self.staging.as_file_mut();

        file.seek(SeekFrom::Start(entry.staged_at))
            .and_then(|_| file.read_exact(out))
            .map_err(CdError::StagingRead)
    }

    /// Apply every patch to `store`, writing each patched sector exactly once in increasing order.
    ///
    /// `cancel` is checked before each sector. On error the sectors written so far are not
    /// restored. The staging file is deleted in every case.
    pub fn apply(
        mut self,
        store: &mut SectorStore,
        cancel: &AtomicBool,
        progress: &dyn Fn(PatchProgress),
    ) -> CdResult<()> {
        let total = self.sector_count();

        progress(PatchProgress::Starting { sectors: total });

        let last = match self.entries.keys().next_back() {
            Some(&(sector, _)) => sector,
            None => {
                progress(PatchProgress::Done);
                return Ok(());
            }
        };

        if last >= store.sector_count() {
            return Err(CdError::OutOfBounds {
                index: u64::from(last),
                count: store.sector_count(),
            });
        }

        log::info!(
            "Applying {} patches to {} sectors",
            self.entries.len(),
            total
        );

        store.reopen_for_writing()?;

        let entries: Vec<((u32, usize), PatchEntry)> =
            self.entries.iter().map(|(&k, &e)| (k, e)).collect();

        let mut done = 0;

        for group in entries.chunk_by(|(a, _), (b, _)| a.0 == b.0) {
            let ((index, _), _) = group[0];

            if cancel.load(Ordering::Relaxed) {
                log::info!("Patching canceled after {} sectors", done);
                return Err(CdError::Canceled);
            }

            let sector = store.sector(index)?;
            let mut data = sector.user_data_copy();

            for &((_, offset), entry) in group {
                let end = offset + entry.len;

                if end > data.len() {
                    return Err(CdError::PatchOutOfRange {
                        offset,
                        len: entry.len,
                    });
                }

                self.read_staged(&entry, &mut data[offset..end])?;
            }

            store.write_sector(index, &data)?;

            done += 1;
            log::debug!("Patched sector {} ({} patches)", index, group.len());

            progress(PatchProgress::Sector { index, done, total });
        }

        log::info!("Patched {} sectors", done);
        progress(PatchProgress::Done);

        Ok(())
    }
}
