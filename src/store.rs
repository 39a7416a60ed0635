//! A disc image seen as a sequence of sectors of a single layout

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::byte_source::ByteSource;
use crate::detect;
use crate::sector::{ImageLayout, Sector, SectorLayout};
use crate::{CdError, CdResult};

/// Sector access to a disc image
pub struct SectorStore {
    source: ByteSource,
    layout: ImageLayout,
    sector_count: u32,
}

impl SectorStore {
    /// Bind `layout` to `source`. Trailing bytes that don't make up a complete sector are ignored.
    ///
    /// `layout` is expected to be valid (see `ImageLayout::validate`), which is always the case
    /// for identified layouts.
    pub fn new(source: ByteSource, layout: ImageLayout) -> SectorStore {
        let sector_count = layout.sector_count(source.len()).min(u64::from(u32::MAX)) as u32;

        SectorStore {
            source,
            layout,
            sector_count,
        }
    }

    /// Open the file at `path` and identify its layout
    pub fn open(path: &Path) -> CdResult<SectorStore> {
        let mut source = ByteSource::open(path)?;
        let layout = detect::identify(&mut source)?;

        Ok(SectorStore::new(source, layout))
    }

    /// Reopen the image described by `descriptor`, making sure that it hasn't changed since the
    /// descriptor was created
    pub fn from_descriptor(descriptor: &DiscDescriptor) -> CdResult<SectorStore> {
        descriptor.image_layout().validate()?;

        let source = ByteSource::open(&descriptor.path)?;
        let store = SectorStore::new(source, descriptor.image_layout());

        if store.sector_count != descriptor.sector_count {
            return Err(CdError::BadDescriptor {
                descriptor: descriptor.to_string(),
                desc: format!(
                    "the image now has {} sectors instead of {}",
                    store.sector_count, descriptor.sector_count
                ),
            });
        }

        Ok(store)
    }

    /// Describe this store so that it can be reopened without identifying the layout again.
    /// Returns `None` for images that aren't backed by a file.
    pub fn descriptor(&self) -> Option<DiscDescriptor> {
        if self.source.is_memory() {
            return None;
        }

        let path = self.source.path()?;

        Some(DiscDescriptor {
            path: path.to_path_buf(),
            layout: self.layout.layout,
            sector_count: self.sector_count,
            first_sector_offset: self.layout.first_sector_offset,
        })
    }

    /// Read and decode sector `index`
    pub fn sector(&mut self, index: u32) -> CdResult<Sector> {
        if index >= self.sector_count {
            return Err(CdError::OutOfBounds {
                index: u64::from(index),
                count: self.sector_count,
            });
        }

        let size = self.layout.layout.raw_size();
        let raw = self
            .source
            .read_range(self.layout.sector_offset(index), size)?;

        Sector::parse(self.layout.layout, index, raw)
    }

    /// Iterate over the sectors starting at `start`
    pub fn sectors(&mut self, start: u32) -> Sectors<'_> {
        Sectors {
            store: self,
            next: start,
        }
    }

    /// Number of complete sectors in the image
    pub fn sector_count(&self) -> u32 {
        self.sector_count
    }

    /// Layout and position of the sectors
    pub fn image_layout(&self) -> ImageLayout {
        self.layout
    }

    /// Size of a sector in the image
    pub fn raw_sector_size(&self) -> usize {
        self.layout.layout.raw_size()
    }

    /// Returns true if the sectors carry a sync header or an XA sub-header
    pub fn has_sector_header(&self) -> bool {
        self.layout.layout.has_sector_header()
    }

    /// Human readable description of the image layout
    pub fn type_description(&self) -> String {
        let mut desc = format!("{} byte sectors", self.layout.layout.raw_size());

        if self.layout.first_sector_offset != 0 {
            desc.push_str(&format!(
                " starting at offset {}",
                self.layout.first_sector_offset
            ));
        }

        desc
    }

    /// Path of the image, if it's backed by a file
    pub fn source_path(&self) -> Option<&Path> {
        self.source.path()
    }

    /// Read `sectors` sectors at a time when the read window has to move. Has no effect on the
    /// data returned.
    pub fn set_buffer_size(&mut self, sectors: u32) {
        self.source
            .set_chunk_size(sectors.max(1) as usize * self.raw_sector_size());
    }

    /// Reopen the underlying file for writing. Does nothing if it's already writable.
    pub fn reopen_for_writing(&mut self) -> CdResult<()> {
        self.source.reopen_for_writing()
    }

    /// Replace the user data of sector `index`, regenerating its error correction codes. The image
    /// is reopened for writing if needed.
    pub fn write_sector(&mut self, index: u32, user_data: &[u8]) -> CdResult<()> {
        let sector = self.sector(index)?;

        if user_data.len() != sector.user_data_size() {
            return Err(CdError::SizeMismatch {
                expected: sector.user_data_size(),
                actual: user_data.len(),
            });
        }

        let raw = sector.rebuild_raw(user_data)?;

        self.source.reopen_for_writing()?;
        self.source
            .write_at(self.layout.sector_offset(index), &raw)
    }
}

impl fmt::Debug for SectorStore {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SectorStore")
            .field("path", &self.source.path())
            .field("layout", &self.layout)
            .field("sector_count", &self.sector_count)
            .finish()
    }
}

/// Sequential iterator over the sectors of a `SectorStore`
pub struct Sectors<'a> {
    store: &'a mut SectorStore,
    next: u32,
}

impl<'a> Iterator for Sectors<'a> {
    type Item = CdResult<Sector>;

    fn next(&mut self) -> Option<CdResult<Sector>> {
        if self.next >= self.store.sector_count() {
            return None;
        }

        let sector = self.store.sector(self.next);
        self.next += 1;

        Some(sector)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.store.sector_count().saturating_sub(self.next) as usize;

        (n, Some(n))
    }
}

/// Everything needed to reopen an image without identifying its layout again. Its text form is
/// `Filename:<path>|Sector size:<n>|Sector count:<n>|First sector offset:<n>`.
#[derive(Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiscDescriptor {
    /// Path of the image
    pub path: PathBuf,
    /// Sector layout
    pub layout: SectorLayout,
    /// Number of complete sectors in the image
    pub sector_count: u32,
    /// Offset of the first sector in the image
    pub first_sector_offset: u32,
}

impl DiscDescriptor {
    /// Layout and position of the sectors
    pub fn image_layout(&self) -> ImageLayout {
        ImageLayout {
            layout: self.layout,
            first_sector_offset: self.first_sector_offset,
        }
    }

    /// Reopen the image, see `SectorStore::from_descriptor`
    pub fn open(&self) -> CdResult<SectorStore> {
        SectorStore::from_descriptor(self)
    }
}

impl fmt::Display for DiscDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Filename:{}|Sector size:{}|Sector count:{}|First sector offset:{}",
            self.path.display(),
            self.layout.raw_size(),
            self.sector_count,
            self.first_sector_offset
        )
    }
}

impl FromStr for DiscDescriptor {
    type Err = CdError;

    fn from_str(s: &str) -> CdResult<DiscDescriptor> {
        let bad = |desc: &str| CdError::BadDescriptor {
            descriptor: s.to_string(),
            desc: desc.to_string(),
        };

        // The path may contain '|', split from the end
        let mut fields = s.rsplitn(4, '|');

        let mut next_field = |name: &str| {
            named_field(fields.next(), name)
                .ok_or_else(|| bad(&format!("missing `{}` field", name)))
        };

        let offset = next_field("First sector offset")?;
        let count = next_field("Sector count")?;
        let size = next_field("Sector size")?;
        let path = next_field("Filename")?;

        if path.is_empty() {
            return Err(bad("empty filename"));
        }

        let size: usize = size.parse().map_err(|_| bad("invalid sector size"))?;
        let layout = SectorLayout::from_raw_size(size).ok_or_else(|| bad("unknown sector size"))?;
        let sector_count = count.parse().map_err(|_| bad("invalid sector count"))?;
        let first_sector_offset: u32 = offset
            .parse()
            .map_err(|_| bad("invalid first sector offset"))?;

        if first_sector_offset as usize >= size {
            return Err(bad("first sector offset larger than a sector"));
        }

        Ok(DiscDescriptor {
            path: PathBuf::from(path),
            layout,
            sector_count,
            first_sector_offset,
        })
    }
}

/// Value of a `<name>:<value>` field
fn named_field<'a>(field: Option<&'a str>, name: &str) -> Option<&'a str> {
    field?.strip_prefix(name)?.strip_prefix(':')
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sector::test::mode2_sector;
    use crate::sector::SectorKind;
    use std::io::Write;

    fn raw_file(sectors: u32) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();

        for lba in 0..sectors {
            file.write_all(&mode2_sector(lba, 0x08, lba as u8)).unwrap();
        }

        file.flush().unwrap();
        file
    }

    #[test]
    fn descriptor_text() {
        let d = DiscDescriptor {
            path: PathBuf::from("/tmp/a|b.bin"),
            layout: SectorLayout::Raw2352,
            sector_count: 10,
            first_sector_offset: 44,
        };

        let s = d.to_string();
        assert_eq!(
            s,
            "Filename:/tmp/a|b.bin|Sector size:2352|Sector count:10|First sector offset:44"
        );
        assert_eq!(s.parse::<DiscDescriptor>().unwrap(), d);

        for bad in [
            "",
            "Filename:x|Sector size:2000|Sector count:1|First sector offset:0",
            "Filename:x|Sector size:2048|Sector count:-1|First sector offset:0",
            "Filename:x|Sector size:2048|Sector count:1|First sector offset:2048",
            "Filename:|Sector size:2048|Sector count:1|First sector offset:0",
            "Sector size:2048|Sector count:1|First sector offset:0",
        ] {
            assert!(matches!(
                bad.parse::<DiscDescriptor>(),
                Err(CdError::BadDescriptor { .. })
            ));
        }
    }

    #[test]
    fn descriptor_round_trip() {
        let file = raw_file(10);
        let store = SectorStore::open(file.path()).unwrap();

        assert_eq!(store.sector_count(), 10);
        assert_eq!(store.raw_sector_size(), 2352);

        let text = store.descriptor().unwrap().to_string();
        let reopened = text.parse::<DiscDescriptor>().unwrap().open().unwrap();

        assert_eq!(reopened.image_layout(), store.image_layout());
        assert_eq!(reopened.sector_count(), 10);
        assert_eq!(reopened.source_path(), Some(file.path()));

        file.as_file().set_len(9 * 2352).unwrap();

        let res = text.parse::<DiscDescriptor>().unwrap().open();
        assert!(matches!(res, Err(CdError::BadDescriptor { .. })));

        // Built by hand, the text form would have rejected it
        let descriptor = DiscDescriptor {
            path: file.path().to_path_buf(),
            layout: SectorLayout::Raw2352,
            sector_count: 8,
            first_sector_offset: 2352,
        };
        assert!(matches!(
            descriptor.open(),
            Err(CdError::BadLayout {
                offset: 2352,
                size: 2352
            })
        ));
    }

    #[test]
    fn sector_access() {
        let file = raw_file(6);
        let mut store = SectorStore::open(file.path()).unwrap();

        store.set_buffer_size(2);

        assert!(store.has_sector_header());
        assert_eq!(store.type_description(), "2352 byte sectors");

        let sectors: Vec<_> = store.sectors(2).collect::<CdResult<_>>().unwrap();
        assert_eq!(sectors.len(), 4);

        for (n, s) in sectors.iter().enumerate() {
            assert_eq!(s.index(), n as u32 + 2);
            assert_eq!(s.header_sector_number(), Some(n as i32 + 2));
            assert_eq!(s.kind(), SectorKind::Mode2Form1);
        }

        assert!(matches!(
            store.sector(6),
            Err(CdError::OutOfBounds { index: 6, count: 6 })
        ));
    }

    #[test]
    fn write_sector() {
        let file = raw_file(4);
        let mut store = SectorStore::open(file.path()).unwrap();

        assert!(matches!(
            store.write_sector(1, &[0; 2047]),
            Err(CdError::SizeMismatch {
                expected: 2048,
                actual: 2047
            })
        ));

        store.write_sector(1, &[0xee; 2048]).unwrap();

        let s = store.sector(1).unwrap();
        assert_eq!(s.user_data(), &[0xee; 2048][..]);
        assert_eq!(s.verify_edc(), Some(true));
        assert_eq!(s.header_sector_number(), Some(1));

        // Neighbours are untouched
        assert_eq!(store.sector(2).unwrap().raw(), &mode2_sector(2, 0x08, 2)[..]);

        let mut memory = SectorStore::new(
            ByteSource::from_memory(vec![0; 4096]).unwrap(),
            ImageLayout::FALLBACK,
        );
        assert!(memory.descriptor().is_none());
        assert!(matches!(
            memory.write_sector(0, &[0; 2048]),
            Err(CdError::Unsupported(_))
        ));
    }
}
