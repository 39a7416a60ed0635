//! Storage backing a disc image: either a complete in-memory image or a file read through a
//! single demand-loaded window.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::{CdError, CdResult};

/// Images must be addressable as a whole with a signed 32bit offset
pub const MAX_SOURCE_LENGTH: u64 = i32::MAX as u64;

/// Default size of the file window
pub const DEFAULT_CHUNK_SIZE: usize = 16 * 2352;

/// Extensions of the archive entries that make up a zipped image
pub const ZIP_IMAGE_EXTENSIONS: [&str; 6] = ["iso", "bin", "img", "mdf", "str", "xa"];

/// Portion of a file currently held in memory
struct Window {
    /// Offset of `data[0]` in the file
    offset: u64,
    data: Vec<u8>,
}

impl Window {
    fn empty() -> Window {
        Window {
            offset: 0,
            data: Vec::new(),
        }
    }

    fn covers(&self, position: u64, size: usize) -> bool {
        position >= self.offset && position + size as u64 <= self.offset + self.data.len() as u64
    }
}

enum Storage {
    /// The whole image is in memory
    Memory(Vec<u8>),
    /// The image is read from `file` on demand
    File {
        file: File,
        window: Window,
        writable: bool,
    },
}

/// A fixed-length byte range, either memory-resident or backed by a seekable file
pub struct ByteSource {
    /// Path of the file (or archive) the bytes come from, if any
    path: Option<PathBuf>,
    /// Length of the source, never changes
    len: u64,
    storage: Storage,
    /// Minimum number of bytes loaded when the window has to move
    chunk_size: usize,
}

impl ByteSource {
    /// Open a file. Nothing is read until the first access.
    pub fn open(path: &Path) -> CdResult<ByteSource> {
        let file = File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => CdError::FileNotFound(path.to_path_buf()),
            _ => CdError::Read {
                path: path.to_path_buf(),
                source: e,
            },
        })?;

        let len = file
            .metadata()
            .map_err(|e| CdError::Read {
                path: path.to_path_buf(),
                source: e,
            })?
            .len();

        check_length(Some(path), len)?;

        Ok(ByteSource {
            path: Some(path.to_path_buf()),
            len,
            storage: Storage::File {
                file,
                window: Window::empty(),
                writable: false,
            },
            chunk_size: DEFAULT_CHUNK_SIZE,
        })
    }

    /// Wrap a complete image already loaded in memory. Fails if it's larger than
    /// `MAX_SOURCE_LENGTH`.
    pub fn from_memory(bytes: Vec<u8>) -> CdResult<ByteSource> {
        let len = bytes.len() as u64;

        check_length(None, len)?;

        Ok(ByteSource {
            path: None,
            len,
            storage: Storage::Memory(bytes),
            chunk_size: DEFAULT_CHUNK_SIZE,
        })
    }

    /// Load a zip archive as a single image: every entry with a disc image extension is
    /// concatenated, in filename order.
    pub fn open_zip(path: &Path) -> CdResult<ByteSource> {
        let file = File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => CdError::FileNotFound(path.to_path_buf()),
            _ => CdError::Read {
                path: path.to_path_buf(),
                source: e,
            },
        })?;

        let mut archive = zip::ZipArchive::new(file)?;

        let mut names = Vec::new();
        for i in 0..archive.len() {
            let entry = archive.by_index(i)?;

            if !entry.is_dir() && has_image_extension(entry.name()) {
                names.push(entry.name().to_string());
            }
        }

        names.sort();

        let mut bytes = Vec::new();
        for name in &names {
            let mut entry = archive.by_name(name)?;

            check_length(Some(path), bytes.len() as u64 + entry.size())?;

            entry.read_to_end(&mut bytes).map_err(|e| CdError::Read {
                path: path.to_path_buf(),
                source: e,
            })?;

            log::debug!("{}: loaded {} ({} bytes)", path.display(), name, entry.size());
        }

        let mut source = ByteSource::from_memory(bytes)?;
        source.path = Some(path.to_path_buf());

        Ok(source)
    }

    /// Length of the source in bytes
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Returns true if the source has no bytes at all
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Path of the underlying file, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns true if the whole source is in memory
    pub fn is_memory(&self) -> bool {
        matches!(self.storage, Storage::Memory(_))
    }

    /// Returns true if the source has been reopened for writing
    pub fn is_writable(&self) -> bool {
        matches!(self.storage, Storage::File { writable: true, .. })
    }

    /// Set the minimum number of bytes read whenever the window has to move
    pub fn set_chunk_size(&mut self, size: usize) {
        self.chunk_size = size.max(1);
    }

    /// Minimum number of bytes read whenever the window has to move
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    fn read_error(&self, source: io::Error) -> CdError {
        match &self.path {
            Some(path) => CdError::Read {
                path: path.clone(),
                source,
            },
            None => CdError::IoError(source),
        }
    }

    /// Make sure that `[position, position + size)` is in memory and return the offset of
    /// `position` in `buffer()`.
    ///
    /// If the window doesn't cover the range, a single read of `max(chunk_size, size)` bytes
    /// (clamped to the end of the source) replaces it.
    pub fn ensure_buffered(&mut self, position: u64, size: usize) -> CdResult<usize> {
        let end = position.checked_add(size as u64);

        if end.map_or(true, |e| e > self.len) {
            return Err(self.read_error(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "range {}+{} is past the end of the source ({} bytes)",
                    position, size, self.len
                ),
            )));
        }

        let len = self.len;
        let chunk_size = self.chunk_size;

        let (file, window) = match &mut self.storage {
            Storage::Memory(_) => return Ok(position as usize),
            Storage::File { file, window, .. } => (file, window),
        };

        if window.covers(position, size) {
            return Ok((position - window.offset) as usize);
        }

        let to_read = (size.max(chunk_size) as u64).min(len - position) as usize;

        // Drop the old window before loading the new one, a failed read leaves nothing buffered
        *window = Window::empty();

        let mut data = vec![0; to_read];

        let res = file
            .seek(SeekFrom::Start(position))
            .and_then(|_| file.read_exact(&mut data));

        if let Err(e) = res {
            return Err(self.read_error(e));
        }

        if let Storage::File { window, .. } = &mut self.storage {
            *window = Window {
                offset: position,
                data,
            };
        }

        Ok(0)
    }

    /// The bytes currently in memory. Only meaningful at the offset returned by
    /// `ensure_buffered`, and only until the next call that moves the window.
    pub fn buffer(&self) -> &[u8] {
        match &self.storage {
            Storage::Memory(bytes) => bytes,
            Storage::File { window, .. } => &window.data,
        }
    }

    /// Convenience wrapper around `ensure_buffered` returning the requested bytes
    pub fn read_range(&mut self, position: u64, size: usize) -> CdResult<&[u8]> {
        let offset = self.ensure_buffered(position, size)?;

        Ok(&self.buffer()[offset..offset + size])
    }

    /// Drop the window and reopen the file in read-write mode. Memory sources can't be written.
    pub fn reopen_for_writing(&mut self) -> CdResult<()> {
        let path = match (&self.storage, &self.path) {
            (Storage::File { writable: true, .. }, _) => return Ok(()),
            (Storage::File { .. }, Some(path)) => path.clone(),
            _ => return Err(CdError::Unsupported("writing to an in-memory image")),
        };

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| CdError::Reopen {
                path: path.clone(),
                source: e,
            })?;

        self.storage = Storage::File {
            file,
            window: Window::empty(),
            writable: true,
        };

        Ok(())
    }

    /// Write `bytes` at `position`. The source must have been reopened for writing and the write
    /// can't extend the source.
    ///
    /// A failed write may have partially modified the file.
    pub fn write_at(&mut self, position: u64, bytes: &[u8]) -> CdResult<()> {
        let in_bounds = position
            .checked_add(bytes.len() as u64)
            .map_or(false, |e| e <= self.len);

        let path = self.path.clone().unwrap_or_default();

        let file = match &mut self.storage {
            Storage::File {
                file,
                window,
                writable: true,
            } => {
                *window = Window::empty();
                file
            }
            Storage::File { .. } => {
                return Err(CdError::Unsupported(
                    "writing to an image that wasn't reopened for writing",
                ))
            }
            Storage::Memory(_) => return Err(CdError::Unsupported("writing to an in-memory image")),
        };

        if !in_bounds {
            return Err(CdError::Write {
                path,
                source: io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("write at {}+{} would extend the image", position, bytes.len()),
                ),
            });
        }

        file.seek(SeekFrom::Start(position))
            .and_then(|_| file.write_all(bytes))
            .and_then(|_| file.flush())
            .map_err(|e| CdError::Write { path, source: e })
    }
}

/// Make sure that a source of `len` bytes can be addressed
fn check_length(path: Option<&Path>, len: u64) -> CdResult<()> {
    if len > MAX_SOURCE_LENGTH {
        return Err(CdError::FileTooLarge {
            path: path.map(|p| p.to_path_buf()).unwrap_or_default(),
            len,
        });
    }

    Ok(())
}

fn has_image_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| {
            ZIP_IMAGE_EXTENSIONS
                .iter()
                .any(|x| x.eq_ignore_ascii_case(e))
        })
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;

    fn temp_image(len: usize) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();

        file.write_all(&data).unwrap();
        file.flush().unwrap();

        file
    }

    #[test]
    fn file_window() {
        let file = temp_image(10_000);
        let mut source = ByteSource::open(file.path()).unwrap();

        source.set_chunk_size(1000);
        assert_eq!(source.len(), 10_000);

        let off = source.ensure_buffered(500, 10).unwrap();
        assert_eq!(off, 0);
        assert_eq!(source.buffer().len(), 1000);

        // Inside the current window: no reload
        let off = source.ensure_buffered(1200, 100).unwrap();
        assert_eq!(off, 700);
        assert_eq!(source.buffer()[off], (1200 % 251) as u8);

        // Larger than the chunk size
        let off = source.ensure_buffered(3000, 4000).unwrap();
        assert_eq!(off, 0);
        assert_eq!(source.buffer().len(), 4000);

        // Clamped to the end of the file
        source.ensure_buffered(9900, 10).unwrap();
        assert_eq!(source.buffer().len(), 100);

        assert!(source.ensure_buffered(9995, 10).is_err());
    }

    #[test]
    fn memory_source() {
        let mut source = ByteSource::from_memory(vec![1, 2, 3, 4]).unwrap();

        assert!(source.is_memory());
        assert_eq!(source.read_range(1, 2).unwrap(), &[2, 3]);
        assert!(source.read_range(3, 2).is_err());
        assert!(matches!(
            source.reopen_for_writing(),
            Err(CdError::Unsupported(_))
        ));
        assert!(matches!(
            source.write_at(0, &[0]),
            Err(CdError::Unsupported(_))
        ));
    }

    #[test]
    fn missing_file() {
        let res = ByteSource::open(Path::new("/nonexistent/image.bin"));

        assert!(matches!(res, Err(CdError::FileNotFound(_))));
    }

    #[test]
    fn too_large() {
        let file = tempfile::NamedTempFile::new().unwrap();

        // Sparse, nothing is ever read from it
        file.as_file().set_len(MAX_SOURCE_LENGTH + 1).unwrap();

        match ByteSource::open(file.path()) {
            Err(CdError::FileTooLarge { path, len }) => {
                assert_eq!(path, file.path());
                assert_eq!(len, MAX_SOURCE_LENGTH + 1);
            }
            _ => panic!("a file past the length limit was accepted"),
        }

        file.as_file().set_len(MAX_SOURCE_LENGTH).unwrap();
        assert_eq!(
            ByteSource::open(file.path()).unwrap().len(),
            MAX_SOURCE_LENGTH
        );
    }

    #[test]
    fn length_limit() {
        // Shared by files, memory images and the running total of zip entries
        let path = Path::new("images.zip");

        assert!(check_length(Some(path), MAX_SOURCE_LENGTH).is_ok());
        assert!(matches!(
            check_length(Some(path), MAX_SOURCE_LENGTH + 1),
            Err(CdError::FileTooLarge { len, .. }) if len == MAX_SOURCE_LENGTH + 1
        ));
        assert!(matches!(
            check_length(None, u64::MAX),
            Err(CdError::FileTooLarge { .. })
        ));
    }

    #[test]
    fn write_back() {
        let file = temp_image(4096);
        let mut source = ByteSource::open(file.path()).unwrap();

        assert_eq!(source.read_range(100, 1).unwrap(), &[100]);
        assert!(source.write_at(100, &[0xaa]).is_err());

        source.reopen_for_writing().unwrap();
        assert!(source.is_writable());
        source.write_at(100, &[0xaa, 0xbb]).unwrap();

        assert_eq!(source.read_range(99, 4).unwrap(), &[99, 0xaa, 0xbb, 102]);
        assert!(source.write_at(4095, &[0, 0]).is_err());
        assert_eq!(std::fs::metadata(file.path()).unwrap().len(), 4096);
    }

    #[test]
    fn zip_archive() {
        let mut file = tempfile::NamedTempFile::new().unwrap();

        {
            let mut zip = zip::ZipWriter::new(&mut file);
            let options = zip::write::FileOptions::default();

            zip.start_file("disc/track2.BIN", options).unwrap();
            zip.write_all(&[2; 10]).unwrap();
            zip.start_file("readme.txt", options).unwrap();
            zip.write_all(b"not an image").unwrap();
            zip.start_file("disc/track1.bin", options).unwrap();
            zip.write_all(&[1; 5]).unwrap();
            zip.finish().unwrap();
        }

        let mut source = ByteSource::open_zip(file.path()).unwrap();

        assert!(source.is_memory());
        assert_eq!(source.path(), Some(file.path()));
        assert_eq!(source.len(), 15);
        assert_eq!(source.read_range(3, 4).unwrap(), &[1, 1, 2, 2]);
    }
}
