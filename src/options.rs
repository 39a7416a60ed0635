//! Settings used when opening an image

use std::env;
use std::path::Path;

use crate::byte_source::ByteSource;
use crate::detect;
use crate::sector::ImageLayout;
use crate::store::SectorStore;
use crate::CdResult;

/// Environment variable enabling zip archive support when set to `1`, `true` or `yes`
pub const ZIP_ENV: &str = "CDSECTOR_ZIP";

/// Environment variable overriding the number of sectors read at once
pub const BUFFER_SECTORS_ENV: &str = "CDSECTOR_BUFFER_SECTORS";

/// How to open a disc image
#[derive(Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OpenOptions {
    /// Number of sectors read whenever the read window has to move
    pub buffer_sectors: u32,
    /// Load `.zip` archives by concatenating their image entries in memory
    pub allow_zip: bool,
    /// Use this layout instead of identifying it
    pub layout: Option<ImageLayout>,
}

impl Default for OpenOptions {
    fn default() -> OpenOptions {
        OpenOptions {
            buffer_sectors: 16,
            allow_zip: false,
            layout: None,
        }
    }
}

impl OpenOptions {
    /// Default options overridden by the `CDSECTOR_*` environment variables. Invalid values are
    /// ignored.
    pub fn from_env() -> OpenOptions {
        let mut options = OpenOptions::default();

        options.apply_env(|name| env::var(name).ok());

        options
    }

    fn apply_env<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = var(ZIP_ENV) {
            match v.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => self.allow_zip = true,
                "0" | "false" | "no" | "" => self.allow_zip = false,
                _ => log::warn!("Ignoring invalid {} value `{}`", ZIP_ENV, v),
            }
        }

        if let Some(v) = var(BUFFER_SECTORS_ENV) {
            match v.trim().parse::<u32>() {
                Ok(n) if n > 0 => self.buffer_sectors = n,
                _ => log::warn!("Ignoring invalid {} value `{}`", BUFFER_SECTORS_ENV, v),
            }
        }
    }

    /// Open the image at `path`
    pub fn open(&self, path: &Path) -> CdResult<SectorStore> {
        let is_zip = path
            .extension()
            .map_or(false, |e| e.eq_ignore_ascii_case("zip"));

        let mut source = if self.allow_zip && is_zip {
            ByteSource::open_zip(path)?
        } else {
            ByteSource::open(path)?
        };

        let layout = match self.layout {
            Some(layout) => {
                layout.validate()?;
                layout
            }
            None => detect::identify(&mut source)?,
        };

        let mut store = SectorStore::new(source, layout);

        store.set_buffer_size(self.buffer_sectors);

        Ok(store)
    }
}
