//! Sector-granular access to a disc image or block device.

use std::io::{self, Read, Seek, SeekFrom};

use anyhow::{Result, bail};
use log::trace;

use crate::utils::errors::SectorError;

/// Logical block size of DVD media.
pub const SECTOR_SIZE: usize = 2048;

pub type Sector = [u8; SECTOR_SIZE];

/// Source of 2048-byte logical blocks addressed from the start of the medium.
pub trait SectorSource {
    /// Reads block `lba` into `buf`.
    ///
    /// Returns `Ok(false)` when `lba` lies past the end of the medium.
    fn read_sector(&mut self, lba: u64, buf: &mut Sector) -> Result<bool>;
}

impl<S: SectorSource + ?Sized> SectorSource for &mut S {
    fn read_sector(&mut self, lba: u64, buf: &mut Sector) -> Result<bool> {
        (**self).read_sector(lba, buf)
    }
}

/// Adapts any seekable byte stream (image file, `Cursor`) to [`SectorSource`].
#[derive(Debug)]
pub struct ImageSource<R: Read + Seek> {
    inner: R,
}

impl<R: Read + Seek> ImageSource<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read + Seek> SectorSource for ImageSource<R> {
    fn read_sector(&mut self, lba: u64, buf: &mut Sector) -> Result<bool> {
        let Some(offset) = lba.checked_mul(SECTOR_SIZE as u64) else {
            bail!(SectorError::OffsetOverflow {
                base: lba,
                offset: SECTOR_SIZE as u64
            });
        };

        self.inner.seek(SeekFrom::Start(offset))?;

        let mut read = 0;
        while read < SECTOR_SIZE {
            match self.inner.read(&mut buf[read..]) {
                Ok(0) => break,
                Ok(n) => read += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        trace!("read sector {lba}: {read} bytes");

        match read {
            0 => Ok(false),
            SECTOR_SIZE => Ok(true),
            _ => bail!(SectorError::ShortRead { sector: lba, read }),
        }
    }
}
