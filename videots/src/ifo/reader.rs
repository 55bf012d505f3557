//! Cursor over IFO data.
//!
//! Holds one sector of the underlying medium and a read position inside it.
//! Reads are big-endian and refill the buffer with the following sector
//! whenever they run past its end, so records may straddle sector
//! boundaries.

use anyhow::{Result, bail, ensure};
use log::trace;

use crate::utils::errors::{IfoError, SectorError};
use crate::utils::sector::{SECTOR_SIZE, Sector, SectorSource};

#[derive(Debug)]
pub struct IfoReader<S: SectorSource> {
    source: S,
    buf: Box<Sector>,
    /// Sector held in `buf`, if any.
    sector: Option<u64>,
    index: usize,
    /// One past the last byte of the IFO being parsed, when known.
    limit: Option<u64>,
}

impl<S: SectorSource> IfoReader<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            buf: Box::new([0; SECTOR_SIZE]),
            sector: None,
            index: 0,
            limit: None,
        }
    }

    /// Loads sector `lba` and moves the cursor to its first byte.
    pub fn fill_buffer(&mut self, lba: u64) -> Result<()> {
        // a failed read may leave the buffer half overwritten
        self.sector = None;
        if !self.source.read_sector(lba, &mut self.buf)? {
            bail!(SectorError::EndOfMedium(lba));
        }

        trace!("ifo buffer at sector {lba}");
        self.sector = Some(lba);
        self.index = 0;
        Ok(())
    }

    /// Moves the cursor to absolute byte `pos`, reloading only when it falls
    /// in a different sector.
    pub fn seek(&mut self, pos: u64) -> Result<()> {
        let lba = pos / SECTOR_SIZE as u64;
        if self.sector != Some(lba) {
            self.fill_buffer(lba)?;
        }
        self.index = (pos % SECTOR_SIZE as u64) as usize;
        Ok(())
    }

    /// Bounds later tables to the IFO ending before byte `end`.
    pub fn set_limit(&mut self, end: Option<u64>) {
        self.limit = end;
    }

    /// Fails when a table at `start` whose last byte is `end_byte` runs past
    /// the end of the IFO.
    pub(crate) fn check_table_end(
        &self,
        table: &'static str,
        start: u64,
        end_byte: u32,
    ) -> Result<()> {
        if let Some(ifo_end) = self.limit {
            ensure!(
                start.saturating_add(end_byte as u64) < ifo_end,
                IfoError::TableOverrunsIfo {
                    table,
                    start,
                    end_byte,
                    ifo_end,
                }
            );
        }
        Ok(())
    }

    /// Absolute byte position of the cursor.
    pub fn position(&self) -> u64 {
        self.sector.unwrap_or(0) * SECTOR_SIZE as u64 + self.index as u64
    }

    /// Makes at least one byte available at the cursor.
    #[inline]
    fn ensure(&mut self) -> Result<()> {
        match self.sector {
            Some(lba) if self.index >= SECTOR_SIZE => self.fill_buffer(lba + 1),
            Some(_) => Ok(()),
            None => self.fill_buffer(0),
        }
    }

    pub fn read_bytes(&mut self, dest: &mut [u8]) -> Result<()> {
        let mut done = 0;
        while done < dest.len() {
            self.ensure()?;
            let n = (dest.len() - done).min(SECTOR_SIZE - self.index);
            dest[done..done + n].copy_from_slice(&self.buf[self.index..self.index + n]);
            self.index += n;
            done += n;
        }
        Ok(())
    }

    /// Advances the cursor by `n` bytes without copying.
    pub fn dump_bytes(&mut self, n: usize) -> Result<()> {
        let mut left = n;
        while left > 0 {
            self.ensure()?;
            let step = left.min(SECTOR_SIZE - self.index);
            self.index += step;
            left -= step;
        }
        Ok(())
    }

    #[inline]
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        self.read_bytes(&mut out)?;
        Ok(out)
    }

    #[inline]
    pub fn read_byte(&mut self) -> Result<u8> {
        self.ensure()?;
        let byte = self.buf[self.index];
        self.index += 1;
        Ok(byte)
    }

    #[inline]
    pub fn read_word(&mut self) -> Result<u16> {
        self.read_array().map(u16::from_be_bytes)
    }

    #[inline]
    pub fn read_double(&mut self) -> Result<u32> {
        self.read_array().map(u32::from_be_bytes)
    }

    #[inline]
    pub fn read_quad(&mut self) -> Result<u64> {
        self.read_array().map(u64::from_be_bytes)
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn into_inner(self) -> S {
        self.source
    }
}

#[cfg(test)]
pub(crate) type ImageReader =
    IfoReader<crate::utils::sector::ImageSource<std::io::Cursor<Vec<u8>>>>;

#[cfg(test)]
impl ImageReader {
    pub(crate) fn from_image(data: Vec<u8>) -> Self {
        IfoReader::new(crate::utils::sector::ImageSource::new(
            std::io::Cursor::new(data),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(data: Vec<u8>) -> ImageReader {
        ImageReader::from_image(data)
    }

    #[test]
    fn big_endian_fields() -> Result<()> {
        let mut data = vec![0u8; SECTOR_SIZE];
        data[..15].copy_from_slice(&[
            0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E,
            0x0F,
        ]);
        let mut reader = reader(data);

        reader.fill_buffer(0)?;
        assert_eq!(reader.read_byte()?, 0x01);
        assert_eq!(reader.read_word()?, 0x0203);
        assert_eq!(reader.read_double()?, 0x0405_0607);
        assert_eq!(reader.read_quad()?, 0x0809_0A0B_0C0D_0E0F);
        assert_eq!(reader.position(), 15);

        Ok(())
    }

    #[test]
    fn refills_across_sector_boundary() -> Result<()> {
        let mut data = vec![0u8; SECTOR_SIZE * 3];
        data[SECTOR_SIZE - 2..SECTOR_SIZE + 2].copy_from_slice(&[0xAA, 0xBB, 0xCC, 0xDD]);
        data[2 * SECTOR_SIZE + 1] = 0x77;
        let mut reader = reader(data);

        reader.seek(SECTOR_SIZE as u64 - 2)?;
        assert_eq!(reader.read_double()?, 0xAABB_CCDD);
        assert_eq!(reader.position(), SECTOR_SIZE as u64 + 2);

        reader.dump_bytes(SECTOR_SIZE - 2)?;
        assert_eq!(reader.read_word()?, 0x0077);

        Ok(())
    }

    #[test]
    fn read_past_end_fails() -> Result<()> {
        let mut reader = reader(vec![0u8; SECTOR_SIZE]);

        reader.seek(SECTOR_SIZE as u64 - 1)?;
        let err = reader.read_word().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SectorError>(),
            Some(SectorError::EndOfMedium(1))
        ));

        Ok(())
    }

    #[test]
    fn failed_refill_drops_buffered_sector() -> Result<()> {
        let mut data = vec![0x11u8; SECTOR_SIZE];
        data.extend(vec![0x22u8; SECTOR_SIZE]);
        data.extend(vec![0x99u8; 100]);
        let mut reader = reader(data);

        reader.seek(5)?;
        assert_eq!(reader.read_byte()?, 0x11);

        let err = reader.seek(2 * SECTOR_SIZE as u64).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SectorError>(),
            Some(SectorError::ShortRead { sector: 2, read: 100 })
        ));

        reader.seek(5)?;
        assert_eq!(reader.read_byte()?, 0x11);

        Ok(())
    }

    #[test]
    fn tables_must_end_inside_the_ifo() -> Result<()> {
        let mut reader = reader(vec![0u8; SECTOR_SIZE]);
        reader.check_table_end("cell address table", 0x800, 0xFFFF_FFF0)?;

        reader.set_limit(Some(4 * SECTOR_SIZE as u64));
        reader.check_table_end("cell address table", 0x800, 0x17FF)?;

        let err = reader
            .check_table_end("cell address table", 0x800, 0x1800)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<IfoError>(),
            Some(IfoError::TableOverrunsIfo {
                end_byte: 0x1800,
                ifo_end: 0x2000,
                ..
            })
        ));

        Ok(())
    }
}
