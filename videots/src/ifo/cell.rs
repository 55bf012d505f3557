//! Cell address tables and VOBU address maps.

use anyhow::Result;
use log::{Level, trace};

use super::reader::IfoReader;
use super::{IfoOptions, TABLE_HEADER_SIZE, TableHeader};
use crate::log_or_err;
use crate::utils::errors::IfoError;
use crate::utils::sector::SectorSource;

pub const CELL_MAP_SIZE: u32 = 12;

/// Sector range of one cell inside a VOB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellMap {
    pub vob_id: u16,
    pub cell_id: u8,
    pub start_sector: u32,
    pub last_sector: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellAddressTable {
    pub vob_nb: u16,
    pub end_byte: u32,
    /// Always `end_byte / CELL_MAP_SIZE` entries.
    pub cells: Vec<CellMap>,
}

impl CellAddressTable {
    pub fn read<S: SectorSource>(
        reader: &mut IfoReader<S>,
        options: &IfoOptions,
        start: u64,
    ) -> Result<Self> {
        reader.seek(start)?;
        let TableHeader {
            count: vob_nb,
            end_byte,
        } = TableHeader::read(reader)?;
        reader.check_table_end("cell address table", start, end_byte)?;

        // bytes past the last whole record
        let remainder = (end_byte as u64 + 1 + CELL_MAP_SIZE as u64 - TABLE_HEADER_SIZE)
            % CELL_MAP_SIZE as u64;
        if remainder != 0 {
            log_or_err!(
                options,
                Level::Warn,
                IfoError::TrailingBytes {
                    table: "cell address table",
                    end_byte,
                    remainder: remainder as u32,
                }
            );
        }

        let cell_nb = end_byte / CELL_MAP_SIZE;
        let cells = (0..cell_nb)
            .map(|_| -> Result<CellMap> {
                let vob_id = reader.read_word()?;
                let cell_id = reader.read_byte()?;
                reader.dump_bytes(1)?;
                Ok(CellMap {
                    vob_id,
                    cell_id,
                    start_sector: reader.read_double()?,
                    last_sector: reader.read_double()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        trace!("cell address table: {vob_nb} VOBs, {cell_nb} cells");

        Ok(Self {
            vob_nb,
            end_byte,
            cells,
        })
    }

    pub fn find(&self, vob_id: u16, cell_id: u8) -> Option<&CellMap> {
        self.cells
            .iter()
            .find(|cell| cell.vob_id == vob_id && cell.cell_id == cell_id)
    }
}

/// Start sectors of every VOBU, relative to the VOB set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VobuAddressMap {
    pub end_byte: u32,
    pub vobu_start_sectors: Vec<u32>,
}

impl VobuAddressMap {
    pub fn read<S: SectorSource>(reader: &mut IfoReader<S>, start: u64) -> Result<Self> {
        reader.seek(start)?;
        let end_byte = reader.read_double()?;
        reader.check_table_end("vobu address map", start, end_byte)?;

        let count = (end_byte as u64 + 1).saturating_sub(4) / 4;
        let vobu_start_sectors = (0..count)
            .map(|_| reader.read_double())
            .collect::<Result<Vec<_>>>()?;

        trace!("vobu address map: {count} entries");

        Ok(Self {
            end_byte,
            vobu_start_sectors,
        })
    }

    /// Start sector of the VOBU containing `sector`.
    pub fn vobu_at(&self, sector: u32) -> Option<u32> {
        let index = self.vobu_start_sectors.partition_point(|&start| start <= sector);
        index.checked_sub(1).map(|i| self.vobu_start_sectors[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ifo::reader::ImageReader;
    use crate::utils::byteorder::{ImageBuilder, join_bytes_be};
    use crate::utils::errors::SectorError;
    use crate::utils::sector::SECTOR_SIZE;

    fn cell_table(cells: u32, end_byte: u32) -> Vec<u8> {
        let mut bytes = join_bytes_be!(1u16, 0u16, end_byte);
        for cell in 0..cells {
            bytes.extend(join_bytes_be!(1u16, cell as u8 + 1, 0u8, cell * 10, cell * 10 + 9));
        }
        bytes
    }

    #[test]
    fn cell_count_follows_end_byte() -> Result<()> {
        for cells in [0u32, 1, 5, 170] {
            let end_byte = 8 + cells * CELL_MAP_SIZE - 1;
            let mut image = ImageBuilder::new(1);
            image.put(0x20, &cell_table(cells, end_byte));
            let mut reader = ImageReader::from_image(image.build());

            let table = CellAddressTable::read(&mut reader, &IfoOptions::default(), 0x20)?;

            assert_eq!(table.cells.len() as u32, end_byte / CELL_MAP_SIZE);
            assert_eq!(table.cells.len() as u32, cells);
        }
        Ok(())
    }

    #[test]
    fn cell_lookup() -> Result<()> {
        let mut image = ImageBuilder::new(1);
        image.put(0, &cell_table(3, 8 + 3 * 12 - 1));
        let mut reader = ImageReader::from_image(image.build());

        let table = CellAddressTable::read(&mut reader, &IfoOptions::default(), 0)?;

        assert_eq!(table.find(1, 2).map(|c| c.start_sector), Some(10));
        assert!(table.find(2, 1).is_none());
        Ok(())
    }

    #[test]
    fn trailing_bytes_are_fatal_when_strict() {
        let mut image = ImageBuilder::new(1);
        image.put(0, &cell_table(2, 8 + 2 * 12 + 3));
        let data = image.build();

        let mut reader = ImageReader::from_image(data.clone());
        let table = CellAddressTable::read(&mut reader, &IfoOptions::default(), 0);
        assert_eq!(table.map(|t| t.cells.len()).ok(), Some(2));

        let strict = IfoOptions {
            fail_level: Level::Warn,
        };
        let mut reader = ImageReader::from_image(data);
        let err = CellAddressTable::read(&mut reader, &strict, 0).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<IfoError>(),
            Some(IfoError::TrailingBytes { remainder: 4, .. })
        ));
    }

    #[test]
    fn vobu_map() -> Result<()> {
        let map = join_bytes_be!(4u32 * 4 + 3, [0u32, 25, 61, 140]);
        let mut image = ImageBuilder::new(1);
        image.put(2040, &map);
        let mut reader = ImageReader::from_image(image.build());

        let map = VobuAddressMap::read(&mut reader, 2040)?;

        assert_eq!(map.vobu_start_sectors, [0, 25, 61, 140]);
        assert_eq!(map.vobu_at(30), Some(25));
        assert_eq!(map.vobu_at(140), Some(140));
        assert_eq!(map.vobu_at(0), Some(0));
        Ok(())
    }

    #[test]
    fn huge_end_byte_stops_at_end_of_medium() {
        let mut image = ImageBuilder::new(1);
        image.put(0, &join_bytes_be!(1u16, 0u16, 0xFFFF_FFF0u32));
        image.put(0x100, &join_bytes_be!(0xFFFF_FFF0u32));
        let data = image.build();

        let mut reader = ImageReader::from_image(data.clone());
        let err = CellAddressTable::read(&mut reader, &IfoOptions::default(), 0).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SectorError>(),
            Some(SectorError::EndOfMedium(1))
        ));

        let mut reader = ImageReader::from_image(data);
        let err = VobuAddressMap::read(&mut reader, 0x100).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SectorError>(),
            Some(SectorError::EndOfMedium(1))
        ));
    }

    #[test]
    fn tables_past_ifo_end_are_rejected() {
        let mut image = ImageBuilder::new(1);
        image.put(0, &join_bytes_be!(1u16, 0u16, 0xFFFF_FFF0u32));
        image.put(0x100, &join_bytes_be!(0x800u32));
        let mut reader = ImageReader::from_image(image.build());
        reader.set_limit(Some(SECTOR_SIZE as u64));

        let err = CellAddressTable::read(&mut reader, &IfoOptions::default(), 0).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<IfoError>(),
            Some(IfoError::TableOverrunsIfo {
                table: "cell address table",
                ifo_end: 0x800,
                ..
            })
        ));

        let err = VobuAddressMap::read(&mut reader, 0x100).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<IfoError>(),
            Some(IfoError::TableOverrunsIfo {
                table: "vobu address map",
                start: 0x100,
                ..
            })
        ));
    }
}
