//! DVD-Video navigation data.
//!
//! `VIDEO_TS.IFO` holds the video manager ([`vmg::Vmg`]): the title table,
//! parental levels and per title set attributes. Each `VTS_nn_0.IFO` holds
//! a video title set ([`vts::Vts`]): program chains, chapters, time maps and
//! cell addresses of the titles it contains.
//!
//! ## Addressing
//!
//! Tables are located by a sector offset from the start of their IFO file.
//! Records inside a table point to sub-structures by a byte offset from the
//! start of that table. Every reader is handed the absolute byte position of
//! the structure it decodes and adds its own offsets to it.
//!
//! A zero offset marks an absent structure. Nothing is read for it and the
//! corresponding field is `None`.

use anyhow::{Result, ensure};
use log::{Level, debug};

use crate::log_or_err;
use crate::utils::errors::{IfoError, SectorError};
use crate::utils::sector::{SECTOR_SIZE, SectorSource};

pub mod attr;
pub mod cell;
pub mod pgc;
pub mod reader;
pub mod time;
pub mod vmg;
pub mod vts;

use reader::IfoReader;
use time::PlaybackTime;
use vmg::Vmg;
use vts::Vts;

/// Parser behaviour.
#[derive(Debug, Clone, Copy)]
pub struct IfoOptions {
    /// Inconsistencies logged at this level or above abort parsing.
    pub fail_level: Level,
}

impl Default for IfoOptions {
    fn default() -> Self {
        Self {
            fail_level: Level::Error,
        }
    }
}

/// Size of the `count, reserved, end byte` header shared by most tables.
pub(crate) const TABLE_HEADER_SIZE: u64 = 8;

#[derive(Debug, Clone, Copy)]
pub(crate) struct TableHeader {
    pub count: u16,
    /// Offset of the last byte of the table.
    pub end_byte: u32,
}

impl TableHeader {
    pub(crate) fn read<S: SectorSource>(reader: &mut IfoReader<S>) -> Result<Self> {
        let count = reader.read_word()?;
        reader.dump_bytes(2)?;
        let end_byte = reader.read_double()?;

        Ok(Self { count, end_byte })
    }

    /// Fails unless `count` records of `record_size` bytes following `header`
    /// bytes fit in the table.
    pub(crate) fn check_records(
        &self,
        table: &'static str,
        header: u64,
        record_size: usize,
    ) -> Result<()> {
        let count = self.count as usize;
        ensure!(
            header + (count * record_size) as u64 <= self.end_byte as u64 + 1,
            IfoError::CountOutOfBounds {
                table,
                count,
                record_size,
                end_byte: self.end_byte,
            }
        );
        Ok(())
    }
}

pub(crate) fn check_start_byte(table: &'static str, start_byte: u32, end_byte: u32) -> Result<()> {
    ensure!(
        start_byte <= end_byte,
        IfoError::StartByteOutOfBounds {
            table,
            start_byte,
            end_byte,
        }
    );
    Ok(())
}

/// Absolute byte position of the sector `offset` sectors past `base`.
pub(crate) fn sector_position(base: u64, offset: u32) -> Result<u64> {
    let pos = base
        .checked_add(offset as u64)
        .and_then(|lba| lba.checked_mul(SECTOR_SIZE as u64))
        .ok_or(SectorError::OffsetOverflow {
            base,
            offset: offset as u64,
        })?;
    Ok(pos)
}

/// Like [`sector_position`], `None` when the offset is zero.
pub(crate) fn table_position(base: u64, offset: u32) -> Result<Option<u64>> {
    match offset {
        0 => Ok(None),
        offset => sector_position(base, offset).map(Some),
    }
}

/// One past the last byte of an IFO starting at sector `start` whose header
/// names `last_sector` as its final sector. `None` when the header leaves it
/// unset.
pub(crate) fn ifo_end(start: u64, last_sector: u32) -> Result<Option<u64>> {
    match last_sector {
        0 => Ok(None),
        last => Ok(sector_position(start, last)?.checked_add(SECTOR_SIZE as u64)),
    }
}

/// Reads a BCD playback time. Bad digits are reported through `options` and
/// read as zero.
pub(crate) fn read_time<S: SectorSource>(
    reader: &mut IfoReader<S>,
    options: &IfoOptions,
) -> Result<PlaybackTime> {
    let raw = reader.read_double()?;
    match PlaybackTime::from_raw(raw) {
        Ok(time) => Ok(time),
        Err(err) => {
            log_or_err!(options, Level::Warn, err);
            Ok(PlaybackTime::default())
        }
    }
}

/// Reads the 12 byte identifier opening a management information table.
pub(crate) fn read_identifier<S: SectorSource>(
    reader: &mut IfoReader<S>,
    options: &IfoOptions,
    expected: &'static str,
) -> Result<String> {
    let id: [u8; 12] = reader.read_array()?;
    let found = String::from_utf8_lossy(&id).into_owned();

    if found != expected {
        log_or_err!(
            options,
            Level::Warn,
            IfoError::InvalidIdentifier {
                found: found.clone(),
                expected
            }
        );
    }
    Ok(found)
}

/// Navigation data of one disc.
///
/// Holds the video manager for the lifetime of the handle and at most one
/// title set, the one of the active title.
#[derive(Debug)]
pub struct Ifo<S: SectorSource> {
    reader: IfoReader<S>,
    options: IfoOptions,
    /// First sector of `VIDEO_TS.IFO`.
    start: u64,
    pub vmg: Vmg,
    vts: Option<Vts>,
    title: u16,
}

impl<S: SectorSource> Ifo<S> {
    /// Parses the video manager found at sector `start`.
    pub fn open(source: S, start: u64, options: IfoOptions) -> Result<Self> {
        let mut reader = IfoReader::new(source);
        debug!("ifo: video manager at sector {start}");
        let vmg = Vmg::parse(&mut reader, &options, start)?;

        Ok(Self {
            reader,
            options,
            start,
            vmg,
            vts: None,
            title: 0,
        })
    }

    /// Loads the title set holding `title` (1-based), replacing the one
    /// loaded before.
    pub fn select_title(&mut self, title: u16) -> Result<&Vts> {
        self.vts = None;
        self.title = 0;

        let base = self.title_set_sector(title)?;
        debug!("ifo: title {title} in title set at sector {base}");
        let vts = Vts::parse(&mut self.reader, &self.options, base)?;

        self.title = title;
        Ok(self.vts.insert(vts))
    }

    /// First sector of the IFO of the title set holding `title`.
    pub fn title_set_sector(&self, title: u16) -> Result<u64> {
        let entry = self.vmg.title(title)?;
        let sector = self
            .start
            .checked_add(entry.title_set_sector as u64)
            .ok_or(SectorError::OffsetOverflow {
                base: self.start,
                offset: entry.title_set_sector as u64,
            })?;
        Ok(sector)
    }

    /// Active title set, if a title has been selected.
    pub fn vts(&self) -> Option<&Vts> {
        self.vts.as_ref()
    }

    /// Active title, 0 when none.
    pub fn title(&self) -> u16 {
        self.title
    }

    /// First sector of the active title's VOB data.
    pub fn title_start(&self) -> Option<u64> {
        self.vts.as_ref().and_then(Vts::title_vobs_start)
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn into_inner(self) -> S {
        self.reader.into_inner()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::ifo::reader::ImageReader;
    use crate::utils::byteorder::{ImageBuilder, join_bytes_be};
    use crate::utils::sector::ImageSource;

    pub(crate) type Image = ImageSource<std::io::Cursor<Vec<u8>>>;

    pub(crate) fn open(data: Vec<u8>, start: u64) -> Result<Ifo<Image>> {
        Ifo::open(
            ImageSource::new(std::io::Cursor::new(data)),
            start,
            IfoOptions::default(),
        )
    }

    fn cell_table(cells: u32) -> Vec<u8> {
        let mut bytes = join_bytes_be!(1u16, 0u16, 8 + cells * 12 - 1);
        for cell in 0..cells {
            bytes.extend(join_bytes_be!(1u16, cell as u8 + 1, 0u8, cell * 100, cell * 100 + 99));
        }
        bytes
    }

    /// Manager at sector 0, title sets at sectors 10 and 20.
    fn disc_image() -> Vec<u8> {
        use crate::ifo::attr::Domain;
        use crate::ifo::pgc::tests::pgc_bytes;
        use crate::ifo::vmg::tests::{title_table, vmg_mat};
        use crate::ifo::vts::tests::vts_mat;

        let mut image = ImageBuilder::new(1);

        image.put(0, &vmg_mat(0x400, 2, [0, 1, 0, 0, 2, 0, 3, 4]));
        image.put(0x400, &pgc_bytes(1, 0));
        image.put_sector(1, 0, &title_table(&[10, 10, 20]));

        let attr_size = 8 + Domain::VTS_MENU.size() + 2 + Domain::VTS_TITLE.size();
        let attr_end = (16 + 2 * attr_size - 1) as u32;
        image.put_sector(
            2,
            0,
            &join_bytes_be!(2u16, 0u16, attr_end, 16u32, 16 + attr_size as u32),
        );
        image.put_sector(2, 16, &join_bytes_be!(attr_size as u32 - 1, 0x1u32));
        image.put_sector(3, 0, &cell_table(2));
        image.put_sector(4, 0, &join_bytes_be!(11u32, [0u32, 40]));

        let mut sectors = [0u32; 10];
        sectors[1] = 30;
        sectors[2] = 1;
        sectors[3] = 2;
        sectors[8] = 3;
        image.put_sector(10, 0, &vts_mat(sectors, &[]));
        image.put_sector(
            11,
            0,
            &join_bytes_be!(1u16, 0u16, 8 + 4 + 3 * 4 - 1u32, 12u32, [[1u16, 1], [1, 2], [1, 3]]),
        );
        let pgc = pgc_bytes(3, 0);
        image.put_sector(
            12,
            0,
            &join_bytes_be!(1u16, 0u16, 16 + pgc.len() as u32 - 1, 0x81u8, 0u8, 0u16, 16u32),
        );
        image.put_sector(12, 16, &pgc);
        image.put_sector(13, 0, &cell_table(3));

        let mut sectors = [0u32; 10];
        sectors[1] = 5;
        image.put_sector(20, 0, &vts_mat(sectors, &[]));

        image.build()
    }

    #[test]
    fn open_parses_manager() -> Result<()> {
        let ifo = open(disc_image(), 0)?;
        let vmg = &ifo.vmg;

        assert_eq!(vmg.titles.as_ref().map(|t| t.titles.len()), Some(3));
        assert_eq!(vmg.first_play.as_ref().map(|p| p.cell_nb), Some(1));
        assert!(vmg.menus.is_none());
        assert!(vmg.parental.is_none());
        assert_eq!(
            vmg.vts_attributes.as_ref().map(|a| a.title_sets.len()),
            Some(2)
        );

        let cells = vmg.menu_cells.as_ref().map(|c| (c.cells.len() as u32, c.end_byte));
        assert_eq!(cells.map(|(nb, end)| nb == end / 12), Some(true));
        assert_eq!(
            vmg.menu_vobus.as_ref().map(|m| m.vobu_start_sectors.clone()),
            Some(vec![0, 40])
        );
        assert!(ifo.vts().is_none());
        Ok(())
    }

    #[test]
    fn omitted_tables_are_never_read() -> Result<()> {
        use crate::ifo::vmg::tests::vmg_mat;

        // one sector only: reading any table would run past the medium
        let mut image = ImageBuilder::new(1);
        image.put(0, &vmg_mat(0, 0, [0; 8]));
        let ifo = open(image.build(), 0)?;

        assert!(ifo.vmg.first_play.is_none());
        assert!(ifo.vmg.titles.is_none());
        assert!(ifo.vmg.vts_attributes.is_none());
        assert!(ifo.vmg.menu_cells.is_none());
        assert!(ifo.vmg.menu_vobus.is_none());
        Ok(())
    }

    #[test]
    fn select_title_loads_its_title_set() -> Result<()> {
        let mut ifo = open(disc_image(), 0)?;

        let vts = ifo.select_title(2)?;
        assert_eq!(vts.base, 10);
        assert_eq!(vts.chapters.as_ref().map(|c| c.titles[0].len()), Some(3));

        let pgcit = vts.pgcit.as_ref().map(|p| p.pgcs.as_slice()).unwrap_or_default();
        assert_eq!(pgcit.len(), 1);
        for srp in pgcit {
            let pgc = &srp.pgc;
            assert_eq!(pgc.cell_play.as_ref().map(Vec::len), Some(pgc.cell_nb as usize));
            assert_eq!(pgc.cell_pos.as_ref().map(Vec::len), Some(pgc.cell_nb as usize));
        }
        assert!(vts.title_chain(1).is_some());
        assert_eq!(vts.cells.as_ref().map(|c| c.cells.len()), Some(3));
        assert_eq!(ifo.title(), 2);
        assert_eq!(ifo.title_start(), Some(40));

        ifo.select_title(3)?;
        assert_eq!(ifo.vts().map(|v| v.base), Some(20));
        assert_eq!(ifo.title_start(), Some(25));
        assert!(ifo.vts().is_some_and(|v| v.pgcit.is_none()));
        Ok(())
    }

    #[test]
    fn title_out_of_range_unloads_title_set() -> Result<()> {
        let mut ifo = open(disc_image(), 0)?;
        ifo.select_title(1)?;

        let err = ifo.select_title(4).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<IfoError>(),
            Some(IfoError::TitleOutOfRange {
                title: 4,
                title_nb: 3
            })
        ));
        assert!(ifo.vts().is_none());
        assert_eq!(ifo.title(), 0);

        assert!(ifo.select_title(0).is_err());
        Ok(())
    }

    #[test]
    fn missing_title_table() -> Result<()> {
        use crate::ifo::vmg::tests::vmg_mat;

        let mut image = ImageBuilder::new(1);
        image.put(0, &vmg_mat(0, 0, [0; 8]));
        let mut ifo = open(image.build(), 0)?;

        let err = ifo.select_title(1).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<IfoError>(),
            Some(IfoError::MissingTitleTable)
        ));
        Ok(())
    }

    #[test]
    fn manager_relative_to_ifo_start() -> Result<()> {
        let mut data = vec![0u8; 5 * SECTOR_SIZE];
        data.extend(disc_image());
        let mut ifo = open(data, 5)?;

        assert_eq!(ifo.start(), 5);
        ifo.select_title(3)?;
        assert_eq!(ifo.title_start(), Some(30));
        Ok(())
    }

    #[test]
    fn table_positions() -> Result<()> {
        assert_eq!(table_position(10, 0)?, None);
        assert_eq!(table_position(10, 2)?, Some(12 * 2048));

        let err = table_position(u64::MAX, 1).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SectorError>(),
            Some(SectorError::OffsetOverflow { .. })
        ));
        Ok(())
    }

    #[test]
    fn ifo_extent() -> Result<()> {
        assert_eq!(ifo_end(10, 0)?, None);
        assert_eq!(ifo_end(10, 7)?, Some(18 * 2048));
        Ok(())
    }

    #[test]
    fn record_bounds() {
        let header = TableHeader {
            count: 3,
            end_byte: 8 + 3 * 12 - 1,
        };
        assert!(header.check_records("t", TABLE_HEADER_SIZE, 12).is_ok());
        assert!(header.check_records("t", TABLE_HEADER_SIZE, 13).is_err());
        assert!(check_start_byte("t", 0x30, 0x2F).is_err());
    }

    #[test]
    fn bad_bcd_time_is_a_warning() -> Result<()> {
        let mut image = ImageBuilder::new(1);
        image.put(0, &join_bytes_be!(0x00_5A_00_40u32));

        let mut reader = ImageReader::from_image(image.build());
        assert_eq!(read_time(&mut reader, &IfoOptions::default())?, PlaybackTime::default());

        let mut reader = ImageReader::from_image(image.build());
        let strict = IfoOptions {
            fail_level: Level::Warn,
        };
        let err = read_time(&mut reader, &strict).unwrap_err();
        assert!(err.downcast_ref::<IfoError>().is_some());
        Ok(())
    }
}
