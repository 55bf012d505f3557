//! Video manager (`VIDEO_TS.IFO`).
//!
//! ## Management information table
//!
//! | Offset | Field                                   |
//! |--------|-----------------------------------------|
//! | 0x000  | identifier `DVDVIDEO-VMG`               |
//! | 0x00C  | last sector of the VMG                  |
//! | 0x01C  | last sector of the IFO                  |
//! | 0x021  | specification version                   |
//! | 0x022  | category                                |
//! | 0x026  | volume count, volume number, disc side  |
//! | 0x03E  | title set count                         |
//! | 0x040  | provider id (32 bytes), POS code        |
//! | 0x080  | end byte of this table                  |
//! | 0x084  | first play PGC start byte               |
//! | 0x0C0  | sector offsets of the other tables      |
//! | 0x100  | menu stream attributes                  |

use anyhow::Result;
use log::{debug, trace};

use super::attr::{Domain, LangCode, StreamAttributes};
use super::cell::{CellAddressTable, VobuAddressMap};
use super::pgc::{MenuUnitTable, ProgramChain};
use super::reader::IfoReader;
use super::{
    IfoOptions, TABLE_HEADER_SIZE, TableHeader, check_start_byte, ifo_end, read_identifier,
    sector_position, table_position,
};
use crate::utils::bitstream_io::BsIoSliceReader;
use crate::utils::errors::IfoError;
use crate::utils::sector::SectorSource;

pub const VMG_IDENTIFIER: &str = "DVDVIDEO-VMG";

const TITLE_INF_SIZE: usize = 12;
const PARENTAL_COUNTRY_SIZE: usize = 8;
pub const PARENTAL_LEVELS: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmgManagerInf {
    pub identifier: String,
    pub last_sector: u32,
    pub ifo_last_sector: u32,
    pub spec_version: u8,
    pub category: u32,
    pub volume_nb: u16,
    pub volume: u16,
    pub disc_side: u8,
    pub title_set_nb: u16,
    pub provider_id: String,
    pub pos_code: u64,
    pub end_byte: u32,
    pub first_play_pgc: u32,
    pub menu_vobs_sector: u32,
    pub title_table_sector: u32,
    pub menu_pgci_ut_sector: u32,
    pub parental_sector: u32,
    pub vts_attributes_sector: u32,
    pub text_data_sector: u32,
    pub menu_cell_address_sector: u32,
    pub menu_vobu_map_sector: u32,
    pub menu_attributes: StreamAttributes,
}

impl VmgManagerInf {
    pub fn read<S: SectorSource>(reader: &mut IfoReader<S>, options: &IfoOptions) -> Result<Self> {
        let identifier = read_identifier(reader, options, VMG_IDENTIFIER)?;
        let last_sector = reader.read_double()?;
        reader.dump_bytes(12)?;
        let ifo_last_sector = reader.read_double()?;
        reader.dump_bytes(1)?;
        let spec_version = reader.read_byte()?;
        let category = reader.read_double()?;
        let volume_nb = reader.read_word()?;
        let volume = reader.read_word()?;
        let disc_side = reader.read_byte()?;
        reader.dump_bytes(19)?;
        let title_set_nb = reader.read_word()?;

        let provider: [u8; 32] = reader.read_array()?;
        let provider_id = String::from_utf8_lossy(&provider)
            .trim_end_matches(['\0', ' '])
            .to_owned();
        let pos_code = reader.read_quad()?;
        reader.dump_bytes(24)?;
        let end_byte = reader.read_double()?;
        let first_play_pgc = reader.read_double()?;
        reader.dump_bytes(56)?;

        let menu_vobs_sector = reader.read_double()?;
        let title_table_sector = reader.read_double()?;
        let menu_pgci_ut_sector = reader.read_double()?;
        let parental_sector = reader.read_double()?;
        let vts_attributes_sector = reader.read_double()?;
        let text_data_sector = reader.read_double()?;
        let menu_cell_address_sector = reader.read_double()?;
        let menu_vobu_map_sector = reader.read_double()?;
        reader.dump_bytes(32)?;

        let menu_attributes = StreamAttributes::read(reader, options, Domain::VMG_MENU)?;

        Ok(Self {
            identifier,
            last_sector,
            ifo_last_sector,
            spec_version,
            category,
            volume_nb,
            volume,
            disc_side,
            title_set_nb,
            provider_id,
            pos_code,
            end_byte,
            first_play_pgc,
            menu_vobs_sector,
            title_table_sector,
            menu_pgci_ut_sector,
            parental_sector,
            vts_attributes_sector,
            text_data_sector,
            menu_cell_address_sector,
            menu_vobu_map_sector,
            menu_attributes,
        })
    }
}

/// Playback type byte of a title.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TitlePlayback {
    pub multi_or_random_pgc: bool,
    pub jump_in_cell_commands: bool,
    pub jump_in_prepost_commands: bool,
    pub jump_in_button_commands: bool,
    pub jump_in_title_domain: bool,
    pub chapter_search_prohibited: bool,
    pub time_play_prohibited: bool,
}

impl TitlePlayback {
    pub fn from_byte(byte: u8) -> Result<Self> {
        let bytes = [byte];
        let mut bs = BsIoSliceReader::from_slice(&bytes);
        bs.skip_n(1)?;

        Ok(Self {
            multi_or_random_pgc: bs.get()?,
            jump_in_cell_commands: bs.get()?,
            jump_in_prepost_commands: bs.get()?,
            jump_in_button_commands: bs.get()?,
            jump_in_title_domain: bs.get()?,
            chapter_search_prohibited: bs.get()?,
            time_play_prohibited: bs.get()?,
        })
    }
}

/// One entry of the title table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TitleInf {
    pub playback: TitlePlayback,
    pub angle_nb: u8,
    pub chapter_nb: u16,
    pub parental_id: u16,
    /// Title set number, 1-based.
    pub title_set: u8,
    /// Title number within the title set.
    pub vts_title: u8,
    /// Start of the title set IFO, in sectors from `VIDEO_TS.IFO`.
    pub title_set_sector: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleTable {
    pub end_byte: u32,
    pub titles: Vec<TitleInf>,
}

impl TitleTable {
    pub fn read<S: SectorSource>(reader: &mut IfoReader<S>, start: u64) -> Result<Self> {
        reader.seek(start)?;
        let header = TableHeader::read(reader)?;
        header.check_records("title table", TABLE_HEADER_SIZE, TITLE_INF_SIZE)?;

        let mut titles = Vec::with_capacity(header.count as usize);
        for _ in 0..header.count {
            let title = TitleInf {
                playback: TitlePlayback::from_byte(reader.read_byte()?)?,
                angle_nb: reader.read_byte()?,
                chapter_nb: reader.read_word()?,
                parental_id: reader.read_word()?,
                title_set: reader.read_byte()?,
                vts_title: reader.read_byte()?,
                title_set_sector: reader.read_double()?,
            };
            trace!(
                "title {}: vts {} ttn {}, {} chapters, {} angles",
                titles.len() + 1,
                title.title_set,
                title.vts_title,
                title.chapter_nb,
                title.angle_nb
            );
            titles.push(title);
        }

        Ok(Self {
            end_byte: header.end_byte,
            titles,
        })
    }
}

/// Parental masks of one country.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentalCountry {
    pub country: LangCode,
    /// `masks[level - 1][vts]`, with title set 0 standing for the manager.
    pub masks: [Vec<u16>; PARENTAL_LEVELS],
}

impl ParentalCountry {
    /// Mask of title set `vts` at parental `level` (1 to 8).
    pub fn mask(&self, level: u8, vts: u16) -> Option<u16> {
        let index = (level as usize).checked_sub(1)?;
        self.masks.get(index)?.get(vts as usize).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentalTable {
    pub vts_nb: u16,
    pub end_byte: u32,
    pub countries: Vec<ParentalCountry>,
}

impl ParentalTable {
    pub fn read<S: SectorSource>(reader: &mut IfoReader<S>, start: u64) -> Result<Self> {
        reader.seek(start)?;
        let country_nb = reader.read_word()?;
        let vts_nb = reader.read_word()?;
        let end_byte = reader.read_double()?;
        TableHeader {
            count: country_nb,
            end_byte,
        }
        .check_records("parental table", TABLE_HEADER_SIZE, PARENTAL_COUNTRY_SIZE)?;

        let mut entries = Vec::with_capacity(country_nb as usize);
        for _ in 0..country_nb {
            let country = LangCode(reader.read_array()?);
            reader.dump_bytes(2)?;
            let start_byte = reader.read_word()? as u32;
            reader.dump_bytes(2)?;

            let span = PARENTAL_LEVELS as u32 * (vts_nb as u32 + 1) * 2;
            check_start_byte("parental table", start_byte + span - 1, end_byte)?;
            entries.push((country, start_byte));
        }

        let mut countries = Vec::with_capacity(entries.len());
        for (country, start_byte) in entries {
            reader.seek(start + start_byte as u64)?;

            let mut masks: [Vec<u16>; PARENTAL_LEVELS] = Default::default();
            // stored from level 8 down to level 1
            for level in masks.iter_mut().rev() {
                *level = (0..=vts_nb)
                    .map(|_| reader.read_word())
                    .collect::<Result<Vec<_>>>()?;
            }
            countries.push(ParentalCountry { country, masks });
        }

        Ok(Self {
            vts_nb,
            end_byte,
            countries,
        })
    }
}

/// Attributes of one title set as recorded in the manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VtsAttributes {
    pub end_byte: u32,
    pub category: u32,
    pub menu: StreamAttributes,
    pub title: StreamAttributes,
}

impl VtsAttributes {
    pub fn read<S: SectorSource>(
        reader: &mut IfoReader<S>,
        options: &IfoOptions,
        start: u64,
    ) -> Result<Self> {
        reader.seek(start)?;
        let end_byte = reader.read_double()?;
        let category = reader.read_double()?;
        let menu = StreamAttributes::read(reader, options, Domain::VTS_MENU)?;
        reader.dump_bytes(2)?;
        let title = StreamAttributes::read(reader, options, Domain::VTS_TITLE)?;

        Ok(Self {
            end_byte,
            category,
            menu,
            title,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VtsAttributeTable {
    pub end_byte: u32,
    pub title_sets: Vec<VtsAttributes>,
}

impl VtsAttributeTable {
    pub fn read<S: SectorSource>(
        reader: &mut IfoReader<S>,
        options: &IfoOptions,
        start: u64,
    ) -> Result<Self> {
        reader.seek(start)?;
        let header = TableHeader::read(reader)?;
        header.check_records("title set attribute table", TABLE_HEADER_SIZE, 4)?;

        let mut offsets = Vec::with_capacity(header.count as usize);
        for _ in 0..header.count {
            let start_byte = reader.read_double()?;
            check_start_byte("title set attribute table", start_byte, header.end_byte)?;
            offsets.push(start_byte);
        }

        let title_sets = offsets
            .into_iter()
            .map(|start_byte| VtsAttributes::read(reader, options, start + start_byte as u64))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            end_byte: header.end_byte,
            title_sets,
        })
    }
}

/// Parsed `VIDEO_TS.IFO`.
#[derive(Debug, Clone, PartialEq)]
pub struct Vmg {
    pub mat: VmgManagerInf,
    pub first_play: Option<ProgramChain>,
    pub titles: Option<TitleTable>,
    pub menus: Option<MenuUnitTable>,
    pub parental: Option<ParentalTable>,
    pub vts_attributes: Option<VtsAttributeTable>,
    pub menu_cells: Option<CellAddressTable>,
    pub menu_vobus: Option<VobuAddressMap>,
}

impl Vmg {
    /// Parses the manager whose IFO starts at sector `start`.
    pub fn parse<S: SectorSource>(
        reader: &mut IfoReader<S>,
        options: &IfoOptions,
        start: u64,
    ) -> Result<Self> {
        let base = sector_position(start, 0)?;
        reader.seek(base)?;
        let mat = VmgManagerInf::read(reader, options)?;
        reader.set_limit(ifo_end(start, mat.ifo_last_sector)?);
        debug!(
            "vmg: {} title sets, provider {:?}",
            mat.title_set_nb, mat.provider_id
        );

        let first_play = match mat.first_play_pgc {
            0 => None,
            sbyte => Some(ProgramChain::read(reader, options, base + sbyte as u64)?),
        };

        let titles = match table_position(start, mat.title_table_sector)? {
            Some(pos) => Some(TitleTable::read(reader, pos)?),
            None => None,
        };
        let menus = match table_position(start, mat.menu_pgci_ut_sector)? {
            Some(pos) => Some(MenuUnitTable::read(reader, options, pos)?),
            None => None,
        };
        let parental = match table_position(start, mat.parental_sector)? {
            Some(pos) => Some(ParentalTable::read(reader, pos)?),
            None => None,
        };
        let vts_attributes = match table_position(start, mat.vts_attributes_sector)? {
            Some(pos) => Some(VtsAttributeTable::read(reader, options, pos)?),
            None => None,
        };
        let menu_cells = match table_position(start, mat.menu_cell_address_sector)? {
            Some(pos) => Some(CellAddressTable::read(reader, options, pos)?),
            None => None,
        };
        let menu_vobus = match table_position(start, mat.menu_vobu_map_sector)? {
            Some(pos) => Some(VobuAddressMap::read(reader, pos)?),
            None => None,
        };

        Ok(Self {
            mat,
            first_play,
            titles,
            menus,
            parental,
            vts_attributes,
            menu_cells,
            menu_vobus,
        })
    }

    pub fn title(&self, title: u16) -> Result<&TitleInf> {
        let titles = self.titles.as_ref().ok_or(IfoError::MissingTitleTable)?;
        let title_nb = titles.titles.len() as u16;
        let entry = title
            .checked_sub(1)
            .and_then(|i| titles.titles.get(i as usize))
            .ok_or(IfoError::TitleOutOfRange { title, title_nb })?;
        Ok(entry)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::ifo::reader::ImageReader;
    use crate::utils::byteorder::{ImageBuilder, join_bytes_be};

    /// Management table header with the given sector offsets at 0xC0.
    pub(crate) fn vmg_mat(
        first_play_pgc: u32,
        title_set_nb: u16,
        sectors: [u32; 8],
    ) -> Vec<u8> {
        let mut provider = [0u8; 32];
        provider[..6].copy_from_slice(b"STUDIO");

        let mut bytes = join_bytes_be!(
            VMG_IDENTIFIER.as_bytes(),
            0x3FFu32,
            [0u8; 12],
            0x0Fu32,
            0u8,
            0x11u8,
            0u32,
            1u16,
            1u16,
            0u8,
            [0u8; 19],
            title_set_nb,
            provider,
            0u64,
            [0u8; 24],
            0x3FFu32,
            first_play_pgc,
            [0u8; 56],
            sectors,
            [0u8; 32]
        );
        assert_eq!(bytes.len(), 0x100);
        bytes.extend(vec![0u8; Domain::VMG_MENU.size()]);
        bytes
    }

    pub(crate) fn title_table(title_set_sectors: &[u32]) -> Vec<u8> {
        let count = title_set_sectors.len();
        let mut bytes = join_bytes_be!(count as u16, 0u16, (8 + 12 * count - 1) as u32);
        for (i, &sector) in title_set_sectors.iter().enumerate() {
            bytes.extend(join_bytes_be!(
                0x40u8,
                1u8,
                4u16,
                0u16,
                i as u8 + 1,
                1u8,
                sector
            ));
        }
        bytes
    }

    #[test]
    fn manager_header() -> Result<()> {
        let mut image = ImageBuilder::new(1);
        image.put(0, &vmg_mat(0, 3, [0; 8]));
        let mut reader = ImageReader::from_image(image.build());

        let mat = VmgManagerInf::read(&mut reader, &IfoOptions::default())?;

        assert_eq!(mat.identifier, VMG_IDENTIFIER);
        assert_eq!(mat.spec_version, 0x11);
        assert_eq!(mat.title_set_nb, 3);
        assert_eq!(mat.provider_id, "STUDIO");
        assert!(mat.menu_attributes.audio.is_empty());
        assert_eq!(reader.position(), 0x100 + Domain::VMG_MENU.size() as u64);
        Ok(())
    }

    #[test]
    fn wrong_identifier_is_reported() -> Result<()> {
        let mut header = vmg_mat(0, 1, [0; 8]);
        header[..12].copy_from_slice(b"DVDVIDEO-VTS");
        let mut image = ImageBuilder::new(1);
        image.put(0, &header);

        let mut reader = ImageReader::from_image(image.build());
        let mat = VmgManagerInf::read(&mut reader, &IfoOptions::default())?;
        assert_eq!(mat.identifier, "DVDVIDEO-VTS");

        let strict = IfoOptions {
            fail_level: log::Level::Warn,
        };
        let mut reader = ImageReader::from_image(image.build());
        let err = VmgManagerInf::read(&mut reader, &strict).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<IfoError>(),
            Some(IfoError::InvalidIdentifier { .. })
        ));
        Ok(())
    }

    #[test]
    fn titles() -> Result<()> {
        let mut image = ImageBuilder::new(1);
        image.put(0x10, &title_table(&[20, 20, 40]));
        let mut reader = ImageReader::from_image(image.build());

        let table = TitleTable::read(&mut reader, 0x10)?;

        assert_eq!(table.titles.len(), 3);
        assert_eq!(table.titles[2].title_set, 3);
        assert_eq!(table.titles[2].title_set_sector, 40);
        assert_eq!(table.titles[0].chapter_nb, 4);
        assert!(table.titles[0].playback.multi_or_random_pgc);
        assert!(!table.titles[0].playback.time_play_prohibited);
        Ok(())
    }

    #[test]
    fn parental_masks_by_level() -> Result<()> {
        let vts_nb = 2u16;
        let levels: Vec<u16> = (0..8u16)
            .flat_map(|i| {
                let level = 8 - i;
                (0..=vts_nb).map(move |vts| level * 0x100 + vts)
            })
            .collect();
        let end_byte = 16 + levels.len() as u32 * 2 - 1;
        let table = join_bytes_be!(1u16, vts_nb, end_byte, *b"us", 0u16, 16u16, 0u16, levels);

        let mut image = ImageBuilder::new(1);
        image.put(0, &table);
        let mut reader = ImageReader::from_image(image.build());

        let parental = ParentalTable::read(&mut reader, 0)?;

        let us = &parental.countries[0];
        assert_eq!(us.country.as_str(), Some("us"));
        assert_eq!(us.mask(8, 0), Some(0x800));
        assert_eq!(us.mask(1, 2), Some(0x102));
        assert_eq!(us.mask(0, 0), None);
        assert_eq!(us.mask(3, 3), None);
        Ok(())
    }
}
