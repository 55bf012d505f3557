//! Video title set (`VTS_nn_0.IFO`).

use anyhow::{Result, ensure};
use log::{debug, trace};

use super::attr::{Domain, StreamAttributes};
use super::cell::{CellAddressTable, VobuAddressMap};
use super::pgc::{MenuUnitTable, PgcInfoTable, ProgramChain};
use super::reader::IfoReader;
use super::{
    IfoOptions, TABLE_HEADER_SIZE, TableHeader, check_start_byte, ifo_end, read_identifier,
    sector_position, table_position,
};
use crate::utils::errors::IfoError;
use crate::utils::sector::SectorSource;

pub const VTS_IDENTIFIER: &str = "DVDVIDEO-VTS";

const CHAPTER_SIZE: u64 = 4;
const TIME_MAP_ENTRY_SIZE: u32 = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VtsManagerInf {
    pub identifier: String,
    pub last_sector: u32,
    pub ifo_last_sector: u32,
    pub spec_version: u8,
    pub category: u32,
    pub end_byte: u32,
    pub menu_vobs_sector: u32,
    pub title_vobs_sector: u32,
    pub chapter_table_sector: u32,
    pub pgcit_sector: u32,
    pub menu_pgci_ut_sector: u32,
    pub time_map_sector: u32,
    pub menu_cell_address_sector: u32,
    pub menu_vobu_map_sector: u32,
    pub cell_address_sector: u32,
    pub vobu_map_sector: u32,
    pub menu_attributes: StreamAttributes,
    pub title_attributes: StreamAttributes,
}

impl VtsManagerInf {
    pub fn read<S: SectorSource>(reader: &mut IfoReader<S>, options: &IfoOptions) -> Result<Self> {
        let identifier = read_identifier(reader, options, VTS_IDENTIFIER)?;
        let last_sector = reader.read_double()?;
        reader.dump_bytes(12)?;
        let ifo_last_sector = reader.read_double()?;
        reader.dump_bytes(1)?;
        let spec_version = reader.read_byte()?;
        let category = reader.read_double()?;
        reader.dump_bytes(90)?;
        let end_byte = reader.read_double()?;
        reader.dump_bytes(60)?;

        let menu_vobs_sector = reader.read_double()?;
        let title_vobs_sector = reader.read_double()?;
        let chapter_table_sector = reader.read_double()?;
        let pgcit_sector = reader.read_double()?;
        let menu_pgci_ut_sector = reader.read_double()?;
        let time_map_sector = reader.read_double()?;
        let menu_cell_address_sector = reader.read_double()?;
        let menu_vobu_map_sector = reader.read_double()?;
        let cell_address_sector = reader.read_double()?;
        let vobu_map_sector = reader.read_double()?;
        reader.dump_bytes(24)?;

        let menu_attributes = StreamAttributes::read(reader, options, Domain::VTS_MENU)?;
        reader.dump_bytes(2)?;
        let title_attributes = StreamAttributes::read(reader, options, Domain::VTS_TITLE)?;

        Ok(Self {
            identifier,
            last_sector,
            ifo_last_sector,
            spec_version,
            category,
            end_byte,
            menu_vobs_sector,
            title_vobs_sector,
            chapter_table_sector,
            pgcit_sector,
            menu_pgci_ut_sector,
            time_map_sector,
            menu_cell_address_sector,
            menu_vobu_map_sector,
            cell_address_sector,
            vobu_map_sector,
            menu_attributes,
            title_attributes,
        })
    }
}

/// Entry point of a chapter (part of title).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chapter {
    pub pgc: u16,
    pub program: u16,
}

/// Chapters of every title in the set, indexed by VTS title number - 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterTable {
    pub end_byte: u32,
    pub titles: Vec<Vec<Chapter>>,
}

impl ChapterTable {
    pub fn read<S: SectorSource>(reader: &mut IfoReader<S>, start: u64) -> Result<Self> {
        reader.seek(start)?;
        let header = TableHeader::read(reader)?;
        reader.check_table_end("chapter table", start, header.end_byte)?;
        header.check_records("chapter table", TABLE_HEADER_SIZE, 4)?;

        let mut offsets = Vec::with_capacity(header.count as usize);
        for _ in 0..header.count {
            let start_byte = reader.read_double()?;
            check_start_byte("chapter table", start_byte, header.end_byte)?;
            offsets.push(start_byte);
        }

        let mut titles = Vec::with_capacity(offsets.len());
        for (i, &start_byte) in offsets.iter().enumerate() {
            // a title's chapters run up to the next title's
            let end = offsets
                .get(i + 1)
                .map_or(header.end_byte as u64 + 1, |&next| next as u64);
            ensure!(
                end >= start_byte as u64,
                IfoError::StartByteOutOfBounds {
                    table: "chapter table",
                    start_byte,
                    end_byte: end as u32,
                }
            );

            reader.seek(start + start_byte as u64)?;
            let chapters = (0..(end - start_byte as u64) / CHAPTER_SIZE)
                .map(|_| -> Result<Chapter> {
                    Ok(Chapter {
                        pgc: reader.read_word()?,
                        program: reader.read_word()?,
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            trace!("vts title {}: {} chapters", i + 1, chapters.len());
            titles.push(chapters);
        }

        Ok(Self {
            end_byte: header.end_byte,
            titles,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeMapEntry {
    pub sector: u32,
    /// Playback is discontinuous between this entry and the next.
    pub discontinuity: bool,
}

/// VOBU sectors sampled every `time_unit` seconds of one program chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeMap {
    pub time_unit: u8,
    pub entries: Vec<TimeMapEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeMapTable {
    pub end_byte: u32,
    pub maps: Vec<TimeMap>,
}

impl TimeMapTable {
    pub fn read<S: SectorSource>(reader: &mut IfoReader<S>, start: u64) -> Result<Self> {
        reader.seek(start)?;
        let header = TableHeader::read(reader)?;
        reader.check_table_end("time map table", start, header.end_byte)?;
        header.check_records("time map table", TABLE_HEADER_SIZE, 4)?;

        let mut offsets = Vec::with_capacity(header.count as usize);
        for _ in 0..header.count {
            let start_byte = reader.read_double()?;
            check_start_byte("time map table", start_byte, header.end_byte)?;
            offsets.push(start_byte);
        }

        let mut maps = Vec::with_capacity(offsets.len());
        for start_byte in offsets {
            reader.seek(start + start_byte as u64)?;
            let time_unit = reader.read_byte()?;
            reader.dump_bytes(1)?;
            let entry_nb = reader.read_word()?;

            TableHeader {
                count: entry_nb,
                end_byte: header.end_byte - start_byte,
            }
            .check_records("time map", 4, TIME_MAP_ENTRY_SIZE as usize)?;

            let entries = (0..entry_nb)
                .map(|_| -> Result<TimeMapEntry> {
                    let raw = reader.read_double()?;
                    Ok(TimeMapEntry {
                        sector: raw & 0x7FFF_FFFF,
                        discontinuity: raw & 0x8000_0000 != 0,
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            maps.push(TimeMap { time_unit, entries });
        }

        Ok(Self {
            end_byte: header.end_byte,
            maps,
        })
    }
}

/// Parsed title set IFO.
#[derive(Debug, Clone, PartialEq)]
pub struct Vts {
    /// First sector of the IFO file.
    pub base: u64,
    pub mat: VtsManagerInf,
    pub chapters: Option<ChapterTable>,
    pub pgcit: Option<PgcInfoTable>,
    pub menus: Option<MenuUnitTable>,
    pub time_maps: Option<TimeMapTable>,
    pub menu_cells: Option<CellAddressTable>,
    pub menu_vobus: Option<VobuAddressMap>,
    pub cells: Option<CellAddressTable>,
    pub vobus: Option<VobuAddressMap>,
}

impl Vts {
    /// Parses the title set whose IFO starts at sector `base`.
    pub fn parse<S: SectorSource>(
        reader: &mut IfoReader<S>,
        options: &IfoOptions,
        base: u64,
    ) -> Result<Self> {
        reader.seek(sector_position(base, 0)?)?;
        let mat = VtsManagerInf::read(reader, options)?;
        reader.set_limit(ifo_end(base, mat.ifo_last_sector)?);
        debug!(
            "vts at sector {base}: title VOBs at +{}, {} audio, {} sub-picture streams",
            mat.title_vobs_sector,
            mat.title_attributes.audio.len(),
            mat.title_attributes.subpictures.len()
        );

        let chapters = match table_position(base, mat.chapter_table_sector)? {
            Some(pos) => Some(ChapterTable::read(reader, pos)?),
            None => None,
        };
        let menus = match table_position(base, mat.menu_pgci_ut_sector)? {
            Some(pos) => Some(MenuUnitTable::read(reader, options, pos)?),
            None => None,
        };
        let pgcit = match table_position(base, mat.pgcit_sector)? {
            Some(pos) => Some(PgcInfoTable::read(reader, options, pos)?),
            None => None,
        };
        let time_maps = match table_position(base, mat.time_map_sector)? {
            Some(pos) => Some(TimeMapTable::read(reader, pos)?),
            None => None,
        };
        let menu_cells = match table_position(base, mat.menu_cell_address_sector)? {
            Some(pos) => Some(CellAddressTable::read(reader, options, pos)?),
            None => None,
        };
        let menu_vobus = match table_position(base, mat.menu_vobu_map_sector)? {
            Some(pos) => Some(VobuAddressMap::read(reader, pos)?),
            None => None,
        };
        let cells = match table_position(base, mat.cell_address_sector)? {
            Some(pos) => Some(CellAddressTable::read(reader, options, pos)?),
            None => None,
        };
        let vobus = match table_position(base, mat.vobu_map_sector)? {
            Some(pos) => Some(VobuAddressMap::read(reader, pos)?),
            None => None,
        };

        Ok(Self {
            base,
            mat,
            chapters,
            pgcit,
            menus,
            time_maps,
            menu_cells,
            menu_vobus,
            cells,
            vobus,
        })
    }

    /// First sector of the title VOBs (`VTS_nn_1.VOB`).
    pub fn title_vobs_start(&self) -> Option<u64> {
        match self.mat.title_vobs_sector {
            0 => None,
            sector => self.base.checked_add(sector as u64),
        }
    }

    /// Entry program chain of VTS title `vts_title` (1-based).
    pub fn title_chain(&self, vts_title: u8) -> Option<&ProgramChain> {
        self.pgcit.as_ref()?.title_entry(vts_title)
    }
}
