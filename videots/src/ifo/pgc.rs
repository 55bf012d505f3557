//! Program chains and the tables that index them.

use anyhow::{Result, ensure};
use log::trace;

use super::attr::LangCode;
use super::reader::IfoReader;
use super::time::PlaybackTime;
use super::{IfoOptions, TABLE_HEADER_SIZE, TableHeader, check_start_byte, read_time};
use crate::utils::bitstream_io::BsIoSliceReader;
use crate::utils::errors::IfoError;
use crate::utils::sector::SectorSource;

/// Size of the fixed program chain header.
pub const PGC_HEADER_SIZE: u32 = 0xEC;
pub const COMMAND_SIZE: usize = 8;
const COMMAND_TABLE_HEADER_SIZE: u64 = 8;
pub const CELL_PLAY_SIZE: usize = 24;
pub const CELL_POS_SIZE: usize = 4;
const SRP_SIZE: usize = 8;
const LANGUAGE_UNIT_SIZE: usize = 8;

/// One navigation command, kept undecoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command(pub [u8; COMMAND_SIZE]);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandTable {
    pub pre: Vec<Command>,
    pub post: Vec<Command>,
    pub cell: Vec<Command>,
}

impl CommandTable {
    pub fn read<S: SectorSource>(reader: &mut IfoReader<S>) -> Result<Self> {
        let pre_nb = reader.read_word()? as usize;
        let post_nb = reader.read_word()? as usize;
        let cell_nb = reader.read_word()? as usize;
        let end_byte = reader.read_word()? as u32;

        let count = pre_nb + post_nb + cell_nb;
        ensure!(
            COMMAND_TABLE_HEADER_SIZE + (count * COMMAND_SIZE) as u64 <= end_byte as u64 + 1,
            IfoError::CountOutOfBounds {
                table: "pgc command table",
                count,
                record_size: COMMAND_SIZE,
                end_byte,
            }
        );

        let mut read_n = |n: usize| -> Result<Vec<Command>> {
            (0..n).map(|_| reader.read_array().map(Command)).collect()
        };

        Ok(Self {
            pre: read_n(pre_nb)?,
            post: read_n(post_nb)?,
            cell: read_n(cell_nb)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockMode {
    NotInBlock,
    First,
    Middle,
    Last,
}

impl From<u8> for BlockMode {
    fn from(value: u8) -> Self {
        match value & 0x3 {
            0 => Self::NotInBlock,
            1 => Self::First,
            2 => Self::Middle,
            _ => Self::Last,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    None,
    Angle,
    Reserved(u8),
}

impl From<u8> for BlockType {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::None,
            1 => Self::Angle,
            _ => Self::Reserved(value),
        }
    }
}

/// Packed cell category word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellCategory {
    pub block_mode: BlockMode,
    pub block_type: BlockType,
    pub seamless_play: bool,
    pub interleaved: bool,
    pub stc_discontinuity: bool,
    pub seamless_angle: bool,
    /// Still cells are played one VOBU at a time.
    pub vobu_still: bool,
    pub restricted: bool,
    pub cell_type: u8,
}

impl CellCategory {
    pub fn from_bytes(bytes: &[u8; 2]) -> Result<Self> {
        let mut bs = BsIoSliceReader::from_slice(bytes);

        let block_mode = bs.get_n::<u8>(2)?.into();
        let block_type = bs.get_n::<u8>(2)?.into();
        let seamless_play = bs.get()?;
        let interleaved = bs.get()?;
        let stc_discontinuity = bs.get()?;
        let seamless_angle = bs.get()?;
        bs.skip_n(1)?;
        let vobu_still = bs.get()?;
        let restricted = bs.get()?;
        let cell_type = bs.get_n(5)?;

        Ok(Self {
            block_mode,
            block_type,
            seamless_play,
            interleaved,
            stc_discontinuity,
            seamless_angle,
            vobu_still,
            restricted,
            cell_type,
        })
    }
}

/// Playback information of one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellPlay {
    pub category: CellCategory,
    /// Still time in seconds, 0xFF for infinite.
    pub still_time: u8,
    /// 1-based index into the cell command list, 0 for none.
    pub command: u8,
    pub playback_time: PlaybackTime,
    pub first_sector: u32,
    pub first_ilvu_end_sector: u32,
    pub last_vobu_start_sector: u32,
    pub last_sector: u32,
}

impl CellPlay {
    pub fn read<S: SectorSource>(
        reader: &mut IfoReader<S>,
        options: &IfoOptions,
    ) -> Result<Self> {
        let category = CellCategory::from_bytes(&reader.read_array()?)?;
        let still_time = reader.read_byte()?;
        let command = reader.read_byte()?;
        let playback_time = read_time(reader, options)?;

        Ok(Self {
            category,
            still_time,
            command,
            playback_time,
            first_sector: reader.read_double()?,
            first_ilvu_end_sector: reader.read_double()?,
            last_vobu_start_sector: reader.read_double()?,
            last_sector: reader.read_double()?,
        })
    }

    pub fn sectors(&self) -> u32 {
        self.last_sector.saturating_sub(self.first_sector) + 1
    }
}

/// Which VOB and cell id a program chain cell plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellPos {
    pub vob_id: u16,
    pub cell_id: u8,
}

impl CellPos {
    pub fn read<S: SectorSource>(reader: &mut IfoReader<S>) -> Result<Self> {
        let vob_id = reader.read_word()?;
        reader.dump_bytes(1)?;
        let cell_id = reader.read_byte()?;

        Ok(Self { vob_id, cell_id })
    }
}

/// A program chain.
///
/// Sub-tables are present only when their start byte in the header is
/// non-zero. When present, `cell_play` and `cell_pos` hold exactly
/// `cell_nb` entries and `program_map` exactly `program_nb`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramChain {
    pub program_nb: u8,
    pub cell_nb: u8,
    pub playback_time: PlaybackTime,
    pub prohibited_ops: u32,
    pub audio_control: [u16; 8],
    pub subpic_control: [u32; 32],
    pub next_pgc: u16,
    pub prev_pgc: u16,
    pub go_up_pgc: u16,
    pub still_time: u8,
    pub playback_mode: u8,
    /// Sub-picture palette, `0x00YYCrCb`.
    pub palette: [u32; 16],

    pub commands: Option<CommandTable>,
    /// Entry cell (1-based) of each program.
    pub program_map: Option<Vec<u8>>,
    pub cell_play: Option<Vec<CellPlay>>,
    pub cell_pos: Option<Vec<CellPos>>,
}

impl ProgramChain {
    /// Parses the chain whose header starts at absolute byte `start`.
    pub fn read<S: SectorSource>(
        reader: &mut IfoReader<S>,
        options: &IfoOptions,
        start: u64,
    ) -> Result<Self> {
        reader.seek(start)?;
        reader.dump_bytes(2)?;
        let program_nb = reader.read_byte()?;
        let cell_nb = reader.read_byte()?;
        let playback_time = read_time(reader, options)?;
        let prohibited_ops = reader.read_double()?;

        let mut audio_control = [0u16; 8];
        for control in &mut audio_control {
            *control = reader.read_word()?;
        }
        let mut subpic_control = [0u32; 32];
        for control in &mut subpic_control {
            *control = reader.read_double()?;
        }

        let next_pgc = reader.read_word()?;
        let prev_pgc = reader.read_word()?;
        let go_up_pgc = reader.read_word()?;
        let still_time = reader.read_byte()?;
        let playback_mode = reader.read_byte()?;

        let mut palette = [0u32; 16];
        for color in &mut palette {
            *color = reader.read_double()? & 0x00FF_FFFF;
        }

        let commands_sbyte = reader.read_word()?;
        let program_map_sbyte = reader.read_word()?;
        let cell_play_sbyte = reader.read_word()?;
        let cell_pos_sbyte = reader.read_word()?;

        trace!(
            "pgc at {start:#X}: {program_nb} programs, {cell_nb} cells, {playback_time}"
        );

        let commands = match commands_sbyte {
            0 => None,
            sbyte => {
                reader.seek(start + sbyte as u64)?;
                Some(CommandTable::read(reader)?)
            }
        };

        let program_map = match program_map_sbyte {
            0 => None,
            sbyte => {
                reader.seek(start + sbyte as u64)?;
                let mut map = vec![0u8; program_nb as usize];
                reader.read_bytes(&mut map)?;

                for (program, &cell) in map.iter().enumerate() {
                    ensure!(
                        cell >= 1 && cell <= cell_nb,
                        IfoError::ProgramMapOutOfRange {
                            program: program + 1,
                            cell,
                            cell_nb,
                        }
                    );
                }
                Some(map)
            }
        };

        let cell_play = match cell_play_sbyte {
            0 => None,
            sbyte => {
                reader.seek(start + sbyte as u64)?;
                let cells = (0..cell_nb)
                    .map(|_| CellPlay::read(reader, options))
                    .collect::<Result<Vec<_>>>()?;
                Some(cells)
            }
        };

        let cell_pos = match cell_pos_sbyte {
            0 => None,
            sbyte => {
                reader.seek(start + sbyte as u64)?;
                let cells = (0..cell_nb)
                    .map(|_| CellPos::read(reader))
                    .collect::<Result<Vec<_>>>()?;
                Some(cells)
            }
        };

        Ok(Self {
            program_nb,
            cell_nb,
            playback_time,
            prohibited_ops,
            audio_control,
            subpic_control,
            next_pgc,
            prev_pgc,
            go_up_pgc,
            still_time,
            playback_mode,
            palette,
            commands,
            program_map,
            cell_play,
            cell_pos,
        })
    }

    /// Cells of program `program` (1-based) as a range of 0-based cell
    /// indices.
    pub fn program_cells(&self, program: u8) -> Option<std::ops::Range<usize>> {
        let map = self.program_map.as_ref()?;
        let index = (program as usize).checked_sub(1)?;
        let first = (*map.get(index)? as usize).checked_sub(1)?;
        let end = match map.get(index + 1) {
            Some(&next) => (next as usize).saturating_sub(1),
            None => self.cell_nb as usize,
        };

        Some(first..end)
    }
}

/// Search pointer to one program chain of a [`PgcInfoTable`].
#[derive(Debug, Clone, PartialEq)]
pub struct PgcSearchPointer {
    /// Entry chain of a title or menu.
    pub entry: bool,
    /// Title number, or menu type for menu chains.
    pub id: u8,
    pub block_mode: u8,
    pub block_type: u8,
    pub parental_mask: u16,
    pub start_byte: u32,
    pub pgc: ProgramChain,
}

/// Program chain information table.
#[derive(Debug, Clone, PartialEq)]
pub struct PgcInfoTable {
    pub end_byte: u32,
    pub pgcs: Vec<PgcSearchPointer>,
}

impl PgcInfoTable {
    pub fn read<S: SectorSource>(
        reader: &mut IfoReader<S>,
        options: &IfoOptions,
        start: u64,
    ) -> Result<Self> {
        reader.seek(start)?;
        let header = TableHeader::read(reader)?;
        header.check_records("pgc information table", TABLE_HEADER_SIZE, SRP_SIZE)?;

        let mut pointers = Vec::with_capacity(header.count as usize);
        for _ in 0..header.count {
            let entry_id = reader.read_byte()?;
            let block = reader.read_byte()?;
            let parental_mask = reader.read_word()?;
            let start_byte = reader.read_double()?;
            check_start_byte("pgc information table", start_byte, header.end_byte)?;

            pointers.push((entry_id, block, parental_mask, start_byte));
        }

        let mut pgcs = Vec::with_capacity(pointers.len());
        for (entry_id, block, parental_mask, start_byte) in pointers {
            let pgc = ProgramChain::read(reader, options, start + start_byte as u64)?;
            pgcs.push(PgcSearchPointer {
                entry: entry_id & 0x80 != 0,
                id: entry_id & 0x7F,
                block_mode: block >> 6,
                block_type: (block >> 4) & 0x3,
                parental_mask,
                start_byte,
                pgc,
            });
        }

        Ok(Self {
            end_byte: header.end_byte,
            pgcs,
        })
    }

    /// First entry chain of title `title` (1-based `id`).
    pub fn title_entry(&self, title: u8) -> Option<&ProgramChain> {
        self.pgcs
            .iter()
            .find(|srp| srp.entry && srp.id == title)
            .map(|srp| &srp.pgc)
    }
}

/// Menu chains for one language.
#[derive(Debug, Clone, PartialEq)]
pub struct LanguageUnit {
    pub lang: LangCode,
    /// Menus present in this unit, one bit per menu type.
    pub existence_mask: u8,
    pub pgcit: PgcInfoTable,
}

/// Menu program chains, grouped per language.
#[derive(Debug, Clone, PartialEq)]
pub struct MenuUnitTable {
    pub end_byte: u32,
    pub units: Vec<LanguageUnit>,
}

impl MenuUnitTable {
    pub fn read<S: SectorSource>(
        reader: &mut IfoReader<S>,
        options: &IfoOptions,
        start: u64,
    ) -> Result<Self> {
        reader.seek(start)?;
        let header = TableHeader::read(reader)?;
        header.check_records("menu unit table", TABLE_HEADER_SIZE, LANGUAGE_UNIT_SIZE)?;

        let mut entries = Vec::with_capacity(header.count as usize);
        for _ in 0..header.count {
            let lang = LangCode(reader.read_array()?);
            reader.dump_bytes(1)?;
            let existence_mask = reader.read_byte()?;
            let start_byte = reader.read_double()?;
            check_start_byte("menu unit table", start_byte, header.end_byte)?;

            entries.push((lang, existence_mask, start_byte));
        }

        let mut units = Vec::with_capacity(entries.len());
        for (lang, existence_mask, start_byte) in entries {
            trace!("menu language unit {lang} at +{start_byte:#X}");
            units.push(LanguageUnit {
                lang,
                existence_mask,
                pgcit: PgcInfoTable::read(reader, options, start + start_byte as u64)?,
            });
        }

        Ok(Self {
            end_byte: header.end_byte,
            units,
        })
    }
}
