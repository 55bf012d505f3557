//! Stream attributes.
//!
//! ## Layouts (MSB first)
//!
//! ```text
//! video (2 bytes)       mpeg:2 standard:2 aspect:2 display:2
//!                       cc1:1 cc2:1 reserved:1 bitrate:1 size:2 letterbox:1 film:1
//! audio (8 bytes)       coding:3 multichannel_ext:1 lang_type:2 application:2
//!                       quantization:2 frequency:2 reserved:1 channels:3
//!                       lang:16 lang_ext:8 code_ext:8 reserved:8 app_info:8
//! sub-picture (6 bytes) coding:3 reserved:3 lang_type:2 reserved:8
//!                       lang:16 lang_ext:8 code_ext:8
//! ```

use std::fmt::{Display, Formatter};

use anyhow::Result;
use log::{Level, trace};

use super::IfoOptions;
use super::reader::IfoReader;
use crate::log_or_err;
use crate::utils::bitstream_io::BsIoSliceReader;
use crate::utils::errors::IfoError;
use crate::utils::sector::SectorSource;

pub const VIDEO_ATTR_SIZE: usize = 2;
pub const AUDIO_ATTR_SIZE: usize = 8;
pub const SUBPIC_ATTR_SIZE: usize = 6;

/// Two-letter ISO 639 language (or ISO 3166 country) code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct LangCode(pub [u8; 2]);

impl LangCode {
    /// Code as text, `None` when unset or not printable ASCII.
    pub fn as_str(&self) -> Option<&str> {
        if self.0.iter().all(|b| b.is_ascii_graphic()) {
            std::str::from_utf8(&self.0).ok()
        } else {
            None
        }
    }
}

impl From<u16> for LangCode {
    fn from(value: u16) -> Self {
        Self(value.to_be_bytes())
    }
}

impl Display for LangCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str().unwrap_or("--"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegVersion {
    Mpeg1,
    Mpeg2,
    Reserved(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoStandard {
    Ntsc,
    Pal,
    Reserved(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AspectRatio {
    Ratio4x3,
    Ratio16x9,
    Reserved(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoAttr {
    pub mpeg_version: MpegVersion,
    pub standard: VideoStandard,
    pub aspect_ratio: AspectRatio,
    pub permitted_display: u8,
    pub line21_cc: [bool; 2],
    pub variable_bit_rate: bool,
    pub picture_size: u8,
    pub letterboxed: bool,
    pub film_mode: bool,
}

impl VideoAttr {
    pub fn from_bytes(bytes: &[u8; VIDEO_ATTR_SIZE]) -> Result<Self> {
        let mut bs = BsIoSliceReader::from_slice(bytes);

        let mpeg_version = match bs.get_n::<u8>(2)? {
            0 => MpegVersion::Mpeg1,
            1 => MpegVersion::Mpeg2,
            v => MpegVersion::Reserved(v),
        };
        let standard = match bs.get_n::<u8>(2)? {
            0 => VideoStandard::Ntsc,
            1 => VideoStandard::Pal,
            v => VideoStandard::Reserved(v),
        };
        let aspect_ratio = match bs.get_n::<u8>(2)? {
            0 => AspectRatio::Ratio4x3,
            3 => AspectRatio::Ratio16x9,
            v => AspectRatio::Reserved(v),
        };
        let permitted_display = bs.get_n(2)?;
        let line21_cc = [bs.get()?, bs.get()?];
        bs.skip_n(1)?;
        let variable_bit_rate = bs.get()?;
        let picture_size = bs.get_n(2)?;
        let letterboxed = bs.get()?;
        let film_mode = bs.get()?;

        Ok(Self {
            mpeg_version,
            standard,
            aspect_ratio,
            permitted_display,
            line21_cc,
            variable_bit_rate,
            picture_size,
            letterboxed,
            film_mode,
        })
    }

    pub fn read<S: SectorSource>(reader: &mut IfoReader<S>) -> Result<Self> {
        Self::from_bytes(&reader.read_array()?)
    }

    /// Frame size in pixels for the coded picture size.
    pub fn resolution(&self) -> Option<(u16, u16)> {
        let height = match self.standard {
            VideoStandard::Ntsc => 480,
            VideoStandard::Pal => 576,
            VideoStandard::Reserved(_) => return None,
        };
        let width = match self.picture_size {
            0 => 720,
            1 => 704,
            2 => 352,
            3 => return Some((352, height / 2)),
            _ => return None,
        };
        Some((width, height))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioCoding {
    Ac3,
    Mpeg1,
    Mpeg2Ext,
    Lpcm,
    Dts,
    Reserved(u8),
}

impl Display for AudioCoding {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioCoding::Ac3 => f.write_str("AC-3"),
            AudioCoding::Mpeg1 => f.write_str("MPEG-1"),
            AudioCoding::Mpeg2Ext => f.write_str("MPEG-2 ext"),
            AudioCoding::Lpcm => f.write_str("LPCM"),
            AudioCoding::Dts => f.write_str("DTS"),
            AudioCoding::Reserved(v) => write!(f, "Reserved({v})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioAttr {
    pub coding: AudioCoding,
    pub multichannel_ext: bool,
    /// 1 when `lang` holds a language code.
    pub lang_type: u8,
    pub application_mode: u8,
    pub quantization: u8,
    /// 0 = 48 kHz, 1 = 96 kHz.
    pub sample_frequency: u8,
    pub channels: u8,
    pub lang: LangCode,
    pub lang_extension: u8,
    pub code_extension: u8,
    pub application_info: u8,
}

impl AudioAttr {
    pub fn from_bytes(bytes: &[u8; AUDIO_ATTR_SIZE]) -> Result<Self> {
        let mut bs = BsIoSliceReader::from_slice(bytes);

        let coding = match bs.get_n::<u8>(3)? {
            0 => AudioCoding::Ac3,
            2 => AudioCoding::Mpeg1,
            3 => AudioCoding::Mpeg2Ext,
            4 => AudioCoding::Lpcm,
            6 => AudioCoding::Dts,
            v => AudioCoding::Reserved(v),
        };
        let multichannel_ext = bs.get()?;
        let lang_type = bs.get_n(2)?;
        let application_mode = bs.get_n(2)?;
        let quantization = bs.get_n(2)?;
        let sample_frequency = bs.get_n(2)?;
        bs.skip_n(1)?;
        let channels = bs.get_n::<u8>(3)? + 1;
        let lang = LangCode::from(bs.get_n::<u16>(16)?);
        let lang_extension = bs.get_n(8)?;
        let code_extension = bs.get_n(8)?;
        bs.skip_n(8)?;
        let application_info = bs.get_n(8)?;

        Ok(Self {
            coding,
            multichannel_ext,
            lang_type,
            application_mode,
            quantization,
            sample_frequency,
            channels,
            lang,
            lang_extension,
            code_extension,
            application_info,
        })
    }

    pub fn read<S: SectorSource>(reader: &mut IfoReader<S>) -> Result<Self> {
        let attr = Self::from_bytes(&reader.read_array()?)?;
        trace!(
            "audio: {} {} ch, lang {}",
            attr.coding, attr.channels, attr.lang
        );
        Ok(attr)
    }

    pub fn sample_rate(&self) -> Option<u32> {
        match self.sample_frequency {
            0 => Some(48_000),
            1 => Some(96_000),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubpicAttr {
    pub coding: u8,
    pub lang_type: u8,
    pub lang: LangCode,
    pub lang_extension: u8,
    /// Caption kind (normal, large, children, director's comments, ...).
    pub code_extension: u8,
}

impl SubpicAttr {
    pub fn from_bytes(bytes: &[u8; SUBPIC_ATTR_SIZE]) -> Result<Self> {
        let mut bs = BsIoSliceReader::from_slice(bytes);

        let coding = bs.get_n(3)?;
        bs.skip_n(3)?;
        let lang_type = bs.get_n(2)?;
        bs.skip_n(8)?;
        let lang = LangCode::from(bs.get_n::<u16>(16)?);
        let lang_extension = bs.get_n(8)?;
        let code_extension = bs.get_n(8)?;

        Ok(Self {
            coding,
            lang_type,
            lang,
            lang_extension,
            code_extension,
        })
    }

    pub fn read<S: SectorSource>(reader: &mut IfoReader<S>) -> Result<Self> {
        Self::from_bytes(&reader.read_array()?)
    }
}

/// Stream slot layout of one attribute block.
#[derive(Debug, Clone, Copy)]
pub struct Domain {
    pub name: &'static str,
    pub audio_max: u8,
    pub subpic_slots: u8,
    pub subpic_max: u8,
}

impl Domain {
    pub const VMG_MENU: Self = Self {
        name: "VMG menu",
        audio_max: 1,
        subpic_slots: 1,
        subpic_max: 1,
    };
    pub const VTS_MENU: Self = Self {
        name: "VTS menu",
        audio_max: 1,
        subpic_slots: 28,
        subpic_max: 1,
    };
    pub const VTS_TITLE: Self = Self {
        name: "VTS title",
        audio_max: 8,
        subpic_slots: 32,
        subpic_max: 32,
    };

    const AUDIO_SLOTS: usize = 8;

    /// Bytes taken by the attribute block.
    pub const fn size(&self) -> usize {
        VIDEO_ATTR_SIZE + 2 + Self::AUDIO_SLOTS * AUDIO_ATTR_SIZE + 18
            + self.subpic_slots as usize * SUBPIC_ATTR_SIZE
    }
}

/// Video, audio and sub-picture attributes of a menu or title domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamAttributes {
    pub video: VideoAttr,
    pub audio: Vec<AudioAttr>,
    pub subpictures: Vec<SubpicAttr>,
}

impl StreamAttributes {
    pub fn read<S: SectorSource>(
        reader: &mut IfoReader<S>,
        options: &IfoOptions,
        domain: Domain,
    ) -> Result<Self> {
        let video = VideoAttr::read(reader)?;
        reader.dump_bytes(1)?;

        let audio_nb = stream_count(reader, options, domain.name, domain.audio_max)?;
        let audio = (0..audio_nb)
            .map(|_| AudioAttr::read(reader))
            .collect::<Result<Vec<_>>>()?;
        reader.dump_bytes((Domain::AUDIO_SLOTS - audio_nb as usize) * AUDIO_ATTR_SIZE + 17)?;

        let subpic_nb = stream_count(reader, options, domain.name, domain.subpic_max)?;
        let subpictures = (0..subpic_nb)
            .map(|_| SubpicAttr::read(reader))
            .collect::<Result<Vec<_>>>()?;
        reader.dump_bytes((domain.subpic_slots - subpic_nb) as usize * SUBPIC_ATTR_SIZE)?;

        trace!(
            "{}: {} audio, {} sub-picture streams",
            domain.name,
            audio.len(),
            subpictures.len()
        );

        Ok(Self {
            video,
            audio,
            subpictures,
        })
    }
}

fn stream_count<S: SectorSource>(
    reader: &mut IfoReader<S>,
    options: &IfoOptions,
    what: &'static str,
    max: u8,
) -> Result<u8> {
    let count = reader.read_byte()?;
    if count > max {
        log_or_err!(
            options,
            Level::Warn,
            IfoError::TooManyStreams { what, count, max }
        );
        return Ok(max);
    }
    Ok(count)
}
