//! Playback time stamps
//!
//! Program chains and cells carry their duration as four BCD bytes:
//! hours, minutes, seconds, then frames with the frame rate in the top
//! two bits.

use std::fmt::{Display, Formatter};

use crate::utils::errors::IfoError;

/// Duration in hours, minutes, seconds and frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackTime {
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
    pub frames: u8,
    pub frame_rate: FrameRate,
}

impl Display for PlaybackTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}.{:02} @ {} fps",
            self.hours, self.minutes, self.seconds, self.frames, self.frame_rate
        )
    }
}

impl PlaybackTime {
    pub fn from_raw(raw: u32) -> Result<Self, IfoError> {
        let [h, m, s, f] = raw.to_be_bytes();
        let bcd = |v: u8| Self::parse_bcd8(v).ok_or(IfoError::InvalidBcdDigit(raw));

        Ok(Self {
            hours: bcd(h)?,
            minutes: bcd(m)?,
            seconds: bcd(s)?,
            frames: bcd(f & 0x3F)?,
            frame_rate: (f >> 6).into(),
        })
    }

    pub fn parse_bcd8(value: u8) -> Option<u8> {
        let hi = value >> 4;
        let lo = value & 0xF;

        if hi > 9 || lo > 9 {
            return None;
        }

        Some(10 * hi + lo)
    }

    /// Duration in seconds, frames included when the rate is known.
    pub fn as_secs_f64(&self) -> f64 {
        let whole = self.hours as f64 * 3600.0 + self.minutes as f64 * 60.0 + self.seconds as f64;
        match self.frame_rate.fps() {
            Some(fps) => whole + self.frames as f64 / fps,
            None => whole,
        }
    }
}

/// Frame rate code of a [`PlaybackTime`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FrameRate {
    #[default]
    Illegal,
    R25,
    R29_97,
    Reserved(u8),
}

impl FrameRate {
    pub fn fps(self) -> Option<f64> {
        match self {
            FrameRate::R25 => Some(25.0),
            FrameRate::R29_97 => Some(30000.0 / 1001.0),
            FrameRate::Illegal | FrameRate::Reserved(_) => None,
        }
    }
}

impl From<u8> for FrameRate {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Illegal,
            1 => Self::R25,
            3 => Self::R29_97,
            _ => Self::Reserved(value),
        }
    }
}

impl Display for FrameRate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameRate::Illegal => f.write_str("?"),
            FrameRate::R25 => f.write_str("25"),
            FrameRate::R29_97 => f.write_str("29.97"),
            FrameRate::Reserved(v) => write!(f, "Reserved({v})"),
        }
    }
}

#[test]
fn print_playback_time() {
    let time = PlaybackTime::from_raw(0x01_23_45_D2).unwrap();
    assert_eq!(
        time,
        PlaybackTime {
            hours: 1,
            minutes: 23,
            seconds: 45,
            frames: 12,
            frame_rate: FrameRate::R29_97,
        }
    );
    assert_eq!(format!("{time}"), "01:23:45.12 @ 29.97 fps");
}

#[test]
fn reject_bad_bcd() {
    assert!(matches!(
        PlaybackTime::from_raw(0x00_0A_00_40),
        Err(IfoError::InvalidBcdDigit(0x00_0A_00_40))
    ));
}

#[test]
fn pal_seconds() {
    let time = PlaybackTime::from_raw(0x00_01_00_50).unwrap();
    assert_eq!(time.frame_rate, FrameRate::R25);
    assert!((time.as_secs_f64() - 60.4).abs() < 1e-9);
}
