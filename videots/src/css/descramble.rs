//! Sector descrambling.
//!
//! A scrambled sector keeps its first 0x80 bytes (pack header, PES header)
//! in the clear. The payload from 0x80 to the end of the sector is XORed
//! with a keystream from two generators seeded by the title key and the
//! five sector key bytes at 0x54.

use super::tables::{INV_TAB1, TAB1, TAB2, TAB3, TAB4, TAB5};
use super::{KEY_SIZE, Key};
use crate::utils::sector::{SECTOR_SIZE, Sector};

/// Offset of the PES flags byte holding `PES_scrambling_control`.
pub const SCRAMBLING_CONTROL_OFFSET: usize = 0x14;

/// Offset of the per-sector key bytes.
pub const SECTOR_KEY_OFFSET: usize = 0x54;

/// First scrambled byte.
pub const PAYLOAD_OFFSET: usize = 0x80;

const SCRAMBLING_MASK: u8 = 0x30;

/// Returns true if the sector's `PES_scrambling_control` bits are set.
#[inline]
pub fn is_scrambled(sector: &Sector) -> bool {
    sector[SCRAMBLING_CONTROL_OFFSET] & SCRAMBLING_MASK != 0
}

/// The per-sector key term found at [`SECTOR_KEY_OFFSET`].
#[inline]
pub fn sector_key(sector: &Sector) -> Key {
    std::array::from_fn(|i| sector[SECTOR_KEY_OFFSET + i])
}

/// Keystream generator state shared by descrambling and scrambling.
#[derive(Debug, Clone)]
pub(crate) struct Keystream {
    t1: u32,
    t2: u32,
    t3: u32,
    t5: u32,
}

impl Keystream {
    pub(crate) fn new(key: &Key, sector_key: &Key) -> Self {
        let t1 = (key[0] ^ sector_key[0]) as u32 | 0x100;
        let t2 = (key[1] ^ sector_key[1]) as u32;
        let t3 = le24(&key[2..KEY_SIZE]) ^ le24(&sector_key[2..KEY_SIZE]);
        let t4 = t3 & 7;

        Self {
            t1,
            t2,
            t3: t3 * 2 + 8 - t4,
            t5: 0,
        }
    }

    /// Advances both generators by one byte and returns the keystream byte.
    #[inline(always)]
    pub(crate) fn next_byte(&mut self) -> u8 {
        let t4 = (TAB2[self.t2 as usize] ^ TAB3[self.t1 as usize]) as u32;
        self.t2 = self.t1 >> 1;
        self.t1 = ((self.t1 & 1) << 8) ^ t4;
        let t4 = TAB5[t4 as usize] as u32;

        let t6 = lfsr0_output(self.t3);
        self.t3 = (self.t3 << 8) | t6;
        let t6 = TAB4[t6 as usize] as u32;

        self.t5 += t6 + t4;
        let byte = (self.t5 & 0xFF) as u8;
        self.t5 >>= 8;
        byte
    }
}

/// Output byte of the 25-bit generator for its current state.
#[inline(always)]
pub(crate) fn lfsr0_output(t3: u32) -> u32 {
    (((((((t3 >> 3) ^ t3) >> 1) ^ t3) >> 8) ^ t3) >> 5) & 0xFF
}

#[inline]
fn le24(bytes: &[u8]) -> u32 {
    bytes[0] as u32 | (bytes[1] as u32) << 8 | (bytes[2] as u32) << 16
}

/// Descrambles `sector` in place with `key` and clears its scrambling bits.
///
/// Sectors whose scrambling bits are clear are left untouched.
pub fn descramble_sector(key: &Key, sector: &mut Sector) {
    if !is_scrambled(sector) {
        return;
    }

    let mut keystream = Keystream::new(key, &sector_key(sector));

    for byte in &mut sector[PAYLOAD_OFFSET..] {
        *byte = TAB1[*byte as usize] ^ keystream.next_byte();
    }

    sector[SCRAMBLING_CONTROL_OFFSET] &= 0x8F;
}

/// Scrambles a clear sector with `key`, the inverse of [`descramble_sector`].
///
/// Marks the sector as scrambled; the sector key bytes at 0x54 are used as
/// they are.
pub fn scramble_sector(key: &Key, sector: &mut Sector) {
    let mut keystream = Keystream::new(key, &sector_key(sector));

    for byte in &mut sector[PAYLOAD_OFFSET..] {
        *byte = INV_TAB1[(*byte ^ keystream.next_byte()) as usize];
    }

    sector[SCRAMBLING_CONTROL_OFFSET] = (sector[SCRAMBLING_CONTROL_OFFSET] & 0x8F) | 0x10;
}
