//! Key derivation used by the authentication handshake.
//!
//! [`derive_key`] turns a 10-byte challenge into a 5-byte key. The same
//! function computes the drive's answer (key1), the host's answer (key2)
//! and the bus key; only the challenge permutation and the variant
//! remapping differ between the three.

use log::trace;

use super::tables::{
    MANGLE0, MANGLE1, MANGLE2, PERM_CHALLENGE, PERM_VARIANT, SECRET, TAB4, VARIANTS,
};
use super::{CHALLENGE_SIZE, KEY_SIZE, Key};

/// Number of cipher variants a drive may use.
pub const VARIANT_COUNT: u8 = 32;

/// Which of the three handshake keys to derive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum KeyType {
    /// Drive response to the host challenge.
    Key1 = 0,
    /// Host response to the drive challenge.
    Key2 = 1,
    /// Session key derived from key1 and key2.
    BusKey = 2,
}

impl KeyType {
    fn variant_index(self, variant: u8) -> usize {
        let variant = (variant % VARIANT_COUNT) as usize;
        match self {
            KeyType::Key1 => variant,
            KeyType::Key2 | KeyType::BusKey => PERM_VARIANT[self as usize - 1][variant] as usize,
        }
    }
}

/// Derives a key of `key_type` from `challenge` under cipher `variant` (0..32).
pub fn derive_key(key_type: KeyType, variant: u8, challenge: &[u8; CHALLENGE_SIZE]) -> Key {
    let perm = &PERM_CHALLENGE[key_type as usize];
    let scratch: [u8; CHALLENGE_SIZE] = std::array::from_fn(|i| challenge[perm[i]]);

    let seed: [u8; KEY_SIZE] = std::array::from_fn(|i| scratch[KEY_SIZE + i] ^ SECRET[i]);
    let bits = keystream(&seed);

    let cse = VARIANTS[key_type.variant_index(variant)];
    trace!("derive {key_type:?}: variant {variant}, cse {cse:#04X}");

    let input: [u8; KEY_SIZE] = std::array::from_fn(|i| scratch[i]);

    let mut tmp1 = outer_round(&bits[25..30], &input, cse);
    tmp1[4] ^= tmp1[0];
    let mut tmp2 = outer_round(&bits[20..25], &tmp1, cse);
    tmp2[4] ^= tmp2[0];
    let mut tmp1 = inner_round(&bits[15..20], &tmp2, cse);
    tmp1[4] ^= tmp1[0];
    let mut tmp2 = inner_round(&bits[10..15], &tmp1, cse);
    tmp2[4] ^= tmp2[0];
    let mut tmp1 = outer_round(&bits[5..10], &tmp2, cse);
    tmp1[4] ^= tmp1[0];

    outer_round(&bits[0..5], &tmp1, cse)
}

/// 30 bytes of the combined 25-bit and 17-bit generator output, stored
/// last byte first.
fn keystream(seed: &[u8; KEY_SIZE]) -> [u8; 30] {
    let rev = |b: u32| TAB4[(b & 0xFF) as usize] as u32;

    let lfsr0 = ((seed[0] as u32) << 17)
        | ((seed[1] as u32) << 9)
        | (((seed[2] & !7) as u32) << 1)
        | 8
        | (seed[2] & 7) as u32;

    // Both registers run bit reversed so a whole byte shifts per step.
    let mut lfsr0 = (rev(lfsr0) << 17) | (rev(lfsr0 >> 8) << 9) | (rev(lfsr0 >> 16) << 1) | (lfsr0 >> 24);
    let mut lfsr1 = (rev(seed[4] as u32) << 9) | 0x100 | rev(seed[3] as u32);

    let mut bits = [0u8; 30];
    let mut val = 0u32;

    for slot in bits.iter_mut().rev() {
        let o0 = ((lfsr0 >> 12) ^ (lfsr0 >> 4) ^ (lfsr0 >> 3) ^ lfsr0) as u8;

        let mut o1 = (((lfsr1 >> 14) & 7) ^ lfsr1) as u8;
        o1 ^= (o1 << 3) ^ (o1 << 6);

        lfsr1 = (lfsr1 >> 8) ^ ((o1 as u32) << 9);
        lfsr0 = (lfsr0 >> 8) ^ ((o0 as u32) << 17);

        val += (!o0) as u32 + (!o1) as u32;
        *slot = (val & 0xFF) as u8;
        val >>= 8;
    }

    bits
}

/// Round producing its output through `MANGLE2`.
fn outer_round(bits: &[u8], input: &[u8; KEY_SIZE], cse: u8) -> [u8; KEY_SIZE] {
    let mut out = [0u8; KEY_SIZE];
    let mut term = 0;

    for i in (0..KEY_SIZE).rev() {
        let index = MANGLE1[(bits[i] ^ input[i]) as usize] ^ cse;
        out[i] = MANGLE2[index as usize] ^ term;
        term = input[i];
    }

    out
}

/// Round producing its output through `MANGLE0`.
fn inner_round(bits: &[u8], input: &[u8; KEY_SIZE], cse: u8) -> [u8; KEY_SIZE] {
    let mut out = [0u8; KEY_SIZE];
    let mut term = 0;

    for i in (0..KEY_SIZE).rev() {
        let index = MANGLE1[(bits[i] ^ input[i]) as usize] ^ cse;
        let index = MANGLE2[index as usize] ^ term;
        out[i] = MANGLE0[index as usize];
        term = input[i];
    }

    out
}
