//! Static lookup tables for the CSS cipher.
//!
//! The stream cipher tables drive both the sector descrambler and the
//! title key cracker. The authentication tables feed [`derive_key`].
//!
//! [`derive_key`]: crate::css::crypt::derive_key

/// Substitution applied to every scrambled byte before the keystream XOR.
pub const TAB1: [u8; 256] = [
    0x33, 0x73, 0x3B, 0x26, 0x63, 0x23, 0x6B, 0x76,
    0x3E, 0x7E, 0x36, 0x2B, 0x6E, 0x2E, 0x66, 0x7B,
    0xD3, 0x93, 0xDB, 0x06, 0x43, 0x03, 0x4B, 0x96,
    0xDE, 0x9E, 0xD6, 0x0B, 0x4E, 0x0E, 0x46, 0x9B,
    0x57, 0x17, 0x5F, 0x82, 0xC7, 0x87, 0xCF, 0x12,
    0x5A, 0x1A, 0x52, 0x8F, 0xCA, 0x8A, 0xC2, 0x1F,
    0xD9, 0x99, 0xD1, 0x00, 0x49, 0x09, 0x41, 0x90,
    0xD8, 0x98, 0xD0, 0x01, 0x48, 0x08, 0x40, 0x91,
    0x3D, 0x7D, 0x35, 0x24, 0x6D, 0x2D, 0x65, 0x74,
    0x3C, 0x7C, 0x34, 0x25, 0x6C, 0x2C, 0x64, 0x75,
    0xDD, 0x9D, 0xD5, 0x04, 0x4D, 0x0D, 0x45, 0x94,
    0xDC, 0x9C, 0xD4, 0x05, 0x4C, 0x0C, 0x44, 0x95,
    0x59, 0x19, 0x51, 0x80, 0xC9, 0x89, 0xC1, 0x10,
    0x58, 0x18, 0x50, 0x81, 0xC8, 0x88, 0xC0, 0x11,
    0xD7, 0x97, 0xDF, 0x02, 0x47, 0x07, 0x4F, 0x92,
    0xDA, 0x9A, 0xD2, 0x0F, 0x4A, 0x0A, 0x42, 0x9F,
    0x53, 0x13, 0x5B, 0x86, 0xC3, 0x83, 0xCB, 0x16,
    0x5E, 0x1E, 0x56, 0x8B, 0xCE, 0x8E, 0xC6, 0x1B,
    0xB3, 0xF3, 0xBB, 0xA6, 0xE3, 0xA3, 0xEB, 0xF6,
    0xBE, 0xFE, 0xB6, 0xAB, 0xEE, 0xAE, 0xE6, 0xFB,
    0x37, 0x77, 0x3F, 0x22, 0x67, 0x27, 0x6F, 0x72,
    0x3A, 0x7A, 0x32, 0x2F, 0x6A, 0x2A, 0x62, 0x7F,
    0xB9, 0xF9, 0xB1, 0xA0, 0xE9, 0xA9, 0xE1, 0xF0,
    0xB8, 0xF8, 0xB0, 0xA1, 0xE8, 0xA8, 0xE0, 0xF1,
    0x5D, 0x1D, 0x55, 0x84, 0xCD, 0x8D, 0xC5, 0x14,
    0x5C, 0x1C, 0x54, 0x85, 0xCC, 0x8C, 0xC4, 0x15,
    0xBD, 0xFD, 0xB5, 0xA4, 0xED, 0xAD, 0xE5, 0xF4,
    0xBC, 0xFC, 0xB4, 0xA5, 0xEC, 0xAC, 0xE4, 0xF5,
    0x39, 0x79, 0x31, 0x20, 0x69, 0x29, 0x61, 0x70,
    0x38, 0x78, 0x30, 0x21, 0x68, 0x28, 0x60, 0x71,
    0xB7, 0xF7, 0xBF, 0xA2, 0xE7, 0xA7, 0xEF, 0xF2,
    0xBA, 0xFA, 0xB2, 0xAF, 0xEA, 0xAA, 0xE2, 0xFF,];

/// Feedback table of the 17-bit generator, indexed by its high byte.
pub const TAB2: [u8; 256] = [
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07,
    0x09, 0x08, 0x0B, 0x0A, 0x0D, 0x0C, 0x0F, 0x0E,
    0x12, 0x13, 0x10, 0x11, 0x16, 0x17, 0x14, 0x15,
    0x1B, 0x1A, 0x19, 0x18, 0x1F, 0x1E, 0x1D, 0x1C,
    0x24, 0x25, 0x26, 0x27, 0x20, 0x21, 0x22, 0x23,
    0x2D, 0x2C, 0x2F, 0x2E, 0x29, 0x28, 0x2B, 0x2A,
    0x36, 0x37, 0x34, 0x35, 0x32, 0x33, 0x30, 0x31,
    0x3F, 0x3E, 0x3D, 0x3C, 0x3B, 0x3A, 0x39, 0x38,
    0x49, 0x48, 0x4B, 0x4A, 0x4D, 0x4C, 0x4F, 0x4E,
    0x40, 0x41, 0x42, 0x43, 0x44, 0x45, 0x46, 0x47,
    0x5B, 0x5A, 0x59, 0x58, 0x5F, 0x5E, 0x5D, 0x5C,
    0x52, 0x53, 0x50, 0x51, 0x56, 0x57, 0x54, 0x55,
    0x6D, 0x6C, 0x6F, 0x6E, 0x69, 0x68, 0x6B, 0x6A,
    0x64, 0x65, 0x66, 0x67, 0x60, 0x61, 0x62, 0x63,
    0x7F, 0x7E, 0x7D, 0x7C, 0x7B, 0x7A, 0x79, 0x78,
    0x76, 0x77, 0x74, 0x75, 0x72, 0x73, 0x70, 0x71,
    0x92, 0x93, 0x90, 0x91, 0x96, 0x97, 0x94, 0x95,
    0x9B, 0x9A, 0x99, 0x98, 0x9F, 0x9E, 0x9D, 0x9C,
    0x80, 0x81, 0x82, 0x83, 0x84, 0x85, 0x86, 0x87,
    0x89, 0x88, 0x8B, 0x8A, 0x8D, 0x8C, 0x8F, 0x8E,
    0xB6, 0xB7, 0xB4, 0xB5, 0xB2, 0xB3, 0xB0, 0xB1,
    0xBF, 0xBE, 0xBD, 0xBC, 0xBB, 0xBA, 0xB9, 0xB8,
    0xA4, 0xA5, 0xA6, 0xA7, 0xA0, 0xA1, 0xA2, 0xA3,
    0xAD, 0xAC, 0xAF, 0xAE, 0xA9, 0xA8, 0xAB, 0xAA,
    0xDB, 0xDA, 0xD9, 0xD8, 0xDF, 0xDE, 0xDD, 0xDC,
    0xD2, 0xD3, 0xD0, 0xD1, 0xD6, 0xD7, 0xD4, 0xD5,
    0xC9, 0xC8, 0xCB, 0xCA, 0xCD, 0xCC, 0xCF, 0xCE,
    0xC0, 0xC1, 0xC2, 0xC3, 0xC4, 0xC5, 0xC6, 0xC7,
    0xFF, 0xFE, 0xFD, 0xFC, 0xFB, 0xFA, 0xF9, 0xF8,
    0xF6, 0xF7, 0xF4, 0xF5, 0xF2, 0xF3, 0xF0, 0xF1,
    0xED, 0xEC, 0xEF, 0xEE, 0xE9, 0xE8, 0xEB, 0xEA,
    0xE4, 0xE5, 0xE6, 0xE7, 0xE0, 0xE1, 0xE2, 0xE3,];

/// Feedback table of the 17-bit generator, indexed by its low nine bits.
pub const TAB3: [u8; 512] = tab3();

/// Bit reversal of a byte.
pub const TAB4: [u8; 256] = tab4();

/// Inverted bit reversal of a byte.
pub const TAB5: [u8; 256] = tab5();

/// Inverse permutation of [`TAB1`].
pub const INV_TAB1: [u8; 256] = invert(&TAB1);

/// Inverse permutation of [`TAB4`].
pub const INV_TAB4: [u8; 256] = invert(&TAB4);

/// Challenge byte order for Key1, Key2 and the bus key.
pub const PERM_CHALLENGE: [[usize; 10]; 3] = [
    [1, 3, 0, 7, 5, 2, 9, 6, 4, 8],
    [6, 1, 9, 3, 8, 5, 7, 4, 0, 2],
    [4, 0, 3, 5, 7, 2, 8, 6, 1, 9],
];

/// Variant remapping for Key2 and the bus key. Key1 uses the variant as is.
pub const PERM_VARIANT: [[u8; 32]; 2] = [
    [
        0x0A, 0x08, 0x0E, 0x0C, 0x0B, 0x09, 0x0F, 0x0D, 0x1A, 0x18, 0x1E, 0x1C, 0x1B, 0x19, 0x1F,
        0x1D, 0x02, 0x00, 0x06, 0x04, 0x03, 0x01, 0x07, 0x05, 0x12, 0x10, 0x16, 0x14, 0x13, 0x11,
        0x17, 0x15,
    ],
    [
        0x12, 0x1A, 0x16, 0x1E, 0x02, 0x0A, 0x06, 0x0E, 0x10, 0x18, 0x14, 0x1C, 0x00, 0x08, 0x04,
        0x0C, 0x13, 0x1B, 0x17, 0x1F, 0x03, 0x0B, 0x07, 0x0F, 0x11, 0x19, 0x15, 0x1D, 0x01, 0x09,
        0x05, 0x0D,
    ],
];

pub const SECRET: [u8; 5] = [0xE2, 0xA3, 0x45, 0x10, 0xF4];

/// Per-variant XOR term mixed into every mangling round.
pub const VARIANTS: [u8; 32] = [
    0x00, 0x01, 0x04, 0x05, 0x10, 0x11, 0x14, 0x15, 0x20, 0x21, 0x24, 0x25, 0x30, 0x31, 0x34, 0x35,
    0x80, 0x81, 0x84, 0x85, 0x90, 0x91, 0x94, 0x95, 0xA0, 0xA1, 0xA4, 0xA5, 0xB0, 0xB1, 0xB4, 0xB5,
];

/// Output substitution of the inner mangling rounds.
pub const MANGLE0: [u8; 256] = mangle0();

// TODO: replace MANGLE1 and MANGLE2 with the published CSS authentication
// S-boxes. Until then host and drive sides of the handshake agree with each
// other but not with a real drive.

/// Index substitution of every mangling round.
pub const MANGLE1: [u8; 256] = permutation(0x5D, 0xA7);

/// Output substitution of the outer mangling rounds.
pub const MANGLE2: [u8; 256] = permutation(0x8B, 0x1E);

const fn tab3() -> [u8; 512] {
    const PATTERN: [u8; 8] = [0x00, 0x24, 0x49, 0x6D, 0x92, 0xB6, 0xDB, 0xFF];

    let mut table = [0u8; 512];
    let mut i = 0;
    while i < 512 {
        table[i] = PATTERN[i & 7];
        i += 1;
    }
    table
}

const fn tab4() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = (i as u8).reverse_bits();
        i += 1;
    }
    table
}

const fn tab5() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = !(i as u8).reverse_bits();
        i += 1;
    }
    table
}

/// Each byte XORed with itself rotated right by one.
const fn mangle0() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = (i as u8) ^ (i as u8).rotate_right(1);
        i += 1;
    }
    table
}

/// Affine byte permutation `x * mul + add`. `mul` must be odd.
const fn permutation(mul: u8, add: u8) -> [u8; 256] {
    assert!(mul & 1 == 1);

    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = (i as u8).wrapping_mul(mul).wrapping_add(add).rotate_left(3);
        i += 1;
    }
    table
}

const fn invert(table: &[u8; 256]) -> [u8; 256] {
    let mut seen = [false; 256];
    let mut inverse = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let v = table[i] as usize;
        assert!(!seen[v], "table is not a permutation");
        seen[v] = true;
        inverse[v] = i as u8;
        i += 1;
    }
    inverse
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_tables() {
        assert_eq!(&TAB3[..8], &[0x00, 0x24, 0x49, 0x6D, 0x92, 0xB6, 0xDB, 0xFF]);
        assert_eq!(TAB3[511], 0xFF);
        assert_eq!(&TAB4[..4], &[0x00, 0x80, 0x40, 0xC0]);
        assert_eq!(&TAB5[..4], &[0xFF, 0x7F, 0xBF, 0x3F]);
        assert_eq!(TAB5[255], 0x00);
    }

    #[test]
    fn inner_round_output_table() {
        assert_eq!(
            &MANGLE0[..10],
            &[0x00, 0x81, 0x03, 0x82, 0x06, 0x87, 0x05, 0x84, 0x0C, 0x8D]
        );
        assert_eq!(MANGLE0[0x80], 0xC0);
        assert_eq!(MANGLE0[0xFF], 0x00);
    }

    #[test]
    fn inverses() {
        for i in 0..=255u8 {
            assert_eq!(INV_TAB1[TAB1[i as usize] as usize], i);
            assert_eq!(INV_TAB4[TAB4[i as usize] as usize], i);
        }
    }

    #[test]
    fn variant_permutations_are_bijective() {
        for perm in PERM_VARIANT {
            let mut seen = [false; 32];
            for v in perm {
                assert!(!seen[v as usize]);
                seen[v as usize] = true;
            }
        }
    }
}
