//! Title key recovery from scrambled sectors.
//!
//! ## Attack
//!
//! The keystream byte for payload offset `i` is `TAB1[scrambled[i]] ^ clear[i]`.
//! Given ten such bytes the 17-bit generator state is brute forced over its
//! 16 free bits. For every guess the 25-bit generator's output is solved for
//! four bytes, checked against the remaining six, then clocked backwards to
//! its seed. A seed of the form `k * 2 + 8 - (k & 7)` yields the key.
//!
//! ## Known plaintext
//!
//! MPEG padding and stuffing repeat with a short period. When the last clear
//! bytes before 0x80 repeat often enough, the payload is assumed to continue
//! the pattern for at least ten bytes.

use std::collections::HashMap;

use anyhow::{Result, bail};
use log::{debug, info, trace};

use super::descramble::{PAYLOAD_OFFSET, is_scrambled, lfsr0_output, sector_key};
use super::tables::{INV_TAB4, TAB1, TAB2, TAB3, TAB4, TAB5};
use super::Key;
use crate::utils::errors::CrackError;
use crate::utils::sector::{SECTOR_SIZE, Sector, SectorSource};

/// Number of keystream bytes the attack consumes.
pub const KNOWN_PLAINTEXT_SIZE: usize = 10;

const TRY_COUNT: u32 = 0x10000;

/// Every title key the attack validates for one sector, in ascending `try` order.
///
/// ```rust,ignore
/// let mut candidates = KeyCandidates::new(&scrambled, &clear, &sector_key);
/// let first = candidates.next();
/// ```
#[derive(Debug, Clone)]
pub struct KeyCandidates {
    keystream: [u8; KNOWN_PLAINTEXT_SIZE],
    sector_key: Key,
    next_try: u32,
}

impl KeyCandidates {
    pub fn new(
        scrambled: &[u8; KNOWN_PLAINTEXT_SIZE],
        clear: &[u8; KNOWN_PLAINTEXT_SIZE],
        sector_key: &Key,
    ) -> Self {
        Self {
            keystream: std::array::from_fn(|i| TAB1[scrambled[i] as usize] ^ clear[i]),
            sector_key: *sector_key,
            next_try: 0,
        }
    }

    /// Tests one value of the 17-bit generator state.
    fn attempt(&self, try_value: u32) -> Option<Key> {
        let mut t1 = (try_value >> 8) | 0x100;
        let mut t2 = try_value & 0xFF;
        let mut t3: u32 = 0;
        let mut t5: u32 = 0;

        // Solve four output bytes of the 25-bit generator.
        for &k in &self.keystream[..4] {
            let t4 = clock17(&mut t1, &mut t2);

            let mut t6 = k as u32;
            if t5 != 0 {
                t6 = (t6 + 0xFF) & 0xFF;
            }
            if t6 < t4 {
                t6 += 0x100;
            }
            t6 -= t4;
            t5 += t6 + t4;

            t3 = (t3 << 8) | INV_TAB4[t6 as usize] as u32;
            t5 >>= 8;
        }

        let candidate = t3;

        // Confirm against the other six.
        for &k in &self.keystream[4..] {
            let t4 = clock17(&mut t1, &mut t2);

            let t6 = lfsr0_output(t3);
            t3 = (t3 << 8) | t6;

            t5 += TAB4[t6 as usize] as u32 + t4;
            if (t5 & 0xFF) as u8 != k {
                return None;
            }
            t5 >>= 8;
        }

        // Clock the 25-bit generator back to its seed.
        let mut t3 = candidate;
        for _ in 0..4 {
            let out = t3 & 0xFF;
            t3 >>= 8;
            for j in 0..256 {
                t3 = (t3 & 0x1FFFF) | (j << 17);
                if lfsr0_output(t3) == out {
                    break;
                }
            }
        }

        let base = (t3 >> 1).wrapping_sub(4);
        let seed = (0..8).map(|d| base.wrapping_add(d)).find(|&k| {
            k.wrapping_mul(2).wrapping_add(8).wrapping_sub(k & 7) == t3
        })?;

        let raw: Key = [
            (try_value >> 8) as u8,
            (try_value & 0xFF) as u8,
            (seed & 0xFF) as u8,
            ((seed >> 8) & 0xFF) as u8,
            ((seed >> 16) & 0xFF) as u8,
        ];

        Some(std::array::from_fn(|i| raw[i] ^ self.sector_key[i]))
    }
}

/// Clocks the 17-bit generator one byte and returns its output term.
#[inline(always)]
fn clock17(t1: &mut u32, t2: &mut u32) -> u32 {
    let t4 = (TAB2[*t2 as usize] ^ TAB3[*t1 as usize]) as u32;
    *t2 = *t1 >> 1;
    *t1 = ((*t1 & 1) << 8) ^ t4;
    TAB5[t4 as usize] as u32
}

impl Iterator for KeyCandidates {
    type Item = Key;

    fn next(&mut self) -> Option<Key> {
        while self.next_try < TRY_COUNT {
            let try_value = self.next_try;
            self.next_try += 1;

            if let Some(key) = self.attempt(try_value) {
                trace!("try {try_value:#06X} validates key {key:02X?}");
                return Some(key);
            }
        }

        None
    }
}

/// Recovers the title key from ten scrambled payload bytes and their clear
/// text. Returns the key of the lowest validating `try`, or `None`.
pub fn crack_title_key(
    scrambled: &[u8; KNOWN_PLAINTEXT_SIZE],
    clear: &[u8; KNOWN_PLAINTEXT_SIZE],
    sector_key: &Key,
) -> Option<Key> {
    KeyCandidates::new(scrambled, clear, sector_key).next()
}

/// Predicts the first ten clear payload bytes of a scrambled sector.
///
/// Looks for the period in `2..0x30` with the longest backwards repeat ending
/// at 0x7F. The repeat must exceed 20 bytes and cover at least two periods.
pub fn predict_plaintext(sector: &Sector) -> Option<[u8; KNOWN_PLAINTEXT_SIZE]> {
    let mut best_len = 0;
    let mut best_period = 0;

    for period in 2..0x30 {
        let mut len = period;
        while len < PAYLOAD_OFFSET && sector[0x7F - (len % period)] == sector[0x7F - len] {
            len += 1;
        }

        if len > best_len && len > period {
            best_len = len;
            best_period = period;
        }
    }

    if best_len <= 20 || best_len / best_period < 2 {
        return None;
    }

    let start = PAYLOAD_OFFSET - (best_len / best_period) * best_period;
    trace!("plaintext repeat of {best_len} bytes, period {best_period}, from {start:#X}");

    Some(std::array::from_fn(|i| sector[start + i]))
}

/// Runs the attack on one sector if its plaintext can be predicted.
pub fn sector_candidates(sector: &Sector) -> Option<KeyCandidates> {
    let clear = predict_plaintext(sector)?;
    let scrambled = std::array::from_fn(|i| sector[PAYLOAD_OFFSET + i]);

    Some(KeyCandidates::new(&scrambled, &clear, &sector_key(sector)))
}

/// Tuning of the title key scan.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Number of times one key must be recovered before the scan stops.
    /// With 1 the first recovered key is accepted.
    pub required_hits: usize,
    /// Upper bound on sectors read; `None` scans to the end of the medium.
    pub max_sectors: Option<u64>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            required_hits: 1,
            max_sectors: None,
        }
    }
}

/// Result of a successful title key scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleKey {
    /// No scrambled sector was seen.
    NotScrambled,
    /// Key recovered from the stream.
    Key(Key),
}

/// Tally of recovered keys across sectors.
#[derive(Debug, Default)]
struct KeyRegistry {
    hits: HashMap<Key, usize>,
    order: Vec<Key>,
}

impl KeyRegistry {
    fn register(&mut self, key: Key) -> usize {
        let count = self.hits.entry(key).or_insert(0);
        if *count == 0 {
            self.order.push(key);
        }
        *count += 1;
        *count
    }

    fn distinct(&self) -> usize {
        self.order.len()
    }

    /// Most frequent key, earliest registered on ties.
    fn best(&self) -> Option<Key> {
        let mut best: Option<(Key, usize)> = None;
        for key in &self.order {
            let count = self.hits[key];
            if best.is_none_or(|(_, c)| count > c) {
                best = Some((*key, count));
            }
        }
        best.map(|(key, _)| key)
    }
}

/// Scans sectors from `start` until a title key is recovered.
///
/// Fails with [`CrackError::NoKeyFound`] when scrambled sectors were seen but
/// none yielded a key before the end of the stream.
pub fn find_title_key<S: SectorSource>(
    source: &mut S,
    start: u64,
    options: &ScanOptions,
) -> Result<TitleKey> {
    let required_hits = options.required_hits.max(1);
    let mut registry = KeyRegistry::default();
    let mut buf: Sector = [0; SECTOR_SIZE];
    let mut scanned = 0u64;
    let mut scrambled = 0u64;

    debug!("scanning for title key from sector {start}");

    while options.max_sectors.is_none_or(|max| scanned < max) {
        let lba = start + scanned;
        if !source.read_sector(lba, &mut buf)? {
            break;
        }
        scanned += 1;

        if !is_scrambled(&buf) {
            continue;
        }
        scrambled += 1;

        let Some(candidates) = sector_candidates(&buf) else {
            continue;
        };

        for key in candidates {
            let count = registry.register(key);
            debug!("sector {lba}: candidate key {key:02X?} seen {count} times");

            if required_hits == 1 {
                info!("title key {key:02X?} recovered from sector {lba}");
                return Ok(TitleKey::Key(key));
            }

            if registry.distinct() == 1 && count >= required_hits {
                info!("title key {key:02X?} confirmed {count} times at sector {lba}");
                return Ok(TitleKey::Key(key));
            }
        }
    }

    if scrambled == 0 {
        debug!("no scrambled sector in {scanned} sectors");
        return Ok(TitleKey::NotScrambled);
    }

    if let Some(key) = registry.best() {
        info!("title key {key:02X?} chosen from {} candidates", registry.distinct());
        return Ok(TitleKey::Key(key));
    }

    bail!(CrackError::NoKeyFound { scanned, scrambled });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::css::descramble::{
        SCRAMBLING_CONTROL_OFFSET, SECTOR_KEY_OFFSET, descramble_sector, scramble_sector,
    };
    use crate::utils::sector::ImageSource;

    const TITLE_KEY: Key = [0x4B, 0x1E, 0xA5, 0x3C, 0x92];

    /// A pack whose clear tail before 0x80 and first payload bytes are
    /// 0xFF padding, scrambled with `key`.
    fn padded_sector(key: &Key, salt: u8) -> Sector {
        let mut sector = [0u8; SECTOR_SIZE];
        sector[..4].copy_from_slice(&[0x00, 0x00, 0x01, 0xBA]);
        for (i, byte) in sector[4..SECTOR_KEY_OFFSET].iter_mut().enumerate() {
            *byte = (i as u8).wrapping_mul(7) ^ salt;
        }
        sector[SCRAMBLING_CONTROL_OFFSET] = 0x81;
        sector[SECTOR_KEY_OFFSET..SECTOR_KEY_OFFSET + 5]
            .copy_from_slice(&[0x21 ^ salt, 0x43, 0x65 ^ salt, 0x87, 0x09]);
        sector[0x59..0x80 + 16].fill(0xFF);
        for (i, byte) in sector[0x80 + 16..].iter_mut().enumerate() {
            *byte = (i as u8).wrapping_mul(13).wrapping_add(salt);
        }

        scramble_sector(key, &mut sector);
        sector
    }

    #[test]
    fn predicts_padding() {
        let sector = padded_sector(&TITLE_KEY, 0);
        assert_eq!(predict_plaintext(&sector), Some([0xFF; 10]));
    }

    #[test]
    fn rejects_short_repeats() {
        let mut sector = [0u8; SECTOR_SIZE];
        for (i, byte) in sector.iter_mut().enumerate() {
            *byte = (i * 31 % 251) as u8;
        }
        assert_eq!(predict_plaintext(&sector), None);
    }

    #[test]
    fn recovers_title_key() {
        let sector = padded_sector(&TITLE_KEY, 0);
        let scrambled: [u8; 10] = std::array::from_fn(|i| sector[PAYLOAD_OFFSET + i]);

        let key = crack_title_key(&scrambled, &[0xFF; 10], &sector_key(&sector));
        assert_eq!(key, Some(TITLE_KEY));
    }

    #[test]
    fn wrong_plaintext_finds_nothing_useful() {
        let sector = padded_sector(&TITLE_KEY, 0);
        let scrambled: [u8; 10] = std::array::from_fn(|i| sector[PAYLOAD_OFFSET + i]);

        let key = crack_title_key(&scrambled, &[0x00; 10], &sector_key(&sector));
        assert_ne!(key, Some(TITLE_KEY));
    }

    fn vob(sectors: usize, first_scrambled: usize) -> Vec<u8> {
        let mut data = Vec::with_capacity(sectors * SECTOR_SIZE);
        for n in 0..sectors {
            if n >= first_scrambled {
                data.extend_from_slice(&padded_sector(&TITLE_KEY, n as u8));
            } else {
                let mut sector = [0x5Au8; SECTOR_SIZE];
                sector[SCRAMBLING_CONTROL_OFFSET] = 0x81;
                data.extend_from_slice(&sector);
            }
        }
        data
    }

    #[test]
    fn scan_then_descramble_title() -> Result<()> {
        let data = vob(20, 7);
        let mut source = ImageSource::new(std::io::Cursor::new(data.clone()));

        let TitleKey::Key(key) = find_title_key(&mut source, 0, &ScanOptions::default())? else {
            panic!("title reported as not scrambled");
        };
        assert_eq!(key, TITLE_KEY);

        for n in 7..20 {
            let mut sector: Sector = [0; SECTOR_SIZE];
            sector.copy_from_slice(&data[n * SECTOR_SIZE..][..SECTOR_SIZE]);
            descramble_sector(&key, &mut sector);

            assert!(!is_scrambled(&sector));
            assert_eq!(&sector[0x80..0x90], &[0xFF; 16]);
            assert_eq!(sector[0x90], n as u8);
        }

        Ok(())
    }

    #[test]
    fn confirmed_scan() -> Result<()> {
        let mut source = ImageSource::new(std::io::Cursor::new(vob(6, 2)));
        let options = ScanOptions {
            required_hits: 3,
            max_sectors: None,
        };

        assert_eq!(find_title_key(&mut source, 0, &options)?, TitleKey::Key(TITLE_KEY));
        Ok(())
    }

    #[test]
    fn clear_title() -> Result<()> {
        let mut source = ImageSource::new(std::io::Cursor::new(vob(5, 5)));
        assert_eq!(
            find_title_key(&mut source, 0, &ScanOptions::default())?,
            TitleKey::NotScrambled
        );
        Ok(())
    }

    #[test]
    fn scrambled_without_plaintext_fails() {
        let mut sector = [0u8; SECTOR_SIZE];
        for (i, byte) in sector.iter_mut().enumerate() {
            *byte = (i * 31 % 251) as u8;
        }
        sector[SCRAMBLING_CONTROL_OFFSET] = 0x10;

        let mut source = ImageSource::new(std::io::Cursor::new(sector.to_vec()));
        let err = find_title_key(&mut source, 0, &ScanOptions::default()).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<CrackError>(),
            Some(CrackError::NoKeyFound {
                scanned: 1,
                scrambled: 1
            })
        ));
    }
}
