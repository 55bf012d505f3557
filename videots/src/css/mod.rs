//! CSS authentication, title key recovery and descrambling.
//!
//! A [`Css`] session ties the pieces together:
//!
//! - [`auth`]: handshake with the drive, yielding the bus key and the
//!   decrypted disc key block.
//! - [`crack`]: title key recovery from scrambled sectors of a title.
//! - [`descramble`]: per-sector descrambling with the title key.
//!
//! Title key recovery does not depend on the handshake; an image file can
//! be descrambled without a drive.

use anyhow::Result;
use log::debug;

use crate::utils::sector::{SECTOR_SIZE, SectorSource};

pub mod auth;
pub mod crack;
pub mod crypt;
pub mod descramble;
pub mod tables;

use auth::{AuthState, DiscAuthState};
use crack::{ScanOptions, TitleKey};

pub const KEY_SIZE: usize = 5;
pub const CHALLENGE_SIZE: usize = 10;
pub const DISC_KEY_SIZE: usize = SECTOR_SIZE;

/// A 40-bit CSS key.
pub type Key = [u8; KEY_SIZE];

/// Disc key block as read from the drive.
pub type DiscKey = [u8; DISC_KEY_SIZE];

/// State of one CSS session on a disc.
#[derive(Debug, Clone)]
pub struct Css {
    pub disc: DiscAuthState,
    pub state: AuthState,
    pub agid: Option<u8>,
    /// Disc key block with the bus key removed.
    pub disc_key: Box<DiscKey>,
    /// Active title, 1-based. 0 before a title is selected.
    pub title: u16,
    /// First sector of the active title's VOB data.
    pub title_start: u64,
    pub title_key: Key,
}

impl Default for Css {
    fn default() -> Self {
        Self {
            disc: DiscAuthState::default(),
            state: AuthState::default(),
            agid: None,
            disc_key: Box::new([0; DISC_KEY_SIZE]),
            title: 0,
            title_start: 0,
            title_key: [0; KEY_SIZE],
        }
    }
}

impl Css {
    /// Makes `title` the active title and forgets the previous title key.
    pub fn set_title(&mut self, title: u16, start_sector: u64) {
        debug!("css: title {title} starts at sector {start_sector}");
        self.title = title;
        self.title_start = start_sector;
        self.title_key = [0; KEY_SIZE];
    }

    /// Recovers the key of the active title by scanning its sectors.
    ///
    /// An unscrambled title leaves the key zeroed.
    pub fn find_title_key<S: SectorSource>(
        &mut self,
        source: &mut S,
        options: &ScanOptions,
    ) -> Result<TitleKey> {
        let outcome = crack::find_title_key(source, self.title_start, options)?;
        self.title_key = match outcome {
            TitleKey::Key(key) => key,
            TitleKey::NotScrambled => [0; KEY_SIZE],
        };
        Ok(outcome)
    }

    /// Descrambles one sector of the active title in place.
    pub fn descramble(&self, sector: &mut [u8; SECTOR_SIZE]) {
        descramble::descramble_sector(&self.title_key, sector);
    }
}
