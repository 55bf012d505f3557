//! DVD-Video navigation and CSS.
//!
//! ## Technical Overview
//!
//! A DVD-Video disc carries two kinds of data this crate understands:
//!
//! - **IFO files**: big-endian navigation tables. `VIDEO_TS.IFO` lists the
//!   titles and their title sets, each `VTS_nn_0.IFO` describes the program
//!   chains, cells and sector ranges of the titles it holds.
//! - **Scrambled VOB sectors**: 2048-byte MPEG program stream packs whose
//!   payload past byte 0x80 is scrambled with a 40-bit per-title key.
//!
//! ### Key tiers
//!
//! The drive and host authenticate each other and agree on a bus key. The
//! disc key block is read through the bus key, and title keys are read
//! through the disc key. Title keys can also be recovered straight from the
//! scrambled sectors, which is what [`css::crack`] does.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use videots::css::{Css, crack::{ScanOptions, TitleKey}};
//! use videots::ifo::{Ifo, IfoOptions};
//! use videots::utils::sector::ImageSource;
//!
//! let file = std::fs::File::open("disc.iso")?;
//! let mut ifo = Ifo::open(ImageSource::new(file), ifo_sector, IfoOptions::default())?;
//! ifo.select_title(1)?;
//! let start = ifo.title_start().unwrap_or_default();
//!
//! let mut source = ifo.into_inner();
//! let mut css = Css::default();
//! css.set_title(1, start);
//! if let TitleKey::Key(_) = css.find_title_key(&mut source, &ScanOptions::default())? {
//!     // descramble sectors with css.descramble(&mut sector)
//! }
//! ```

/// CSS authentication, title key recovery and sector descrambling.
///
/// - **Tables** ([`css::tables`]): cipher lookup tables
/// - **Key derivation** ([`css::crypt`]): keyed permutation used in the handshake
/// - **Authentication** ([`css::auth`]): drive handshake and disc key
/// - **Cracking** ([`css::crack`]): known-plaintext title key recovery
/// - **Descrambling** ([`css::descramble`]): per-sector stream cipher
pub mod css;

/// IFO navigation data.
///
/// - **Reader** ([`ifo::reader`]): sector-buffered big-endian cursor
/// - **Video manager** ([`ifo::vmg`]): title table, parental levels, title set attributes
/// - **Title sets** ([`ifo::vts`]): chapters, time maps, title program chains
/// - **Program chains** ([`ifo::pgc`]): cells, programs and commands
pub mod ifo;

/// Utility functions and supporting infrastructure.
///
/// - **Bitstream I/O** ([`utils::bitstream_io`]): packed field reading
/// - **Error Handling** ([`utils::errors`]): error types
/// - **Sectors** ([`utils::sector`]): sector sources
pub mod utils;
