//! Supporting infrastructure.
//!
//! Sector access, bit-level field decoding and error types shared by the
//! IFO parser and the CSS engine.

pub mod bitstream_io;
pub mod errors;
pub mod sector;

#[cfg(test)]
pub(crate) mod byteorder;
