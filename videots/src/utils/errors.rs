#[macro_export]
macro_rules! log_or_err {
    ($state:expr, $level:expr, $err:expr $(,)?) => {{
        if $level <= $state.fail_level {
            return Err($err.into());
        } else {
            match $level {
                ::log::Level::Error => ::log::error!("{}", $err),
                ::log::Level::Warn => ::log::warn!("{}", $err),
                ::log::Level::Info => ::log::info!("{}", $err),
                ::log::Level::Debug => ::log::debug!("{}", $err),
                ::log::Level::Trace => ::log::trace!("{}", $err),
            }
        }
    }};
}

#[derive(thiserror::Error, Debug)]
pub enum SectorError {
    #[error("Short read at sector {sector}: got {read} of 2048 bytes")]
    ShortRead { sector: u64, read: usize },

    #[error("Sector {0} lies past the end of the medium")]
    EndOfMedium(u64),

    #[error("Sector offset overflows the medium: base {base} + {offset}")]
    OffsetOverflow { base: u64, offset: u64 },
}

#[derive(thiserror::Error, Debug)]
pub enum IfoError {
    #[error("Unexpected identifier {found:?}, expected {expected:?}")]
    InvalidIdentifier {
        found: String,
        expected: &'static str,
    },

    #[error("{table}: start byte {start_byte:#X} lies outside the table end byte {end_byte:#X}")]
    StartByteOutOfBounds {
        table: &'static str,
        start_byte: u32,
        end_byte: u32,
    },

    #[error("{table}: {count} records of {record_size} bytes overrun end byte {end_byte:#X}")]
    CountOutOfBounds {
        table: &'static str,
        count: usize,
        record_size: usize,
        end_byte: u32,
    },

    #[error("{table} at byte {start:#X}: end byte {end_byte:#X} runs past the IFO end {ifo_end:#X}")]
    TableOverrunsIfo {
        table: &'static str,
        start: u64,
        end_byte: u32,
        ifo_end: u64,
    },

    #[error("{table}: end byte {end_byte:#X} leaves {remainder} trailing bytes")]
    TrailingBytes {
        table: &'static str,
        end_byte: u32,
        remainder: u32,
    },

    #[error("{what}: {count} streams declared, only {max} slots")]
    TooManyStreams {
        what: &'static str,
        count: u8,
        max: u8,
    },

    #[error("Program chain declares program {program} entry cell {cell}, only {cell_nb} cells")]
    ProgramMapOutOfRange { program: usize, cell: u8, cell_nb: u8 },

    #[error("Title {title} out of range: disc has {title_nb} titles")]
    TitleOutOfRange { title: u16, title_nb: u16 },

    #[error("Video manager has no title table")]
    MissingTitleTable,

    #[error("Invalid BCD digit in playback time {0:#010X}")]
    InvalidBcdDigit(u32),
}

#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error("AGID request failed {attempts} times")]
    AgidExhausted {
        attempts: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("Drive would not authenticate: no variant reproduces key1 {key1:02X?}")]
    NoMatchingVariant { key1: [u8; 5] },

    #[error("{step} failed")]
    Step {
        step: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Session is not authenticated")]
    NotAuthenticated,
}

#[derive(thiserror::Error, Debug)]
pub enum CrackError {
    #[error("No title key found in {scrambled} scrambled sectors out of {scanned}")]
    NoKeyFound { scanned: u64, scrambled: u64 },
}
