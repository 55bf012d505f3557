use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use anyhow::{Result, bail};
use videots::utils::errors::SectorError;
use videots::utils::sector::{ImageSource, SECTOR_SIZE, Sector};

/// Sequential sector input from a file or a pipe
pub struct InputReader {
    reader: Box<dyn Read>,
    is_pipe: bool,
    sector: u64,
}

impl InputReader {
    /// Create a new InputReader from a path
    /// Use "-" for stdin pipe input
    pub fn new<P: AsRef<Path>>(input_path: P) -> Result<Self> {
        let path_str = input_path.as_ref().to_string_lossy();
        let is_pipe = path_str == "-";

        let reader: Box<dyn Read> = if is_pipe {
            Box::new(io::stdin().lock())
        } else {
            let file = File::open(input_path)?;
            Box::new(BufReader::new(file))
        };

        Ok(Self {
            reader,
            is_pipe,
            sector: 0,
        })
    }

    /// Check if this is pipe input
    pub fn is_pipe(&self) -> bool {
        self.is_pipe
    }

    /// Read the next whole sector
    /// Returns false at the end of input, fails on a trailing partial sector
    pub fn read_sector(&mut self, sector: &mut Sector) -> Result<bool> {
        let mut filled = 0;
        while filled < SECTOR_SIZE {
            match self.reader.read(&mut sector[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        match filled {
            0 => Ok(false),
            SECTOR_SIZE => {
                self.sector += 1;
                Ok(true)
            }
            read => bail!(SectorError::ShortRead {
                sector: self.sector,
                read
            }),
        }
    }

    /// Process the input sector by sector
    /// The callback receives the sector number and data and should return
    /// Ok(true) to continue or Ok(false) to stop
    pub fn process_sectors<F>(&mut self, mut callback: F) -> Result<u64>
    where
        F: FnMut(u64, &mut Sector) -> Result<bool>,
    {
        let mut buffer = Box::new([0u8; SECTOR_SIZE]);
        let mut processed = 0;

        while self.read_sector(&mut buffer)? {
            processed += 1;
            if !callback(self.sector - 1, &mut buffer)? {
                break;
            }
        }

        Ok(processed)
    }
}

/// Open a disc image or VOB file for random sector access
pub fn open_image<P: AsRef<Path>>(path: P) -> Result<ImageSource<BufReader<File>>> {
    if path.as_ref().to_string_lossy() == "-" {
        bail!("random access input required, cannot read from a pipe");
    }

    let file = File::open(path)?;
    Ok(ImageSource::new(BufReader::new(file)))
}
