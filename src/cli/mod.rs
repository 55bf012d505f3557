use anyhow::Result;
use log::Level;

use videots::css::Css;
use videots::css::crack::{ScanOptions, TitleKey};
use videots::ifo::{Ifo, IfoOptions};
use videots::utils::sector::SectorSource;

use command::{Cli, TitleArgs};

pub mod command;
pub mod crack;
pub mod descramble;
pub mod info;

pub fn ifo_options(cli: &Cli) -> IfoOptions {
    // Configure fail level based on strict mode
    let fail_level = if cli.strict {
        Level::Warn
    } else {
        Level::Error
    };
    IfoOptions { fail_level }
}

/// Resolves the title number and first VOB sector the target flags point at.
pub fn resolve_target<S: SectorSource>(
    source: &mut S,
    target: &TitleArgs,
    cli: &Cli,
) -> Result<(u16, u64)> {
    if let Some(start) = target.start_sector {
        return Ok((0, start));
    }

    let Some(title) = target.title else {
        return Ok((0, 0));
    };

    let mut ifo = Ifo::open(source, target.ifo_sector, ifo_options(cli))?;
    ifo.select_title(title)?;
    let start = ifo.title_start().unwrap_or(0);
    log::info!("Title {title} VOBs start at sector {start}");

    Ok((title, start))
}

/// Scans the title for its key.
pub fn recover_key<S: SectorSource>(
    source: &mut S,
    title: u16,
    start: u64,
    options: &ScanOptions,
) -> Result<TitleKey> {
    let mut css = Css::default();
    css.set_title(title, start);
    css.find_title_key(source, options)
}
