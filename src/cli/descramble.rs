use std::fs::File;
use std::io::{BufWriter, Write};

use anyhow::{Result, bail};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use super::command::{Cli, DescrambleArgs, format_key};
use super::{recover_key, resolve_target};
use crate::input::{InputReader, open_image};
use videots::css::crack::{ScanOptions, TitleKey};
use videots::css::descramble::{descramble_sector, is_scrambled};
use videots::utils::sector::SECTOR_SIZE;

pub fn cmd_descramble(
    args: &DescrambleArgs,
    cli: &Cli,
    multi: Option<&MultiProgress>,
) -> Result<()> {
    let mut input = InputReader::new(&args.input)?;

    let (key, start) = if input.is_pipe() {
        let Some(key) = args.key else {
            bail!("--key is required when reading from a pipe");
        };
        (key, args.target.start_sector.unwrap_or(0))
    } else {
        let mut source = open_image(&args.input)?;
        let (title, start) = resolve_target(&mut source, &args.target, cli)?;

        match args.key {
            Some(key) => (key, start),
            None => {
                let options = ScanOptions {
                    required_hits: args.confirm.max(1),
                    ..Default::default()
                };
                match recover_key(&mut source, title, start, &options)? {
                    TitleKey::Key(key) => (key, start),
                    TitleKey::NotScrambled => {
                        log::warn!("Title is not scrambled, copying input unchanged");
                        ([0; 5], start)
                    }
                }
            }
        }
    };

    log::info!(
        "Descrambling {} from sector {start} with key {}",
        args.input.display(),
        format_key(&key)
    );

    let pb = match multi {
        Some(multi) => Some(create_progress_bar(multi, &args.input, input.is_pipe())?),
        None => None,
    };

    let mut output = BufWriter::new(File::create(&args.output)?);
    let mut descrambled = 0u64;

    let total = input.process_sectors(|lba, sector| {
        if lba >= start && is_scrambled(sector) {
            descramble_sector(&key, sector);
            descrambled += 1;
        }
        output.write_all(sector.as_slice())?;

        if let Some(pb) = &pb {
            pb.inc(1);
        }
        Ok(true)
    })?;
    output.flush()?;

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    log::info!(
        "Wrote {total} sectors to {}, {descrambled} descrambled",
        args.output.display()
    );

    Ok(())
}

fn create_progress_bar(
    multi: &MultiProgress,
    input: &std::path::Path,
    is_pipe: bool,
) -> Result<ProgressBar> {
    let total = if is_pipe {
        None
    } else {
        Some(std::fs::metadata(input)?.len() / SECTOR_SIZE as u64)
    };

    let pb = if let Some(total) = total {
        let pb = multi.add(ProgressBar::new(total));
        pb.set_style(ProgressStyle::with_template(
            "{bar:40.cyan/blue} {pos}/{len} sectors ({percent}%)\nelapsed: {elapsed_precise} | ETA: {eta_precise}",
        )?);
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    } else {
        let pb = multi.add(ProgressBar::new_spinner());
        pb.set_style(ProgressStyle::with_template(
            "{spinner:.green} {pos} sectors | elapsed: {elapsed_precise}",
        )?);
        pb
    };
    Ok(pb)
}
