use anyhow::Result;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use super::command::{Cli, CrackArgs, format_key};
use super::{recover_key, resolve_target};
use crate::input::open_image;
use videots::css::crack::{ScanOptions, TitleKey};

pub fn cmd_crack(args: &CrackArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    log::info!("Recovering title key: {}", args.input.display());

    let mut source = open_image(&args.input)?;
    let (title, start) = resolve_target(&mut source, &args.target, cli)?;

    let options = ScanOptions {
        required_hits: args.confirm.max(1),
        max_sectors: args.max_sectors,
    };

    let pb = match multi {
        Some(multi) => {
            let pb = multi.add(ProgressBar::new_spinner());
            pb.set_style(ProgressStyle::with_template("{spinner:.green} {msg} | elapsed: {elapsed_precise}")?);
            pb.enable_steady_tick(std::time::Duration::from_millis(100));
            pb.set_message(format!("Scanning from sector {start}"));
            Some(pb)
        }
        None => None,
    };

    let outcome = recover_key(&mut source, title, start, &options);

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    match outcome? {
        TitleKey::Key(key) => println!("{}", format_key(&key)),
        TitleKey::NotScrambled => println!("Title is not scrambled"),
    }

    Ok(())
}
