use anyhow::Result;

use super::command::{Cli, InfoArgs, OutputFormat};
use super::ifo_options;
use crate::input::open_image;
use crate::summary::{DiscSummary, TitleSetSummary};
use videots::ifo::Ifo;

pub fn cmd_info(args: &InfoArgs, cli: &Cli) -> Result<()> {
    log::info!("Reading disc structure: {}", args.input.display());

    let source = open_image(&args.input)?;
    let mut ifo = Ifo::open(source, args.ifo_sector, ifo_options(cli))?;

    let mut summary = DiscSummary::new(&ifo.vmg);

    if let Some(title) = args.title {
        let vts_title = ifo.vmg.title(title)?.vts_title;
        let vts = ifo.select_title(title)?;
        summary = summary.with_title_set(title, vts, Some(vts_title));
    }

    match args.format {
        OutputFormat::Yaml => print!("{}", serde_yaml_ng::to_string(&summary)?),
        OutputFormat::Text => print_text(&summary),
    }

    Ok(())
}

fn print_text(summary: &DiscSummary) {
    println!();
    println!("Video Manager");
    println!("=============");
    println!();
    println!("Provider                    {}", summary.provider);
    println!("Specification               {}", summary.spec_version);
    println!("Title sets                  {}", summary.title_sets);
    if !summary.menu_languages.is_empty() {
        println!("Menu languages              {}", summary.menu_languages.join(", "));
    }
    if !summary.parental_countries.is_empty() {
        println!(
            "Parental countries          {}",
            summary.parental_countries.join(", ")
        );
    }
    println!();

    if !summary.titles.is_empty() {
        println!("Title  VTS  VTS title  Chapters  Angles  Sector");
        for title in &summary.titles {
            println!(
                "{:>5}  {:>3}  {:>9}  {:>8}  {:>6}  {}",
                title.number,
                title.title_set,
                title.vts_title,
                title.chapters,
                title.angles,
                title.sector
            );
        }
        println!();
    }

    if let Some(title_set) = &summary.title_set {
        print_title_set(title_set);
    }
}

fn print_title_set(ts: &TitleSetSummary) {
    println!("Title {}", ts.title);
    println!("========");
    println!();
    println!("Title set sector            {}", ts.base_sector);
    if let Some(start) = ts.vob_start {
        println!("VOB start sector            {start}");
    }
    if let Some(duration) = &ts.duration {
        println!("Duration                    {duration}");
    }
    println!("Chapters                    {}", ts.chapters);
    println!("Cells                       {}", ts.cells);
    println!("Video                       {}", ts.video);
    for (i, audio) in ts.audio.iter().enumerate() {
        println!("Audio {:<2}                    {audio}", i + 1);
    }
    for (i, subp) in ts.subpictures.iter().enumerate() {
        println!("Subpicture {:<2}               {subp}", i + 1);
    }
    println!();
}
