use serde::Serialize;
use videots::ifo::attr::{
    AspectRatio, AudioAttr, MpegVersion, StreamAttributes, SubpicAttr, VideoAttr, VideoStandard,
};
use videots::ifo::vmg::Vmg;
use videots::ifo::vts::Vts;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscSummary {
    pub provider: String,
    pub spec_version: String,
    pub title_sets: u16,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub menu_languages: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parental_countries: Vec<String>,
    pub titles: Vec<TitleSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_set: Option<TitleSetSummary>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TitleSummary {
    pub number: u16,
    pub title_set: u8,
    pub vts_title: u8,
    pub chapters: u16,
    pub angles: u8,
    pub sector: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TitleSetSummary {
    pub title: u16,
    pub base_sector: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vob_start: Option<u64>,
    pub video: String,
    pub audio: Vec<String>,
    pub subpictures: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    pub chapters: usize,
    pub cells: usize,
}

impl DiscSummary {
    pub fn new(vmg: &Vmg) -> Self {
        let mat = &vmg.mat;
        let titles = vmg
            .titles
            .iter()
            .flat_map(|table| table.titles.iter())
            .enumerate()
            .map(|(i, title)| TitleSummary {
                number: i as u16 + 1,
                title_set: title.title_set,
                vts_title: title.vts_title,
                chapters: title.chapter_nb,
                angles: title.angle_nb,
                sector: title.title_set_sector,
            })
            .collect();

        Self {
            provider: mat.provider_id.clone(),
            spec_version: format!("{}.{}", mat.spec_version >> 4, mat.spec_version & 0xF),
            title_sets: mat.title_set_nb,
            menu_languages: vmg
                .menus
                .iter()
                .flat_map(|menus| menus.units.iter())
                .map(|unit| unit.lang.to_string())
                .collect(),
            parental_countries: vmg
                .parental
                .iter()
                .flat_map(|parental| parental.countries.iter())
                .map(|country| country.country.to_string())
                .collect(),
            titles,
            title_set: None,
        }
    }

    pub fn with_title_set(mut self, title: u16, vts: &Vts, vts_title: Option<u8>) -> Self {
        let attrs: &StreamAttributes = &vts.mat.title_attributes;
        let chain = vts_title.and_then(|ttn| vts.title_chain(ttn));

        self.title_set = Some(TitleSetSummary {
            title,
            base_sector: vts.base,
            vob_start: vts.title_vobs_start(),
            video: video_str(&attrs.video),
            audio: attrs.audio.iter().map(audio_str).collect(),
            subpictures: attrs.subpictures.iter().map(subpic_str).collect(),
            duration: chain.map(|pgc| pgc.playback_time.to_string()),
            chapters: vts_title
                .and_then(|ttn| {
                    let chapters = vts.chapters.as_ref()?;
                    chapters.titles.get((ttn as usize).checked_sub(1)?)
                })
                .map_or(0, Vec::len),
            cells: vts.cells.as_ref().map_or(0, |cells| cells.cells.len()),
        });
        self
    }
}

fn video_str(video: &VideoAttr) -> String {
    let mpeg = match video.mpeg_version {
        MpegVersion::Mpeg1 => "MPEG-1".to_string(),
        MpegVersion::Mpeg2 => "MPEG-2".to_string(),
        MpegVersion::Reserved(v) => format!("MPEG Reserved({v})"),
    };
    let standard = match video.standard {
        VideoStandard::Ntsc => "NTSC".to_string(),
        VideoStandard::Pal => "PAL".to_string(),
        VideoStandard::Reserved(v) => format!("Reserved({v})"),
    };
    let aspect = match video.aspect_ratio {
        AspectRatio::Ratio4x3 => "4:3".to_string(),
        AspectRatio::Ratio16x9 => "16:9".to_string(),
        AspectRatio::Reserved(v) => format!("Reserved({v})"),
    };
    let size = video
        .resolution()
        .map(|(w, h)| format!(" {w}x{h}"))
        .unwrap_or_default();

    format!("{mpeg} {standard}{size} {aspect}")
}

fn audio_str(audio: &AudioAttr) -> String {
    let rate = audio
        .sample_rate()
        .map(|rate| format!(" {} kHz", rate / 1000))
        .unwrap_or_default();
    format!("{} {}ch{rate} [{}]", audio.coding, audio.channels, audio.lang)
}

fn subpic_str(subpic: &SubpicAttr) -> String {
    format!("[{}] ext {}", subpic.lang, subpic.code_extension)
}
