use std::path::PathBuf;

use clap::Parser;

use crate::fetch::FetchOptions;

/// Downloads one URL with yt-dlp and reports progress on stdout, one JSON
/// event per line.
///
/// Without a URL argument, a `{"url": ..., "path": ...}` job is read from
/// stdin.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "ydl-bridge", version, about)]
pub struct Config {
    /// URL to download
    pub url: Option<String>,

    /// Destination directory (default: current directory)
    pub destination: Option<PathBuf>,

    /// yt-dlp executable; searched on PATH when not given
    #[arg(long = "yt-dlp", env = "YDL_BRIDGE_YTDLP", value_name = "PATH")]
    pub ytdlp: Option<PathBuf>,

    /// ffmpeg executable or directory; searched on PATH when not given
    #[arg(long, env = "YDL_BRIDGE_FFMPEG", value_name = "PATH")]
    pub ffmpeg: Option<PathBuf>,

    /// Highest video resolution to prefer
    #[arg(long, env = "YDL_BRIDGE_MAX_HEIGHT", default_value_t = 1080)]
    pub max_height: u32,

    /// yt-dlp format selector, replacing the default preference
    #[arg(long, env = "YDL_BRIDGE_FORMAT")]
    pub format: Option<String>,

    /// Subtitle language to fetch and embed
    #[arg(long, env = "YDL_BRIDGE_SUB_LANG", default_value = "en")]
    pub sub_lang: String,

    /// Skip subtitles entirely
    #[arg(long)]
    pub no_subs: bool,

    #[arg(long, env = "YDL_BRIDGE_CONCURRENT_FRAGMENTS", default_value_t = 5)]
    pub concurrent_fragments: u32,

    /// Report whether yt-dlp and ffmpeg can be found, then exit
    #[arg(long)]
    pub check: bool,
}

impl Config {
    /// `ffmpeg_location` is the already-resolved ffmpeg, if any.
    pub fn fetch_options(&self, ffmpeg_location: Option<PathBuf>) -> FetchOptions {
        FetchOptions {
            max_height: self.max_height,
            format: self.format.clone(),
            subtitle_lang: (!self.no_subs).then(|| self.sub_lang.clone()),
            concurrent_fragments: self.concurrent_fragments,
            ffmpeg_location,
            ..Default::default()
        }
    }
}
