use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::{job::Job, locate, progress::ProgressTick};

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("{0}")]
    NotFound(#[from] locate::LocateError),
    #[error("Failed to start {binary}: {source}")]
    Spawn {
        binary: String,
        source: std::io::Error,
    },
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("{0}")]
    Exited(String),
}

/// Severity of a diagnostic line from the fetch capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostProcessStatus {
    Started,
    Finished,
}

/// A post-processor (merger, subtitle embedder, ...) changing state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostProcess {
    pub name: String,
    pub status: PostProcessStatus,
}

/// Receives callbacks while [`Fetcher::fetch`] is running.
///
/// Callbacks are delivered one at a time, never concurrently.
pub trait FetchSink: Send {
    fn on_progress(&mut self, tick: &ProgressTick);
    fn on_postprocess(&mut self, step: &PostProcess);
    fn on_log(&mut self, level: LogLevel, message: &str);
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchOutcome {
    /// Title of the fetched item, when the capability reported one.
    pub title: Option<String>,
}

/// The external capability that performs retrieval, format selection and
/// merging.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, job: &Job, sink: &mut dyn FetchSink) -> Result<FetchOutcome, FetchError>;
}

/// How the capability is asked to fetch: format preference, container,
/// subtitles.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOptions {
    /// Upper bound on the video height used to build the format selector.
    pub max_height: u32,
    /// Replaces the generated format selector entirely.
    pub format: Option<String>,
    pub merge_output_format: String,
    /// Arguments handed to ffmpeg when merging video and audio.
    pub merger_args: Vec<String>,
    /// Subtitle language fetched and embedded; `None` disables subtitles.
    pub subtitle_lang: Option<String>,
    pub output_template: String,
    pub concurrent_fragments: u32,
    pub ffmpeg_location: Option<PathBuf>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            max_height: 1080,
            format: None,
            merge_output_format: "mp4".to_string(),
            merger_args: ["-c:v", "copy", "-c:a", "copy"]
                .into_iter()
                .map(String::from)
                .collect(),
            subtitle_lang: Some("en".to_string()),
            output_template: "%(title)s.%(ext)s".to_string(),
            concurrent_fragments: 5,
            ffmpeg_location: None,
        }
    }
}

impl FetchOptions {
    pub fn format_selector(&self) -> String {
        match &self.format {
            Some(format) => format.clone(),
            None => format!(
                "bestvideo[height<={}][vcodec^=avc1]+bestaudio[ext=m4a]/best[ext=mp4]/best",
                self.max_height
            ),
        }
    }

    pub fn output_path(&self, destination: &Path) -> PathBuf {
        destination.join(&self.output_template)
    }

    /// Arguments describing what to fetch, excluding the URL and the
    /// reporting switches.
    pub fn to_args(&self, destination: &Path) -> Vec<String> {
        let mut args = vec![
            "-f".to_string(),
            self.format_selector(),
            "--merge-output-format".to_string(),
            self.merge_output_format.clone(),
        ];

        if !self.merger_args.is_empty() {
            args.push("--postprocessor-args".to_string());
            args.push(format!("Merger:{}", self.merger_args.join(" ")));
        }

        if let Some(lang) = &self.subtitle_lang {
            args.extend(
                ["--write-subs", "--write-auto-subs", "--sub-langs"]
                    .into_iter()
                    .map(String::from),
            );
            args.push(lang.clone());
            args.push("--embed-subs".to_string());
        }

        if self.concurrent_fragments > 1 {
            args.push("--concurrent-fragments".to_string());
            args.push(self.concurrent_fragments.to_string());
        }

        if let Some(ffmpeg) = &self.ffmpeg_location {
            args.push("--ffmpeg-location".to_string());
            args.push(ffmpeg.to_string_lossy().into_owned());
        }

        args.push("-o".to_string());
        args.push(self.output_path(destination).to_string_lossy().into_owned());

        args
    }
}
