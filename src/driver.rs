use std::io::Write;

use crate::{
    event::ProgressEvent,
    fetch::{FetchSink, Fetcher, LogLevel, PostProcess, PostProcessStatus},
    job::Job,
    progress::ProgressTick,
    reporter::Reporter,
};

pub const STARTING: &str = "Starting download...";
pub const PROCESSING: &str = "Processing...";
pub const UNKNOWN_TITLE: &str = "Unknown";

fn postprocess_status(name: &str) -> Option<&'static str> {
    match name {
        "Merger" => Some("Merging files..."),
        "EmbedSubtitle" | "FFmpegEmbedSubtitle" => Some("Embedding subtitles..."),
        "FixupM3u8" | "FixupStretched" | "FixupM4a" | "FixupDuplicateMoov" | "FixupTimestamp" => {
            Some("Fixing up container...")
        }
        _ => None,
    }
}

/// Translates fetch callbacks into events for one job.
struct JobSink<'r, W: Write> {
    reporter: &'r mut Reporter<W>,
    processing_announced: bool,
}

impl<W: Write + Send> FetchSink for JobSink<'_, W> {
    fn on_progress(&mut self, tick: &ProgressTick) {
        if tick.is_downloading() {
            if let Some(event) = tick.to_event() {
                self.reporter.emit(event);
            }
        } else if tick.is_finished() && !self.processing_announced {
            self.processing_announced = true;
            self.reporter.emit(ProgressEvent::status(PROCESSING));
        }
    }

    fn on_postprocess(&mut self, step: &PostProcess) {
        debug!("Post-processor {} {:?}", step.name, step.status);
        if step.status != PostProcessStatus::Started {
            return;
        }
        if let Some(status) = postprocess_status(&step.name) {
            self.reporter.emit(ProgressEvent::status(status));
        }
    }

    fn on_log(&mut self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Error => {
                self.reporter.emit(ProgressEvent::error(message));
            }
            LogLevel::Warning => debug!("Discarding warning: {}", message),
            LogLevel::Debug => trace!("Discarding debug line: {}", message),
        }
    }
}

/// Owns a single download: issues it through a [`Fetcher`] and reports it
/// through a [`Reporter`].
pub struct Driver<F, W: Write> {
    fetcher: F,
    reporter: Reporter<W>,
}

impl<F: Fetcher, W: Write + Send> Driver<F, W> {
    pub fn new(fetcher: F, out: W) -> Self {
        Self {
            fetcher,
            reporter: Reporter::new(out),
        }
    }

    pub fn into_reporter(self) -> Reporter<W> {
        self.reporter
    }

    /// Runs the job to its terminal event. Success or failure is only
    /// visible in the emitted events.
    pub async fn run(&mut self, job: &Job) {
        self.reporter.emit(ProgressEvent::status(STARTING));

        if let Err(e) = job.prepare_destination().await {
            error!("Could not create {}: {}", job.destination.display(), e);
            self.reporter.emit(ProgressEvent::error(format!(
                "Could not create {}: {}",
                job.destination.display(),
                e
            )));
            return;
        }

        let mut sink = JobSink {
            reporter: &mut self.reporter,
            processing_announced: false,
        };
        let result = self.fetcher.fetch(job, &mut sink).await;

        let terminal = match result {
            Ok(outcome) => {
                ProgressEvent::Complete(outcome.title.unwrap_or_else(|| UNKNOWN_TITLE.to_string()))
            }
            Err(e) => {
                warn!("Fetching {} failed: {}", job.url, e);
                ProgressEvent::error(e.to_string())
            }
        };

        if !self.reporter.emit(terminal) {
            debug!("Job {} already ended with {:?}", job.url, self.reporter.state());
        }
    }
}
