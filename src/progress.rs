use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use serde_aux::prelude::*;

use crate::{event, util};

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ProgressError {
    #[error("downloaded byte count missing")]
    MissingDownloaded,
    #[error("neither total_bytes nor total_bytes_estimate present")]
    MissingTotal,
    #[error("total byte count is zero")]
    ZeroTotal,
    #[error("percentage is not a finite number")]
    NotFinite,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickStatus {
    Downloading,
    Finished,
    Error,
    #[serde(other)]
    Other,
}

/// A single progress callback from the fetch capability.
///
/// Mirrors the fields of a yt-dlp progress hook dictionary. Every field is
/// optional: yt-dlp omits or nulls whatever it does not know yet.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProgressTick {
    #[serde(default)]
    pub status: Option<TickStatus>,
    #[serde(default, deserialize_with = "deserialize_option_number_from_string")]
    pub downloaded_bytes: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_option_number_from_string")]
    pub total_bytes: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_option_number_from_string")]
    pub total_bytes_estimate: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_option_number_from_string")]
    pub speed: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_option_number_from_string")]
    pub eta: Option<f64>,
}

impl ProgressTick {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn is_downloading(&self) -> bool {
        self.status == Some(TickStatus::Downloading)
    }

    pub fn is_finished(&self) -> bool {
        self.status == Some(TickStatus::Finished)
    }

    /// Exact total when known and non-zero, the estimate otherwise.
    fn total(&self) -> Option<f64> {
        self.total_bytes
            .filter(|t| *t != 0.0)
            .or(self.total_bytes_estimate)
            .or(self.total_bytes)
    }

    pub fn percent(&self) -> Result<f64, ProgressError> {
        let downloaded = self.downloaded_bytes.ok_or(ProgressError::MissingDownloaded)?;
        let total = self.total().ok_or(ProgressError::MissingTotal)?;
        if total == 0.0 {
            return Err(ProgressError::ZeroTotal);
        }

        let percent = downloaded / total * 100.0;
        if !percent.is_finite() {
            return Err(ProgressError::NotFinite);
        }

        Ok(percent.clamp(0.0, 100.0))
    }

    /// Translates the tick into a progress event, or `None` when no sensible
    /// percentage can be computed.
    pub fn to_event(&self) -> Option<event::ProgressEvent> {
        match self.percent() {
            Ok(percent) => Some(event::ProgressEvent::Progress(event::Progress {
                percent,
                speed: self.speed.filter(|s| s.is_finite()),
                eta: self.eta.filter(|e| e.is_finite()),
            })),
            Err(e) => {
                debug!("Dropping progress tick ({}): {:?}", e, self);
                None
            }
        }
    }
}

fn progress_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\[download\]\s+(?P<percent>\d+(?:\.\d+)?)%\s+of\s+(?P<approx>~)?\s*(?P<size>[\d.]+[A-Za-z]+)(?:\s+at\s+(?P<speed>[\d.]+[A-Za-z]+/s))?(?:\s+ETA\s+(?P<eta>[\d:]+))?",
        )
        .expect("progress line regex is valid")
    })
}

/// Parses yt-dlp's human-readable progress line, for builds that ignore
/// `--progress-template`.
///
/// `[download]  42.0% of ~ 10.00MiB at 1.20MiB/s ETA 00:10`
pub fn parse_progress_line(line: &str) -> Option<ProgressTick> {
    let caps = progress_line_regex().captures(line)?;

    let percent: f64 = caps["percent"].parse().ok()?;
    let size = util::parse_bytes(&caps["size"])?;
    let downloaded = size * percent / 100.0;
    let (total_bytes, total_bytes_estimate) = match caps.name("approx") {
        Some(_) => (None, Some(size)),
        None => (Some(size), None),
    };

    Some(ProgressTick {
        status: Some(TickStatus::Downloading),
        downloaded_bytes: Some(downloaded),
        total_bytes,
        total_bytes_estimate,
        speed: caps.name("speed").and_then(|m| util::parse_rate(m.as_str())),
        eta: caps.name("eta").and_then(|m| util::parse_clock(m.as_str())),
    })
}
