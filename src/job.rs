use std::path::{Path, PathBuf};

use serde::Deserialize;

#[derive(thiserror::Error, Debug)]
pub enum JobError {
    #[error("Invalid job descriptor: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Missing {}", .0.join(" and "))]
    MissingFields(Vec<&'static str>),
}

/// One request to fetch a single URL into a destination directory.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub url: String,
    pub destination: PathBuf,
}

/// The payload a host process writes to stdin.
#[derive(Debug, Default, Deserialize)]
struct Descriptor {
    url: Option<String>,
    #[serde(alias = "destination")]
    path: Option<PathBuf>,
}

impl Job {
    pub fn new(url: impl Into<String>, destination: impl Into<PathBuf>) -> Result<Self, JobError> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(JobError::MissingFields(vec!["url"]));
        }

        Ok(Self {
            url: url.trim().to_string(),
            destination: destination.into(),
        })
    }

    /// Parses `{"url": "...", "path": "..."}`. Both fields are required.
    pub fn from_json(input: &str) -> Result<Self, JobError> {
        let descriptor: Descriptor = serde_json::from_str(input)?;

        let url = descriptor.url.filter(|u| !u.trim().is_empty());
        let path = descriptor.path.filter(|p| !p.as_os_str().is_empty());

        match (url, path) {
            (Some(url), Some(path)) => Job::new(url, path),
            (url, path) => {
                let mut missing = Vec::new();
                if url.is_none() {
                    missing.push("url");
                }
                if path.is_none() {
                    missing.push("path");
                }
                Err(JobError::MissingFields(missing))
            }
        }
    }

    /// Builds a job from positional arguments; the destination defaults to
    /// `fallback_dir`.
    pub fn from_args(
        url: Option<String>,
        destination: Option<PathBuf>,
        fallback_dir: &Path,
    ) -> Result<Self, JobError> {
        let url = url.ok_or(JobError::MissingFields(vec!["url"]))?;
        Job::new(url, destination.unwrap_or_else(|| fallback_dir.to_path_buf()))
    }

    /// Creates the destination directory if it does not exist yet.
    pub async fn prepare_destination(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.destination).await
    }
}
