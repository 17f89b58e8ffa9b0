use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum LocateError {
    #[error("Engine {0} not found! Install it and make sure it is on your PATH.")]
    NotFound(String),
    #[error("Configured binary {0} does not exist")]
    Missing(PathBuf),
}

#[cfg(windows)]
const YTDLP_NAMES: &[&str] = &["yt-dlp"];
#[cfg(not(windows))]
const YTDLP_NAMES: &[&str] = &["yt-dlp-linux", "yt-dlp"];

fn resolve(configured: Option<&Path>, names: &[&str]) -> Result<PathBuf, LocateError> {
    if let Some(path) = configured {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        if path.is_dir() {
            return names
                .iter()
                .map(|name| path.join(format!("{}{}", name, std::env::consts::EXE_SUFFIX)))
                .find(|candidate| candidate.is_file())
                .ok_or_else(|| LocateError::Missing(path.to_path_buf()));
        }
        return which::which(path).map_err(|_| LocateError::Missing(path.to_path_buf()));
    }

    names
        .iter()
        .find_map(|name| which::which(name).ok())
        .ok_or_else(|| LocateError::NotFound(names.last().copied().unwrap_or_default().to_string()))
}

/// Finds the yt-dlp executable: the configured path if any, otherwise the
/// first match on `PATH`.
pub fn ytdlp(configured: Option<&Path>) -> Result<PathBuf, LocateError> {
    let path = resolve(configured, YTDLP_NAMES)?;
    debug!("Using yt-dlp at {}", path.display());
    Ok(path)
}

pub fn ffmpeg(configured: Option<&Path>) -> Result<PathBuf, LocateError> {
    let path = resolve(configured, &["ffmpeg"])?;
    debug!("Using ffmpeg at {}", path.display());
    Ok(path)
}

#[derive(Debug)]
pub struct DependencyReport {
    pub ytdlp: Result<PathBuf, LocateError>,
    pub ffmpeg: Result<PathBuf, LocateError>,
}

impl DependencyReport {
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.ytdlp.is_err() {
            missing.push("yt-dlp");
        }
        if self.ffmpeg.is_err() {
            missing.push("ffmpeg");
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }
}

pub fn check_dependencies(ytdlp_path: Option<&Path>, ffmpeg_path: Option<&Path>) -> DependencyReport {
    DependencyReport {
        ytdlp: ytdlp(ytdlp_path),
        ffmpeg: ffmpeg(ffmpeg_path),
    }
}
