use std::{
    path::{Path, PathBuf},
    process::Stdio,
};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::{wrappers::SplitStream, StreamExt};

use crate::{
    fetch::{
        FetchError, FetchOptions, FetchOutcome, FetchSink, Fetcher, LogLevel, PostProcess,
        PostProcessStatus,
    },
    job::Job,
    locate,
    progress::{self, ProgressTick},
};

const PROGRESS_MARKER: &str = "[ydl-progress] ";
const POSTPROCESS_MARKER: &str = "[ydl-postprocess] ";
const TITLE_MARKER: &str = "[ydl-title] ";

/// Post-processors announced by name in yt-dlp's plain output.
const PLAIN_POSTPROCESSORS: &[&str] = &["Merger", "EmbedSubtitle", "FixupM3u8", "FFmpegMetadata"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// What a single line of yt-dlp output means to us.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputLine {
    Progress(ProgressTick),
    PostProcess(PostProcess),
    Title(String),
    Log(LogLevel, String),
    Other,
}

#[derive(Deserialize)]
struct PostProcessTemplate {
    status: Option<String>,
    postprocessor: Option<String>,
}

fn parse_postprocess(json: &str) -> Option<PostProcess> {
    let pp: PostProcessTemplate = serde_json::from_str(json).ok()?;
    let status = match pp.status.as_deref()? {
        "started" => PostProcessStatus::Started,
        "finished" => PostProcessStatus::Finished,
        _ => return None,
    };

    Some(PostProcess {
        name: pp.postprocessor?,
        status,
    })
}

pub fn classify(stream: Stream, line: &str) -> OutputLine {
    let line = line.trim_end_matches(&['\r', '\n'][..]);

    if let Some(json) = line.strip_prefix(PROGRESS_MARKER) {
        return match ProgressTick::from_json(json) {
            Ok(tick) => OutputLine::Progress(tick),
            Err(e) => OutputLine::Log(LogLevel::Debug, format!("unreadable progress ({}): {}", e, json)),
        };
    }
    if let Some(json) = line.strip_prefix(POSTPROCESS_MARKER) {
        return parse_postprocess(json)
            .map(OutputLine::PostProcess)
            .unwrap_or(OutputLine::Other);
    }
    if let Some(title) = line.strip_prefix(TITLE_MARKER) {
        return OutputLine::Title(title.trim().to_string());
    }
    if let Some(message) = line.strip_prefix("ERROR:") {
        return OutputLine::Log(LogLevel::Error, message.trim().to_string());
    }
    if let Some(message) = line.strip_prefix("WARNING:") {
        return OutputLine::Log(LogLevel::Warning, message.trim().to_string());
    }
    if line.starts_with("[download]") {
        if let Some(tick) = progress::parse_progress_line(line) {
            return OutputLine::Progress(tick);
        }
    }
    if let Some(name) = PLAIN_POSTPROCESSORS
        .iter()
        .find(|name| line.starts_with(&format!("[{}]", name)))
    {
        return OutputLine::PostProcess(PostProcess {
            name: name.to_string(),
            status: PostProcessStatus::Started,
        });
    }

    match stream {
        Stream::Stderr if !line.trim().is_empty() => OutputLine::Log(LogLevel::Debug, line.to_string()),
        _ => OutputLine::Other,
    }
}

/// Runs the `yt-dlp` executable as the fetch capability.
#[derive(Debug, Clone, Default)]
pub struct YtDlp {
    binary: Option<PathBuf>,
    options: FetchOptions,
}

impl YtDlp {
    pub fn new(options: FetchOptions) -> Self {
        Self {
            binary: None,
            options,
        }
    }

    /// Uses this executable instead of searching `PATH`.
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = Some(binary.into());
        self
    }

    pub fn args(&self, job: &Job) -> Vec<String> {
        let mut args: Vec<String> = [
            "--newline",
            "--progress",
            "--no-warnings",
            "--no-simulate",
            "--progress-template",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        args.push(format!(
            "download:{}%(progress.{{status,downloaded_bytes,total_bytes,total_bytes_estimate,speed,eta}})j",
            PROGRESS_MARKER
        ));
        args.push("--progress-template".to_string());
        args.push(format!(
            "postprocess:{}%(progress.{{status,postprocessor}})j",
            POSTPROCESS_MARKER
        ));
        args.push("--print".to_string());
        args.push(format!("after_move:{}%(title)s", TITLE_MARKER));

        args.extend(self.options.to_args(&job.destination));
        args.push("--".to_string());
        args.push(job.url.clone());

        args
    }

    fn command(&self, binary: &Path, job: &Job) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(binary);

        cmd.args(self.args(job))
            .env("PYTHONIOENCODING", "utf-8")
            .env("PYTHONUTF8", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        cmd
    }
}

fn lossy_lines<R>(reader: R, stream: Stream) -> impl tokio_stream::Stream<Item = (Stream, std::io::Result<String>)>
where
    R: tokio::io::AsyncRead + Unpin,
{
    SplitStream::new(BufReader::new(reader).split(b'\n'))
        .map(move |chunk| (stream, chunk.map(|bytes| String::from_utf8_lossy(&bytes).into_owned())))
}

#[async_trait]
impl Fetcher for YtDlp {
    async fn fetch(&self, job: &Job, sink: &mut dyn FetchSink) -> Result<FetchOutcome, FetchError> {
        let binary = locate::ytdlp(self.binary.as_deref())?;
        let mut child = self
            .command(&binary, job)
            .spawn()
            .map_err(|source| FetchError::Spawn {
                binary: binary.display().to_string(),
                source,
            })?;
        info!("Started {} for {}", binary.display(), job.url);

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "stdout not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "stderr not captured"))?;

        let lines = lossy_lines(stdout, Stream::Stdout).merge(lossy_lines(stderr, Stream::Stderr));
        tokio::pin!(lines);

        let mut title = None;
        let mut last_error = None;
        let mut last_stderr = None;

        while let Some((stream, line)) = lines.next().await {
            let line = line?;

            if stream == Stream::Stderr && !line.trim().is_empty() {
                last_stderr = Some(line.trim().to_string());
            }

            match classify(stream, &line) {
                OutputLine::Progress(tick) => sink.on_progress(&tick),
                OutputLine::PostProcess(step) => sink.on_postprocess(&step),
                OutputLine::Title(t) => title = Some(t),
                OutputLine::Log(level, message) => {
                    if level == LogLevel::Error {
                        last_error = Some(message.clone());
                    }
                    sink.on_log(level, &message);
                }
                OutputLine::Other => trace!("yt-dlp: {}", line.trim_end()),
            }
        }

        let status = child.wait().await?;
        if status.success() {
            info!("yt-dlp finished {}", job.url);
            return Ok(FetchOutcome { title });
        }

        let message = last_error.or(last_stderr).unwrap_or_else(|| match status.code() {
            Some(code) => format!("yt-dlp exited with code {}", code),
            None => "yt-dlp was terminated by a signal".to_string(),
        });
        warn!("yt-dlp failed for {}: {}", job.url, message);

        Err(FetchError::Exited(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_template_lines() {
        let line = r#"[ydl-progress] {"status": "downloading", "downloaded_bytes": 50, "total_bytes": 200, "speed": null, "eta": null}"#;
        match classify(Stream::Stdout, line) {
            OutputLine::Progress(tick) => assert_eq!(tick.percent(), Ok(25.0)),
            other => panic!("unexpected {:?}", other),
        }

        assert_eq!(
            classify(
                Stream::Stdout,
                r#"[ydl-postprocess] {"status": "started", "postprocessor": "Merger"}"#
            ),
            OutputLine::PostProcess(PostProcess {
                name: "Merger".into(),
                status: PostProcessStatus::Started,
            })
        );
        assert_eq!(
            classify(
                Stream::Stdout,
                r#"[ydl-postprocess] {"status": "processing", "postprocessor": "Merger"}"#
            ),
            OutputLine::Other
        );
        assert_eq!(
            classify(Stream::Stdout, "[ydl-title] Big Buck Bunny\r"),
            OutputLine::Title("Big Buck Bunny".into())
        );
    }

    #[test]
    fn broken_progress_json_is_debug_noise() {
        assert!(matches!(
            classify(Stream::Stdout, "[ydl-progress] {oops"),
            OutputLine::Log(LogLevel::Debug, _)
        ));
    }

    #[test]
    fn classifies_diagnostics() {
        assert_eq!(
            classify(Stream::Stderr, "ERROR: [youtube] abc: Video unavailable"),
            OutputLine::Log(LogLevel::Error, "[youtube] abc: Video unavailable".into())
        );
        assert_eq!(
            classify(Stream::Stderr, "WARNING: falling back"),
            OutputLine::Log(LogLevel::Warning, "falling back".into())
        );
        assert_eq!(
            classify(Stream::Stderr, "[debug] Command-line config"),
            OutputLine::Log(LogLevel::Debug, "[debug] Command-line config".into())
        );
        assert_eq!(classify(Stream::Stdout, "[info] something"), OutputLine::Other);
        assert_eq!(classify(Stream::Stderr, "   "), OutputLine::Other);
    }

    #[test]
    fn classifies_plain_output() {
        assert!(matches!(
            classify(Stream::Stdout, "[download]  10.0% of 1.00MiB at 1.00KiB/s ETA 00:05"),
            OutputLine::Progress(_)
        ));
        assert_eq!(
            classify(Stream::Stdout, "[EmbedSubtitle] Embedding subtitles in \"a.mp4\""),
            OutputLine::PostProcess(PostProcess {
                name: "EmbedSubtitle".into(),
                status: PostProcessStatus::Started,
            })
        );
        assert_eq!(classify(Stream::Stdout, "[download] Destination: a.mp4"), OutputLine::Other);
    }

    #[test]
    fn args_end_with_url() {
        let job = Job::new("https://example.com/watch?v=1", "/out").unwrap();
        let args = YtDlp::default().args(&job);

        assert_eq!(args.last().unwrap(), "https://example.com/watch?v=1");
        assert_eq!(args[args.len() - 2], "--");
        assert!(args.iter().any(|a| a.starts_with("download:[ydl-progress] %(progress.{status,")));
        assert!(args.iter().any(|a| a == "after_move:[ydl-title] %(title)s"));
        assert!(args.iter().any(|a| a == "--embed-subs"));
    }
}
