use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use async_trait::async_trait;
use serde_json::Value;
use ydl_bridge::{
    driver::Driver,
    event::ProgressEvent,
    fetch::{
        FetchError, FetchOutcome, FetchSink, Fetcher, LogLevel, PostProcess, PostProcessStatus,
    },
    job::Job,
    progress::{ProgressTick, TickStatus},
    reporter::{JobState, Reporter},
};

enum Step {
    Tick(ProgressTick),
    Post(&'static str),
    Log(LogLevel, &'static str),
}

/// Replays a fixed sequence of callbacks, then returns a fixed result.
struct ScriptedFetcher {
    steps: Vec<Step>,
    result: Result<Option<&'static str>, &'static str>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedFetcher {
    fn new(steps: Vec<Step>, result: Result<Option<&'static str>, &'static str>) -> Self {
        Self {
            steps,
            result,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, _job: &Job, sink: &mut dyn FetchSink) -> Result<FetchOutcome, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        for step in &self.steps {
            match step {
                Step::Tick(tick) => sink.on_progress(tick),
                Step::Post(name) => sink.on_postprocess(&PostProcess {
                    name: name.to_string(),
                    status: PostProcessStatus::Started,
                }),
                Step::Log(level, message) => sink.on_log(*level, message),
            }
        }

        match self.result {
            Ok(title) => Ok(FetchOutcome {
                title: title.map(String::from),
            }),
            Err(message) => Err(FetchError::Exited(message.to_string())),
        }
    }
}

fn downloading(downloaded: f64, total: Option<f64>, estimate: Option<f64>) -> Step {
    Step::Tick(ProgressTick {
        status: Some(TickStatus::Downloading),
        downloaded_bytes: Some(downloaded),
        total_bytes: total,
        total_bytes_estimate: estimate,
        speed: Some(1024.0),
        eta: Some(3.0),
    })
}

fn finished() -> Step {
    Step::Tick(ProgressTick {
        status: Some(TickStatus::Finished),
        downloaded_bytes: Some(200.0),
        total_bytes: Some(200.0),
        ..Default::default()
    })
}

fn job(dir: &tempfile::TempDir) -> Job {
    Job::new("https://example.com/watch?v=1", dir.path().join("out")).unwrap()
}

async fn run(fetcher: ScriptedFetcher, job: &Job) -> (Vec<ProgressEvent>, JobState) {
    let mut driver = Driver::new(fetcher, Vec::new());
    driver.run(job).await;

    let reporter = driver.into_reporter();
    let state = reporter.state();
    let events = String::from_utf8(reporter.into_inner())
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    (events, state)
}

fn terminal_count(events: &[ProgressEvent]) -> usize {
    events.iter().filter(|e| e.is_terminal()).count()
}

#[tokio::test]
async fn successful_job_ends_with_single_complete() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = ScriptedFetcher::new(
        vec![
            downloading(50.0, Some(200.0), None),
            downloading(100.0, Some(200.0), None),
            finished(),
            Step::Post("Merger"),
            Step::Post("EmbedSubtitle"),
            Step::Log(LogLevel::Warning, "ignored"),
        ],
        Ok(Some("Big Buck Bunny")),
    );
    let job = job(&dir);
    let (events, state) = run(fetcher, &job).await;

    assert_eq!(state, JobState::Completed);
    assert_eq!(events[0], ProgressEvent::status("Starting download..."));
    assert_eq!(terminal_count(&events), 1);
    assert_eq!(
        events.last(),
        Some(&ProgressEvent::Complete("Big Buck Bunny".into()))
    );
    assert!(events.contains(&ProgressEvent::status("Processing...")));
    assert!(events.contains(&ProgressEvent::status("Merging files...")));
    assert!(events.contains(&ProgressEvent::status("Embedding subtitles...")));
    assert!(job.destination.is_dir());

    let percents: Vec<f64> = events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::Progress(p) => Some(p.percent),
            _ => None,
        })
        .collect();
    assert_eq!(percents, vec![25.0, 50.0]);
}

#[tokio::test]
async fn missing_title_completes_as_unknown() {
    let dir = tempfile::tempdir().unwrap();
    let (events, _) = run(ScriptedFetcher::new(vec![], Ok(None)), &job(&dir)).await;

    assert_eq!(events.last(), Some(&ProgressEvent::Complete("Unknown".into())));
}

#[tokio::test]
async fn failing_job_ends_with_single_error() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = ScriptedFetcher::new(
        vec![downloading(10.0, Some(100.0), None)],
        Err("HTTP Error 403: Forbidden"),
    );
    let (events, state) = run(fetcher, &job(&dir)).await;

    assert_eq!(state, JobState::Failed);
    assert_eq!(terminal_count(&events), 1);
    assert_eq!(
        events.last(),
        Some(&ProgressEvent::error("HTTP Error 403: Forbidden"))
    );
    assert!(!events
        .iter()
        .any(|e| matches!(e, ProgressEvent::Complete(_))));
}

#[tokio::test]
async fn error_log_is_terminal_and_silences_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = ScriptedFetcher::new(
        vec![
            downloading(10.0, Some(100.0), None),
            Step::Log(LogLevel::Error, "unable to download video data"),
            downloading(20.0, Some(100.0), None),
            finished(),
            Step::Log(LogLevel::Error, "second error"),
        ],
        Err("yt-dlp exited with code 1"),
    );
    let (events, _) = run(fetcher, &job(&dir)).await;

    assert_eq!(terminal_count(&events), 1);
    assert_eq!(
        events.last(),
        Some(&ProgressEvent::error("unable to download video data"))
    );
    assert_eq!(events.len(), 3);
}

#[tokio::test]
async fn error_log_then_success_still_single_terminal() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = ScriptedFetcher::new(
        vec![Step::Log(LogLevel::Error, "subtitles unavailable")],
        Ok(Some("title")),
    );
    let (events, state) = run(fetcher, &job(&dir)).await;

    assert_eq!(state, JobState::Failed);
    assert_eq!(terminal_count(&events), 1);
    assert_eq!(events.last(), Some(&ProgressEvent::error("subtitles unavailable")));
}

#[tokio::test]
async fn ticks_without_totals_are_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = ScriptedFetcher::new(
        vec![
            downloading(50.0, None, None),
            downloading(50.0, Some(0.0), None),
            downloading(50.0, None, Some(100.0)),
            downloading(500.0, Some(100.0), None),
        ],
        Ok(Some("title")),
    );
    let (events, _) = run(fetcher, &job(&dir)).await;

    let progress: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::Progress(p) => Some(p.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(progress.len(), 2);
    assert_eq!(progress[0].percent, 50.0);
    assert_eq!(progress[1].percent, 100.0);
    assert!(progress
        .iter()
        .all(|p| (0.0..=100.0).contains(&p.percent)));
    assert_eq!(progress[0].speed, Some(1024.0));
    assert_eq!(progress[0].eta, Some(3.0));
}

#[tokio::test]
async fn malformed_descriptor_never_fetches() {
    let fetcher = ScriptedFetcher::new(vec![], Ok(Some("title")));
    let calls = fetcher.calls.clone();

    let out = match Job::from_json(r#"{"path": "/tmp/somewhere"}"#) {
        Ok(job) => {
            let mut driver = Driver::new(fetcher, Vec::new());
            driver.run(&job).await;
            driver.into_reporter().into_inner()
        }
        Err(e) => {
            let mut reporter = Reporter::new(Vec::new());
            reporter.emit(ProgressEvent::error(e.to_string()));
            reporter.into_inner()
        }
    };

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    let lines: Vec<Value> = String::from_utf8(out)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["type"], "error");
    assert_eq!(lines[0]["data"], "Missing url");
}

#[tokio::test]
async fn unwritable_destination_fails_without_fetching() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("file");
    std::fs::write(&blocker, b"not a directory").unwrap();

    let fetcher = ScriptedFetcher::new(vec![], Ok(Some("title")));
    let calls = fetcher.calls.clone();
    let job = Job::new("https://example.com/v", blocker.join("sub")).unwrap();
    let (events, state) = run(fetcher, &job).await;

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(state, JobState::Failed);
    assert_eq!(events.len(), 2);
    assert!(matches!(&events[1], ProgressEvent::Error(m) if m.starts_with("Could not create")));
}
