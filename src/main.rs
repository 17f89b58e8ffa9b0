use std::path::PathBuf;

use clap::Parser;
use log::warn;
use tokio::io::AsyncReadExt;
use ydl_bridge::{
    config::Config, driver::Driver, event::ProgressEvent, job::Job, locate, reporter::Reporter,
    ytdlp::YtDlp,
};

async fn read_job_from_stdin() -> Result<Job, String> {
    let mut input = String::new();
    tokio::io::stdin()
        .read_to_string(&mut input)
        .await
        .map_err(|e| format!("Could not read job from stdin: {}", e))?;

    Job::from_json(&input).map_err(|e| e.to_string())
}

fn check(config: &Config) -> bool {
    let report = locate::check_dependencies(config.ytdlp.as_deref(), config.ffmpeg.as_deref());

    for (name, found) in [("yt-dlp", &report.ytdlp), ("ffmpeg", &report.ffmpeg)] {
        match found {
            Ok(path) => println!("{}: {}", name, path.display()),
            Err(e) => println!("{}: MISSING ({})", name, e),
        }
    }

    if !report.is_complete() {
        println!("Missing required packages: {}", report.missing().join(", "));
    }

    report.is_complete()
}

fn fetcher(config: &Config) -> YtDlp {
    let ffmpeg = match locate::ffmpeg(config.ffmpeg.as_deref()) {
        Ok(path) => Some(path),
        Err(e) => {
            warn!("{}; merging and subtitle embedding may fail", e);
            None
        }
    };

    let fetcher = YtDlp::new(config.fetch_options(ffmpeg));
    match &config.ytdlp {
        Some(binary) => fetcher.with_binary(binary),
        None => fetcher,
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let config = Config::parse();

    if config.check {
        std::process::exit(if check(&config) { 0 } else { 1 });
    }

    // A URL on the command line selects argument mode; otherwise the job
    // arrives on stdin.
    let job = match config.url.clone() {
        Some(url) => {
            let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            Job::from_args(Some(url), config.destination.clone(), &cwd).map_err(|e| e.to_string())
        }
        None => read_job_from_stdin().await,
    };

    let job = match job {
        Ok(job) => job,
        Err(message) => {
            Reporter::new(std::io::stdout()).emit(ProgressEvent::error(message));
            return;
        }
    };

    let mut driver = Driver::new(fetcher(&config), std::io::stdout());
    driver.run(&job).await;
}
