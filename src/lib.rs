//! # ydl-bridge
//!
//! This crate runs a single [yt-dlp](https://github.com/yt-dlp/yt-dlp)
//! download and turns its progress into a small stream of JSON events that a
//! host process (an Electron shell, a GUI, a job runner) can read line by
//! line from stdout.
//!
//! Format selection, merging and subtitle embedding are left to yt-dlp and
//! ffmpeg. This crate only assembles the command line, watches the output
//! and guarantees the shape of the event stream: a `status` event first, any
//! number of `status`/`progress` events, then exactly one `complete` or
//! `error` event.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ydl_bridge::{driver::Driver, fetch::FetchOptions, job::Job, ytdlp::YtDlp};
//!
//! #[tokio::main]
//! async fn main() {
//!     let job = Job::new("https://www.youtube.com/watch?v=...", "downloads").unwrap();
//!
//!     let mut driver = Driver::new(YtDlp::new(FetchOptions::default()), std::io::stdout());
//!     driver.run(&job).await;
//! }
//! ```
//!
//! Each line written to stdout looks like one of:
//!
//! ```text
//! {"type":"status","data":"Starting download..."}
//! {"type":"progress","data":{"percent":25.0,"speed":1048576.0,"eta":12.0}}
//! {"type":"complete","data":"Video title"}
//! {"type":"error","data":"Video unavailable"}
//! ```
//!
//! Any [`fetch::Fetcher`] can stand in for yt-dlp, which is how the tests
//! drive the event contract without a network.

#![forbid(unsafe_code)]
#[macro_use]
extern crate log;

pub mod config;
pub mod driver;
pub mod event;
pub mod fetch;
pub mod job;
pub mod locate;
pub mod progress;
pub mod reporter;
pub mod util;
pub mod ytdlp;
