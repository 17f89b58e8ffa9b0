use std::io::Write;

use crate::event::ProgressEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Running,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

/// Writes events to the output channel, one JSON document per line, and
/// refuses anything after the first terminal event.
pub struct Reporter<W: Write> {
    out: W,
    state: JobState,
    emitted: usize,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            state: JobState::Idle,
            emitted: 0,
        }
    }

    /// Returns `false` when the event was refused because the job already
    /// reached a terminal state.
    pub fn emit(&mut self, event: ProgressEvent) -> bool {
        if self.state.is_terminal() {
            debug!("Dropping {} event after terminal state {:?}", event.kind(), self.state);
            return false;
        }

        self.state = match &event {
            ProgressEvent::Complete(_) => JobState::Completed,
            ProgressEvent::Error(_) => JobState::Failed,
            _ => JobState::Running,
        };

        match self.write_line(&event) {
            Ok(()) => self.emitted += 1,
            Err(e) => error!("Could not write {} event: {}", event.kind(), e),
        }

        true
    }

    fn write_line(&mut self, event: &ProgressEvent) -> std::io::Result<()> {
        let mut line = event.to_line()?;
        line.push('\n');
        self.out.write_all(line.as_bytes())?;
        self.out.flush()
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }

    /// Number of lines successfully written.
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
