use crate::actors::worker::WorkerHandle;
use crate::error::Result;
use crate::events::{OutputEvent, TerminationState};
use crate::stream::OutputStream;
use crate::terminate::DEFAULT_GRACE;
use crate::types::{Args, Dir, Envs, JobId, Program};

use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Number of rendered events that may queue up ahead of a slow consumer.
pub const DEFAULT_CAPACITY: usize = 64;

/// Everything needed to launch one job.
#[derive(Clone, Debug)]
pub struct JobSpec {
    pub program: Program,
    pub args: Args,
    pub dir: Dir,
    pub envs: Envs,
    /// Name used in the terminal status line.
    pub tool: String,
    /// How long a child gets to honour SIGTERM before it is killed.
    pub grace: Duration,
    pub capacity: usize,
}

impl JobSpec {
    pub fn new(program: impl Into<Program>, args: Args, dir: impl Into<Dir>) -> Self {
        Self {
            program: program.into(),
            args,
            dir: dir.into(),
            envs: Envs::new(),
            tool: "yt-dlp".into(),
            grace: DEFAULT_GRACE,
            capacity: DEFAULT_CAPACITY,
        }
    }

    pub fn tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = tool.into();
        self
    }

    pub fn grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn envs(mut self, envs: Envs) -> Self {
        self.envs = envs;
        self
    }
}

/// One running invocation of an external program.
///
/// The job belongs to whoever spawned it. Dropping the `Job` (or the [`OutputStream`] it
/// turns into) cancels it; the child is then stopped and reaped in the background.
pub struct Job {
    id: JobId,
    started_at: DateTime<Utc>,
    pid: Option<u32>,
    events: mpsc::Receiver<OutputEvent>,
    state: watch::Receiver<TerminationState>,
    cancel: CancellationToken,
    guard: DropGuard,
}

impl Job {
    /// Launch a job. Fails before any output exists if the program cannot be started.
    pub fn spawn(spec: JobSpec) -> Result<Self> {
        let id = uuid::Uuid::new_v4();
        let WorkerHandle {
            events,
            state,
            cancel,
            pid,
        } = WorkerHandle::spawn(id, &spec)?;
        Ok(Self {
            id,
            started_at: Utc::now(),
            pid,
            events,
            state,
            guard: cancel.clone().drop_guard(),
            cancel,
        })
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn state(&self) -> TerminationState {
        *self.state.borrow()
    }

    /// Ask the job to stop. The child gets SIGTERM, then SIGKILL after the grace period.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait until the child has exited and been reaped. See [`JobMonitor::reaped`].
    pub async fn reaped(&self) -> TerminationState {
        self.monitor().reaped().await
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// A handle that outlives the job's output and reports when the child is reaped.
    pub fn monitor(&self) -> JobMonitor {
        JobMonitor {
            id: self.id,
            state: self.state.clone(),
        }
    }

    /// Next event in emission order, `None` once the terminal event has been consumed
    /// or the job was cancelled.
    pub async fn next_event(&mut self) -> Option<OutputEvent> {
        self.events.recv().await
    }

    pub fn into_stream(self) -> OutputStream {
        OutputStream::new(ReceiverStream::new(self.events), self.guard)
    }
}

#[derive(Clone)]
pub struct JobMonitor {
    id: JobId,
    state: watch::Receiver<TerminationState>,
}

impl JobMonitor {
    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn state(&self) -> TerminationState {
        *self.state.borrow()
    }

    /// Wait until the child has exited and been reaped.
    ///
    /// Returns the last state seen; anything but `Reaped` means the worker went away
    /// without confirming the reap.
    pub async fn reaped(&mut self) -> TerminationState {
        if let Ok(state) = self
            .state
            .wait_for(|state| *state == TerminationState::Reaped)
            .await
        {
            return *state;
        }
        *self.state.borrow()
    }
}
