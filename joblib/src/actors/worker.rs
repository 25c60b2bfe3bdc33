mod actor;
mod messages;
mod reader;

use crate::error::{Error, Result};
use crate::events::{Origin, OutputEvent, TerminationState};
use crate::job::JobSpec;
use crate::types::JobId;
use actor::Actor;
use std::process::Stdio;
use tokio::{
    process,
    sync::{mpsc, watch},
};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Capacity of the channel between the pipe readers and the actor.
const PIPE_CAPACITY: usize = 64;

/// The caller-side half of a running worker.
pub struct WorkerHandle {
    pub events: mpsc::Receiver<OutputEvent>,
    pub state: watch::Receiver<TerminationState>,
    pub cancel: CancellationToken,
    pub pid: Option<u32>,
}

impl WorkerHandle {
    /// Launch the program described by `spec` and start streaming its output.
    ///
    /// Errors here mean the process never started; no event will ever be produced.
    pub fn spawn(job_id: JobId, spec: &JobSpec) -> Result<Self> {
        let mut command = process::Command::new(&spec.program);
        command
            .args(&spec.args)
            .current_dir(&spec.dir)
            .envs(spec.envs.iter().map(|(k, v)| (k, v)))
            // interpreted children (yt-dlp is python) must not block-buffer their progress
            .env("PYTHONUNBUFFERED", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(|source| Error::Launch {
            program: spec.program.clone(),
            source,
        })?;
        let pid = child.id();
        info!(%job_id, ?pid, program = %spec.program, args = ?spec.args, "job started");

        let (pipe_tx, pipe_rx) = mpsc::channel(PIPE_CAPACITY);
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(reader::spawn(Origin::Stdout, stdout, pipe_tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(reader::spawn(Origin::Stderr, stderr, pipe_tx));
        }

        let (events_tx, events) = mpsc::channel(spec.capacity.max(1));
        let (state_tx, state) = watch::channel(TerminationState::Running);
        let cancel = CancellationToken::new();
        Actor {
            job_id,
            child,
            pipe_rx,
            readers,
            events_tx,
            state_tx,
            cancel: cancel.clone(),
            tool: spec.tool.clone(),
            grace: spec.grace,
        }
        .spawn();

        Ok(Self {
            events,
            state,
            cancel,
            pid,
        })
    }
}
