use super::messages::PipeMessage;
use crate::error::Error as JobError;
use crate::events::{ExitOutcome, Origin, OutputEvent, Section, TerminationState};
use crate::terminate;
use crate::types::JobId;

use bytes::BytesMut;
use std::{process::ExitStatus, time::Duration};
use tokio::{
    process::Child,
    select,
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Why the pipeline stopped before the child exited on its own.
enum Interrupt {
    Cancelled,
    Failed(JobError),
}

/// The single owner of a job's emission order.
///
/// Pipe readers hand lines to the actor; the actor forwards stdout as it arrives, holds
/// stderr back until both pipes close, and finishes with exactly one terminal event.
pub struct Actor {
    pub job_id: JobId,
    pub child: Child,
    pub pipe_rx: mpsc::Receiver<PipeMessage>,
    pub readers: Vec<JoinHandle<()>>,
    pub events_tx: mpsc::Sender<OutputEvent>,
    pub state_tx: watch::Sender<TerminationState>,
    pub cancel: CancellationToken,
    pub tool: String,
    pub grace: Duration,
}

impl Actor {
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    async fn run(mut self) {
        match self.pump().await {
            Ok(status) => {
                self.state_tx.send_replace(TerminationState::Reaped);
                let outcome = ExitOutcome::from(status);
                if outcome.success() {
                    info!(job_id = %self.job_id, "job finished");
                } else {
                    warn!(job_id = %self.job_id, code = outcome.code(), "job exited with failure");
                }
                let _ = self
                    .emit(OutputEvent::Finished {
                        tool: self.tool.clone(),
                        outcome,
                    })
                    .await;
            }
            Err(Interrupt::Cancelled) => {
                info!(job_id = %self.job_id, "consumer went away, stopping job");
                self.shutdown().await;
            }
            Err(Interrupt::Failed(error)) => {
                warn!(job_id = %self.job_id, error = %error, "job pipeline failed");
                self.shutdown().await;
                let _ = self.emit(OutputEvent::ServerError(error.to_string())).await;
            }
        }
        for reader in &self.readers {
            reader.abort();
        }
    }

    async fn pump(&mut self) -> Result<ExitStatus, Interrupt> {
        self.emit(OutputEvent::Marker(Section::Stdout)).await?;

        let mut open_pipes = self.readers.len();
        let mut stderr = BytesMut::new();
        while open_pipes > 0 {
            let msg = select! {
                biased;
                _ = self.cancel.cancelled() => return Err(Interrupt::Cancelled),
                _ = self.events_tx.closed() => return Err(Interrupt::Cancelled),
                msg = self.pipe_rx.recv() => msg,
            };
            match msg {
                Some(PipeMessage::Line {
                    origin: Origin::Stdout,
                    data,
                }) => {
                    self.emit(OutputEvent::Line {
                        origin: Origin::Stdout,
                        data,
                    })
                    .await?;
                }
                Some(PipeMessage::Line {
                    origin: Origin::Stderr,
                    data,
                }) => stderr.extend_from_slice(&data),
                Some(PipeMessage::Closed { origin }) => {
                    debug!(job_id = %self.job_id, %origin, "pipe closed");
                    open_pipes -= 1;
                }
                Some(PipeMessage::Failed { error }) => return Err(Interrupt::Failed(error)),
                // every reader is gone without saying goodbye
                None => break,
            }
        }

        if !stderr.is_empty() {
            self.emit(OutputEvent::Marker(Section::Stderr)).await?;
            // the whole stderr block travels as one event so it is never split
            self.emit(OutputEvent::Line {
                origin: Origin::Stderr,
                data: stderr.freeze(),
            })
            .await?;
        }

        select! {
            biased;
            _ = self.cancel.cancelled() => Err(Interrupt::Cancelled),
            status = self.child.wait() => {
                status.map_err(|err| Interrupt::Failed(JobError::Wait(err)))
            }
        }
    }

    /// Send one event downstream, giving up as soon as the job is cancelled.
    async fn emit(&self, event: OutputEvent) -> Result<(), Interrupt> {
        select! {
            biased;
            _ = self.cancel.cancelled() => Err(Interrupt::Cancelled),
            sent = self.events_tx.send(event) => sent.map_err(|_| {
                // the receiver is gone, so is the client
                self.cancel.cancel();
                Interrupt::Cancelled
            }),
        }
    }

    async fn shutdown(&mut self) {
        match terminate::terminate(&mut self.child, self.grace, &self.state_tx).await {
            Ok(status) => {
                debug!(job_id = %self.job_id, ?status, "job reaped");
            }
            Err(err) => {
                warn!(job_id = %self.job_id, error = %err, "failed to reap job");
            }
        }
    }
}
