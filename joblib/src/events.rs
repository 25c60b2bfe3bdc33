use crate::types::OutputBlob;
use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

/// Where a job sits in its termination lifecycle.
///
/// Transitions only move forward: `Running -> Signaled -> Reaped`, or
/// `Running -> Reaped` when the child exits on its own.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum TerminationState {
    Running,
    Signaled,
    Reaped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitOutcome {
    Exited { code: i32 },
    Killed { signal: i32 },
}

impl ExitOutcome {
    pub fn success(&self) -> bool {
        matches!(self, ExitOutcome::Exited { code: 0 })
    }

    /// Exit code as reported on the wire. Signal deaths are negative.
    pub fn code(&self) -> i32 {
        match *self {
            ExitOutcome::Exited { code } => code,
            ExitOutcome::Killed { signal } => -signal,
        }
    }
}

impl From<std::process::ExitStatus> for ExitOutcome {
    fn from(status: std::process::ExitStatus) -> Self {
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return ExitOutcome::Killed { signal };
            }
        }
        ExitOutcome::Exited {
            code: status.code().unwrap_or(-1),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    Stdout,
    Stderr,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Stdout => f.write_str("stdout"),
            Origin::Stderr => f.write_str("stderr"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Section {
    Stdout,
    Stderr,
}

/// One unit of a job's streamed output, in emission order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutputEvent {
    Marker(Section),
    Line { origin: Origin, data: OutputBlob },
    Finished { tool: String, outcome: ExitOutcome },
    ServerError(String),
}

impl OutputEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OutputEvent::Finished { .. } | OutputEvent::ServerError(_)
        )
    }

    /// Wire bytes for this event. Every rendered event ends with a newline.
    pub fn render(&self) -> Bytes {
        match self {
            OutputEvent::Marker(Section::Stdout) => Bytes::from_static(b"--- STDOUT ---\n"),
            OutputEvent::Marker(Section::Stderr) => Bytes::from_static(b"--- STDERR ---\n"),
            OutputEvent::Line { data, .. } => {
                if data.ends_with(b"\n") {
                    data.clone()
                } else {
                    let mut buf = BytesMut::with_capacity(data.len() + 1);
                    buf.put_slice(data);
                    buf.put_u8(b'\n');
                    buf.freeze()
                }
            }
            OutputEvent::Finished { tool, outcome } if outcome.success() => {
                Bytes::from(format!("--- {} process finished successfully ---\n", tool))
            }
            OutputEvent::Finished { tool, outcome } => Bytes::from(format!(
                "--- {} process exited with code {} ---\n",
                tool,
                outcome.code()
            )),
            OutputEvent::ServerError(description) => {
                Bytes::from(format!("--- Server Error ---\n{}\n", description))
            }
        }
    }
}
