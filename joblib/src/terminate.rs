//! Graceful-then-forced shutdown of a child process.
//!
//! The child is asked to stop with `SIGTERM` (sent to its whole process group, so
//! anything it spawned hears it too), given `grace` to exit, and then killed with
//! `SIGKILL`. Every path ends in `wait()`, so the child is always reaped. Group members
//! still running once the leader is gone get the same treatment before the job counts as
//! reaped.

use crate::events::TerminationState;

use std::{io, process::ExitStatus, time::Duration};
use tokio::{process::Child, sync::watch, time};
use tracing::{debug, warn};

pub const DEFAULT_GRACE: Duration = Duration::from_secs(5);

/// How often a lingering process group is checked for survivors.
const GROUP_POLL: Duration = Duration::from_millis(50);

pub async fn terminate(
    child: &mut Child,
    grace: Duration,
    state: &watch::Sender<TerminationState>,
) -> io::Result<ExitStatus> {
    // tokio forgets the pid once the child is reaped
    let pgid = child.id();
    let status = stop_leader(child, grace, state).await?;
    if let Some(pgid) = pgid {
        sweep_group(pgid, grace).await;
    }
    state.send_replace(TerminationState::Reaped);
    Ok(status)
}

async fn stop_leader(
    child: &mut Child,
    grace: Duration,
    state: &watch::Sender<TerminationState>,
) -> io::Result<ExitStatus> {
    match child.try_wait() {
        Ok(Some(status)) => return Ok(status),
        Ok(None) => {}
        Err(err) => warn!(error = %err, "try_wait failed, escalating to kill"),
    }

    let pid = child.id();
    match send_signal(child, Signal::Terminate) {
        Ok(()) => {
            state.send_replace(TerminationState::Signaled);
            debug!(?pid, ?grace, "sent SIGTERM");
            match time::timeout(grace, child.wait()).await {
                Ok(Ok(status)) => return Ok(status),
                Ok(Err(err)) => warn!(?pid, error = %err, "wait failed during grace, killing"),
                Err(_) => warn!(?pid, ?grace, "child ignored SIGTERM, killing"),
            }
        }
        Err(err) => {
            warn!(?pid, error = %err, "failed to send SIGTERM, killing");
        }
    }

    force_kill(child);
    child.wait().await
}

/// Stop whatever the leader left behind in its process group.
#[cfg(unix)]
async fn sweep_group(pgid: u32, grace: Duration) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal as NixSignal};
    use nix::unistd::Pid;

    let pgid = Pid::from_raw(pgid as i32);
    match killpg(pgid, NixSignal::SIGTERM) {
        Err(Errno::ESRCH) => return,
        Err(err) => warn!(%pgid, error = %err, "failed to signal process group"),
        Ok(()) => debug!(%pgid, "sent SIGTERM to leftover group members"),
    }

    let deadline = time::Instant::now() + grace;
    while time::Instant::now() < deadline {
        time::sleep(GROUP_POLL).await;
        if killpg(pgid, None) == Err(Errno::ESRCH) {
            return;
        }
    }
    warn!(%pgid, "process group outlived the grace period, killing");
    let _ = killpg(pgid, NixSignal::SIGKILL);
}

#[cfg(not(unix))]
async fn sweep_group(_pgid: u32, _grace: Duration) {}

fn force_kill(child: &mut Child) {
    let _ = send_signal(child, Signal::Kill);
    // the group kill above may already have done it; an exited child is fine here
    if let Err(err) = child.start_kill() {
        if err.kind() != io::ErrorKind::InvalidInput {
            warn!(error = %err, "start_kill failed");
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum Signal {
    Terminate,
    Kill,
}

#[cfg(unix)]
fn send_signal(child: &Child, which: Signal) -> io::Result<()> {
    use nix::sys::signal::{kill, killpg, Signal as NixSignal};
    use nix::unistd::Pid;

    let pid = child
        .id()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "child already reaped"))?;
    let sig = match which {
        Signal::Terminate => NixSignal::SIGTERM,
        Signal::Kill => NixSignal::SIGKILL,
    };
    // the launcher puts every child in its own process group, led by the child
    let pid = Pid::from_raw(pid as i32);
    killpg(pid, sig)
        .or_else(|_| kill(pid, sig))
        .map_err(io::Error::from)
}

#[cfg(not(unix))]
fn send_signal(_child: &Child, _which: Signal) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "no graceful stop signal on this platform",
    ))
}
