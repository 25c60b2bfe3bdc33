use super::messages::PipeMessage;
use crate::error::Error;
use crate::events::Origin;

use bytes::Bytes;
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    sync::mpsc,
    task::JoinHandle,
};

/// Spawn a task that reads `pipe` line by line and hands every line to the worker actor.
///
/// A stream that closes without a trailing newline still yields its last partial line.
pub fn spawn<R>(origin: Origin, pipe: R, pipe_tx: mpsc::Sender<PipeMessage>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(pipe);
        loop {
            let mut line = Vec::new();
            match reader.read_until(b'\n', &mut line).await {
                Ok(0) => {
                    let _ = pipe_tx.send(PipeMessage::Closed { origin }).await;
                    break;
                }
                Ok(_) => {
                    let msg = PipeMessage::Line {
                        origin,
                        data: Bytes::from(line),
                    };
                    if pipe_tx.send(msg).await.is_err() {
                        // actor is gone, nobody wants the rest
                        break;
                    }
                }
                Err(source) => {
                    let error = Error::Read {
                        origin: match origin {
                            Origin::Stdout => "stdout",
                            Origin::Stderr => "stderr",
                        },
                        source,
                    };
                    let _ = pipe_tx.send(PipeMessage::Failed { error }).await;
                    break;
                }
            }
        }
    })
}
