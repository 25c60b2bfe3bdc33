use crate::error::Error;
use crate::events::Origin;
use crate::types::OutputBlob;

/// Messages sent from the pipe readers to the worker actor.
#[derive(Debug)]
pub enum PipeMessage {
    Line { origin: Origin, data: OutputBlob },
    Closed { origin: Origin },
    Failed { error: Error },
}
