use std::{io, result};
use thiserror;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The program could not be started at all; nothing was streamed.
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to read {origin} of job: {source}")]
    Read {
        origin: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("failed to wait for job exit: {0}")]
    Wait(#[source] io::Error),
}

pub type Result<T> = result::Result<T, Error>;
