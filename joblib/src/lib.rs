mod actors;
pub mod error;
pub mod events;
mod job;
mod stream;
pub mod terminate;
pub mod types;

pub use events::{ExitOutcome, Origin, OutputEvent, Section, TerminationState};
pub use job::{Job, JobMonitor, JobSpec, DEFAULT_CAPACITY};
pub use stream::OutputStream;
