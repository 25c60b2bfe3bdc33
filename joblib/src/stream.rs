use crate::events::OutputEvent;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::{
    pin::Pin,
    task::{Context, Poll},
};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::DropGuard;

/// A job's output as a `Stream`.
///
/// Dropping the stream before it ends cancels the job, which is how an HTTP body that the
/// client abandoned tells the job to stop.
pub struct OutputStream {
    inner: ReceiverStream<OutputEvent>,
    _cancel_on_drop: DropGuard,
}

impl OutputStream {
    pub(crate) fn new(inner: ReceiverStream<OutputEvent>, cancel_on_drop: DropGuard) -> Self {
        Self {
            inner,
            _cancel_on_drop: cancel_on_drop,
        }
    }

    /// The rendered wire bytes, one chunk per event.
    pub fn bytes(self) -> impl Stream<Item = Bytes> + Send + 'static {
        self.map(|event| event.render())
    }
}

impl Stream for OutputStream {
    type Item = OutputEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}
