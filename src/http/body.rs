//! Response body that runs a hook once the body is finished.
//!
//! The hook fires exactly once: at end of stream, on a body error, or when the
//! body is dropped early (client disconnect, cancelled response).

use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::{Body, Bytes, HttpBody};
use http_body::{Frame, SizeHint};

type OnComplete = Box<dyn FnOnce() + Send>;

pub struct TrackedBody {
    inner: Body,
    on_complete: Option<OnComplete>,
}

impl TrackedBody {
    pub fn new(inner: Body, on_complete: impl FnOnce() + Send + 'static) -> Self {
        Self {
            inner,
            on_complete: Some(Box::new(on_complete)),
        }
    }

    fn complete(&mut self) {
        if let Some(hook) = self.on_complete.take() {
            hook();
        }
    }
}

impl HttpBody for TrackedBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_frame(cx);
        match &polled {
            Poll::Ready(None) | Poll::Ready(Some(Err(_))) => this.complete(),
            Poll::Ready(Some(Ok(_))) if this.inner.is_end_stream() => this.complete(),
            _ => {}
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for TrackedBody {
    fn drop(&mut self) {
        self.complete();
    }
}
