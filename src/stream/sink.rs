//! Outbound channel to the browser.
//!
//! Client disconnects race with in-flight writes, so every operation on a
//! closed sink is a no-op instead of an error.

use bytes::Bytes;
use futures_util::Stream;
use tokio::sync::mpsc;

use super::sse::{content_frame, done_frame};

/// Item type of the response body stream.
pub type SinkItem = Result<Bytes, std::io::Error>;

/// Frames buffered between the turn task and the HTTP body.
pub const DEFAULT_SINK_CAPACITY: usize = 32;

/// Write half of the browser stream. Closing is idempotent.
#[derive(Debug)]
pub struct ClientSink {
    tx: Option<mpsc::Sender<SinkItem>>,
}

/// Create a sink and the body stream that drains it.
pub fn client_channel(capacity: usize) -> (ClientSink, impl Stream<Item = SinkItem> + Send + 'static) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let body = futures_util::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    });
    (ClientSink { tx: Some(tx) }, body)
}

impl ClientSink {
    /// True once the sink was closed locally or the reader went away.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.as_ref().map_or(true, mpsc::Sender::is_closed)
    }

    /// Resolves when the reader side is dropped (or immediately if closed).
    pub async fn closed(&self) {
        if let Some(tx) = self.tx.as_ref() {
            tx.closed().await;
        }
    }

    /// Enqueue raw bytes, waiting for capacity. Returns `false` if the sink is closed.
    pub async fn send(&mut self, bytes: Bytes) -> bool {
        let Some(tx) = self.tx.as_ref() else {
            return false;
        };
        let delivered = tx.reserve().await.map(|permit| permit.send(Ok(bytes))).is_ok();
        if !delivered {
            self.tx = None;
        }
        delivered
    }

    pub async fn send_content(&mut self, content: &str) -> bool {
        self.send(content_frame(content)).await
    }

    pub async fn send_done(&mut self) -> bool {
        self.send(done_frame()).await
    }

    /// Terminate the body abnormally, then close.
    pub async fn fail(&mut self, message: impl Into<String>) {
        if let Some(tx) = self.tx.take() {
            let err = std::io::Error::other(message.into());
            let _ = tx.send(Err(err)).await;
        }
    }

    pub fn close(&mut self) {
        self.tx = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn test_frames_then_end_of_stream() {
        let (mut sink, body) = client_channel(4);
        assert!(sink.send_content("hi").await);
        assert!(sink.send_done().await);
        sink.close();
        let frames: Vec<Bytes> = body.map(|item| item.unwrap()).collect().await;
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].as_ref(), b"data: {\"content\":\"hi\"}\n\n");
        assert_eq!(frames[1].as_ref(), b"data: [DONE]\n\n");
    }

    #[tokio::test]
    async fn test_close_twice_is_noop() {
        let (mut sink, _body) = client_channel(1);
        sink.close();
        sink.close();
        assert!(sink.is_closed());
        assert!(!sink.send_content("late").await);
        sink.fail("ignored").await;
    }

    #[tokio::test]
    async fn test_send_after_reader_dropped() {
        let (mut sink, body) = client_channel(1);
        drop(body);
        assert!(sink.is_closed());
        assert!(!sink.send_content("nobody listens").await);
        sink.closed().await;
        sink.close();
    }

    #[tokio::test]
    async fn test_fail_yields_error_item() {
        let (mut sink, body) = client_channel(2);
        assert!(sink.send_content("a").await);
        sink.fail("upstream reset").await;
        assert!(sink.is_closed());
        let items: Vec<SinkItem> = body.collect().await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(items[1].is_err());
    }
}
