//! Incremental line decoder for upstream SSE bodies.
//!
//! Transport chunks do not line up with line boundaries (or with UTF-8
//! character boundaries), so both a text carry-over and a partial-character
//! tail are kept between reads.

use std::pin::Pin;
use std::task::{ready, Context, Poll};

use bytes::Bytes;
use futures_util::Stream;
use memchr::memchr_iter;
use pin_project_lite::pin_project;
use smallvec::SmallVec;

const REPLACEMENT: char = '\u{FFFD}';

/// Splits decoded text on `\n`, keeping the unterminated fragment buffered.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: String,
    utf8_tail: Vec<u8>,
}

impl LineDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one transport chunk; complete lines are appended to `out`.
    pub fn push(&mut self, chunk: &[u8], out: &mut PendingLines) {
        if self.utf8_tail.is_empty() {
            self.decode_into_buffer(chunk);
        } else {
            let mut joined = std::mem::take(&mut self.utf8_tail);
            joined.extend_from_slice(chunk);
            self.decode_into_buffer(&joined);
        }
        self.drain_complete_lines(out);
    }

    /// Flush at end of input: the carried fragment, if it holds anything but
    /// whitespace, is returned as a final line.
    pub fn finish(&mut self) -> Option<String> {
        if !self.utf8_tail.is_empty() {
            self.utf8_tail.clear();
            self.buffer.push(REPLACEMENT);
        }
        let rest = std::mem::take(&mut self.buffer);
        if rest.trim().is_empty() {
            return None;
        }
        Some(match rest.strip_suffix('\r') {
            Some(stripped) => stripped.to_string(),
            None => rest,
        })
    }

    fn decode_into_buffer(&mut self, mut bytes: &[u8]) {
        loop {
            match std::str::from_utf8(bytes) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    return;
                }
                Err(err) => {
                    let (valid, rest) = bytes.split_at(err.valid_up_to());
                    if let Ok(text) = std::str::from_utf8(valid) {
                        self.buffer.push_str(text);
                    }
                    match err.error_len() {
                        // incomplete sequence at the end: wait for the next chunk
                        None => {
                            self.utf8_tail.extend_from_slice(rest);
                            return;
                        }
                        Some(invalid_len) => {
                            self.buffer.push(REPLACEMENT);
                            bytes = &rest[invalid_len..];
                        }
                    }
                }
            }
        }
    }

    fn drain_complete_lines(&mut self, out: &mut PendingLines) {
        let mut consumed = 0usize;
        for line_end in memchr_iter(b'\n', self.buffer.as_bytes()) {
            let mut line = &self.buffer[consumed..line_end];
            if let Some(stripped) = line.strip_suffix('\r') {
                line = stripped;
            }
            out.push(line.to_string());
            consumed = line_end + 1;
        }
        if consumed > 0 {
            self.buffer.drain(..consumed);
        }
    }
}

/// FIFO of decoded lines waiting to be yielded.
#[derive(Debug, Default)]
pub struct PendingLines {
    lines: SmallVec<[String; 8]>,
    head: usize,
}

impl PendingLines {
    #[inline]
    fn push(&mut self, line: String) {
        self.lines.push(line);
    }

    #[inline]
    pub fn pop_front(&mut self) -> Option<String> {
        if self.head >= self.lines.len() {
            return None;
        }
        let line = std::mem::take(&mut self.lines[self.head]);
        self.head += 1;
        if self.head == self.lines.len() {
            self.lines.clear();
            self.head = 0;
        }
        Some(line)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.head >= self.lines.len()
    }
}

pin_project! {
    /// Lazy, finite, non-restartable sequence of lines over a byte stream.
    ///
    /// A transport error is yielded once and ends the sequence without
    /// flushing the carried fragment.
    pub struct LineStream<S> {
        #[pin]
        inner: S,
        decoder: LineDecoder,
        pending: PendingLines,
        finished: bool,
    }
}

impl<S> LineStream<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            decoder: LineDecoder::new(),
            pending: PendingLines::default(),
            finished: false,
        }
    }
}

impl<S, E> Stream for LineStream<S>
where
    S: Stream<Item = Result<Bytes, E>>,
{
    type Item = Result<String, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        loop {
            if let Some(line) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(line)));
            }
            if *this.finished {
                return Poll::Ready(None);
            }
            match ready!(this.inner.as_mut().poll_next(cx)) {
                Some(Ok(chunk)) => this.decoder.push(&chunk, this.pending),
                Some(Err(err)) => {
                    *this.finished = true;
                    return Poll::Ready(Some(Err(err)));
                }
                None => {
                    *this.finished = true;
                    if let Some(rest) = this.decoder.finish() {
                        this.pending.push(rest);
                    }
                }
            }
        }
    }
}
