//! Continuation engine: drives one user-visible answer across as many
//! upstream calls as it takes for the output to stop looking truncated.
//!
//! ```text
//! Initial -> Streaming -> CheckingCompleteness -> Continuing -> Streaming ...
//!                                      \-> Done
//! any checkpoint -> Aborted
//! ```
//!
//! Deltas from every round go to the same accumulator and the same client
//! sink, serially, so the browser sees them in provider order. `[DONE]` is
//! written once, on `Done` only.

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use super::detector::TruncationCheck;
use super::{build_continuation_messages, calculate_max_tokens, ChatMessage};
use crate::config::{ContinuationConfig, ProviderConfig};
use crate::error::ChatError;
use crate::provider::{CompletionOptions, CompletionSource, UpstreamBody};
use crate::stream::{parse_stream_line, ClientSink, LineStream, StreamEvent};

/// Loop limits and prompt for continuation rounds.
#[derive(Debug, Clone)]
pub struct ContinuationPolicy {
    pub max_continuations: u32,
    pub continuation_prompt: String,
    pub temperature: f32,
}

impl ContinuationPolicy {
    #[must_use]
    pub fn from_config(continuation: &ContinuationConfig, provider: &ProviderConfig) -> Self {
        Self {
            max_continuations: continuation.max_continuations,
            continuation_prompt: continuation.continuation_prompt.clone(),
            temperature: provider.temperature,
        }
    }
}

impl Default for ContinuationPolicy {
    fn default() -> Self {
        Self::from_config(&ContinuationConfig::default(), &ProviderConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStatus {
    Done,
    Aborted,
}

/// Result of a finished (or aborted) turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub status: TurnStatus,
    pub content: String,
    pub upstream_calls: u32,
    pub continuations: u32,
}

/// A turn whose first upstream call already succeeded.
pub struct Turn {
    messages: Vec<ChatMessage>,
    options: CompletionOptions,
    first_body: UpstreamBody,
}

impl Turn {
    #[must_use]
    pub fn options(&self) -> CompletionOptions {
        self.options
    }
}

enum TurnState {
    Streaming(UpstreamBody),
    CheckingCompleteness,
    Continuing,
    Done,
    Aborted,
}

enum RoundEnd {
    Exhausted,
    Aborted,
    Failed(ChatError),
}

pub struct ContinuationEngine<'a, S, C> {
    source: &'a S,
    check: &'a C,
    policy: &'a ContinuationPolicy,
}

impl<'a, S, C> ContinuationEngine<'a, S, C>
where
    S: CompletionSource,
    C: TruncationCheck,
{
    pub fn new(source: &'a S, check: &'a C, policy: &'a ContinuationPolicy) -> Self {
        Self {
            source,
            check,
            policy,
        }
    }

    /// `Initial -> Streaming`: size the token budget and make the first call.
    ///
    /// Failing here means nothing was sent to the browser yet.
    ///
    /// # Errors
    ///
    /// Propagates `ChatError::Config` / `ChatError::Upstream` /
    /// `ChatError::Transport` from the provider.
    pub async fn start(
        &self,
        messages: Vec<ChatMessage>,
        user_message_len: usize,
    ) -> Result<Turn, ChatError> {
        let options = CompletionOptions {
            temperature: self.policy.temperature,
            max_tokens: Some(calculate_max_tokens(user_message_len)),
        };
        let first_body = self.source.open_stream(&messages, options).await?;
        Ok(Turn {
            messages,
            options,
            first_body,
        })
    }

    /// Run the turn to completion, writing frames to `sink`.
    ///
    /// Cancellation (token or browser disconnect) ends the turn quietly with
    /// [`TurnStatus::Aborted`]; the sink is closed without `[DONE]`.
    ///
    /// # Errors
    ///
    /// Returns the upstream or transport error that ended the turn early.
    /// The sink is left open so the caller can fail it.
    pub async fn drive(
        &self,
        turn: Turn,
        sink: &mut ClientSink,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome, ChatError> {
        let Turn {
            messages,
            options,
            first_body,
        } = turn;
        let mut accumulated = String::new();
        let mut continuations = 0u32;
        let mut upstream_calls = 1u32;
        let mut state = TurnState::Streaming(first_body);

        loop {
            state = match state {
                TurnState::Streaming(body) => {
                    let (content, end) = stream_round(body, accumulated, sink, cancel).await;
                    accumulated = content;
                    match end {
                        RoundEnd::Exhausted => TurnState::CheckingCompleteness,
                        RoundEnd::Aborted => TurnState::Aborted,
                        RoundEnd::Failed(err) => return Err(err),
                    }
                }
                TurnState::CheckingCompleteness => {
                    if is_aborted(sink, cancel) {
                        TurnState::Aborted
                    } else if continuations < self.policy.max_continuations
                        && self.check.is_incomplete(&accumulated)
                    {
                        TurnState::Continuing
                    } else {
                        TurnState::Done
                    }
                }
                TurnState::Continuing => {
                    if is_aborted(sink, cancel) {
                        TurnState::Aborted
                    } else {
                        let round_messages = build_continuation_messages(
                            &messages,
                            &accumulated,
                            &self.policy.continuation_prompt,
                        );
                        continuations += 1;
                        tracing::debug!(
                            round = continuations,
                            chars = accumulated.len(),
                            "output looks truncated, continuing"
                        );
                        let opened = tokio::select! {
                            biased;
                            () = cancel.cancelled() => None,
                            () = sink.closed() => None,
                            opened = self.source.open_stream(&round_messages, options) => Some(opened),
                        };
                        match opened {
                            None => TurnState::Aborted,
                            Some(Ok(body)) => {
                                upstream_calls += 1;
                                TurnState::Streaming(body)
                            }
                            Some(Err(err)) => return Err(err),
                        }
                    }
                }
                TurnState::Done => {
                    let cancelled = tokio::select! {
                        biased;
                        () = cancel.cancelled() => true,
                        _ = sink.send_done() => false,
                    };
                    if cancelled {
                        TurnState::Aborted
                    } else {
                        sink.close();
                        return Ok(TurnOutcome {
                            status: TurnStatus::Done,
                            content: accumulated,
                            upstream_calls,
                            continuations,
                        });
                    }
                }
                TurnState::Aborted => {
                    tracing::debug!(upstream_calls, "chat turn aborted by client");
                    sink.close();
                    return Ok(TurnOutcome {
                        status: TurnStatus::Aborted,
                        content: accumulated,
                        upstream_calls,
                        continuations,
                    });
                }
            };
        }
    }
}

#[inline]
fn is_aborted(sink: &ClientSink, cancel: &CancellationToken) -> bool {
    cancel.is_cancelled() || sink.is_closed()
}

/// Forward one upstream body. The accumulator is moved in and handed back;
/// the body (and its connection) is dropped before returning.
async fn stream_round(
    body: UpstreamBody,
    mut accumulated: String,
    sink: &mut ClientSink,
    cancel: &CancellationToken,
) -> (String, RoundEnd) {
    let mut lines = LineStream::new(body);
    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => return (accumulated, RoundEnd::Aborted),
            () = sink.closed() => return (accumulated, RoundEnd::Aborted),
            next = lines.next() => next,
        };

        let line = match next {
            None => return (accumulated, RoundEnd::Exhausted),
            Some(Err(err)) => return (accumulated, RoundEnd::Failed(err)),
            Some(Ok(line)) => line,
        };
        if is_aborted(sink, cancel) {
            return (accumulated, RoundEnd::Aborted);
        }

        match parse_stream_line(&line) {
            Some(StreamEvent::Delta(delta)) => {
                accumulated.push_str(&delta);
                // A stalled reader must not hold off cancellation.
                let delivered = tokio::select! {
                    biased;
                    () = cancel.cancelled() => false,
                    sent = sink.send_content(&delta) => sent,
                };
                if !delivered {
                    return (accumulated, RoundEnd::Aborted);
                }
            }
            Some(StreamEvent::Done) => tracing::trace!("upstream round signalled [DONE]"),
            None => {}
        }
    }
}
