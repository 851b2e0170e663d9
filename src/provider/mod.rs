//! Model provider seam.

mod openrouter;

pub use openrouter::{upstream_error, ProviderClient};

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::Stream;

use crate::chat::ChatMessage;
use crate::error::ChatError;

/// Raw body of one streaming upstream response.
pub type UpstreamBody = Pin<Box<dyn Stream<Item = Result<Bytes, ChatError>> + Send>>;

/// Sampling parameters for one provider call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionOptions {
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

/// Anything that can open a streaming chat completion.
///
/// Each call issues exactly one upstream request and does not mutate shared
/// state.
pub trait CompletionSource: Send + Sync {
    fn open_stream(
        &self,
        messages: &[ChatMessage],
        options: CompletionOptions,
    ) -> impl Future<Output = Result<UpstreamBody, ChatError>> + Send;
}
