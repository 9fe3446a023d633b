//! Embedding and answering providers consumed by the Quarry pipeline.

pub mod any;
#[cfg(feature = "candle")]
pub mod candle_embed;
pub mod error;
pub mod http;
#[cfg(feature = "mock")]
pub mod mock;
pub mod ollama;
pub mod openai;
pub mod provider;

pub use any::AnyProvider;
pub use error::LlmError;
pub use provider::{EmbedFn, EmbedFuture, LlmProvider, Message, Role, StatusTx};
