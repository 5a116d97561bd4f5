//! Completion provider integrations for parley
//!
//! This crate defines the [`CompletionProvider`] abstraction and an
//! implementation backed by the OpenAI Responses API.

pub mod base;
pub mod openai;

pub use base::{
    CompletionError, CompletionErrorKind, CompletionProvider, CompletionResponse,
    CompletionResult, ContentItem, OutputItem,
};
pub use openai::OpenAiResponsesClient;
