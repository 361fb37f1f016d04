//! Reasoning backends for Taskloom.
//!
//! All backends implement the `taskloom_core::Provider` trait.
//! [`RetryProvider`] wraps any of them with exponential backoff.

pub mod openai_compat;
pub mod retry;

pub use openai_compat::OpenAiCompatProvider;
pub use retry::RetryProvider;
