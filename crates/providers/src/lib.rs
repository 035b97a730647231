//! LLM Provider implementations for toolrelay.
//!
//! All providers implement the `toolrelay_core::Provider` trait and normalize
//! vendor responses into `ModelTurn`. The router selects the correct provider
//! based on configuration.

mod http;

pub mod anthropic;
pub mod openai_compat;
pub mod prompted;
pub mod router;

pub use anthropic::AnthropicProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use prompted::PromptedProvider;
pub use router::{ProviderRouter, build_from_config, build_router};
