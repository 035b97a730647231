//! # toolrelay Core
//!
//! Domain types, traits, and error definitions for the toolrelay tool-call
//! orchestrator. This crate has **no transport dependencies** — it defines the
//! model that the provider adapters, the tool catalog and the orchestration
//! loop all implement against.
//!
//! ## Layout
//!
//! - [`message`] — conversation turns and their segments
//! - [`tool`] — tool descriptors, the catalog trait, invocation results
//! - [`provider`] — the model gateway trait, vendor tool specs, `ModelTurn`
//! - [`naming`] — vendor tool-name alphabets and length limits
//! - [`event`] — structured observability events

pub mod error;
pub mod event;
pub mod message;
pub mod naming;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{CatalogError, Error, ProviderError, Result};
pub use event::{DomainEvent, EventBus};
pub use message::{ConversationHistory, ConversationTurn, Role, Segment, SessionId};
pub use naming::NamePolicy;
pub use provider::{ModelToolCall, ModelTurn, Provider, ProviderRequest, StopReason, Usage, VendorToolSpec};
pub use tool::{ToolCatalog, ToolDescriptor, ToolInvocationResult, ToolOutcome};
