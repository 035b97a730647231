//! The tool-call orchestration loop.
//!
//! One user turn flows through four pieces:
//!
//! 1. **Discover**: the catalog returns tools relevant to the user's text
//! 2. **Translate**: [`SchemaTranslator`] gives each tool a vendor-legal name
//!    and a projected schema, recording the names in a [`NameMapping`]
//! 3. **Complete**: the provider answers with text or tool calls
//! 4. **Invoke**: [`ToolInvoker`] maps vendor names back and runs the calls;
//!    results are fed to the model until it answers in plain text
//!
//! [`ConversationController`] owns one session's history and mapping and
//! bounds the number of tool rounds. [`SessionManager`] holds many sessions.

pub mod controller;
pub mod invoker;
pub mod session;
pub mod translator;

#[cfg(test)]
mod testing;

pub use controller::{
    ControllerConfig, ControllerState, ConversationController, SessionSnapshot, TurnError,
    TurnOutcome,
};
pub use invoker::ToolInvoker;
pub use session::{ControllerFactory, SessionManager};
pub use translator::{NameMapping, SchemaTranslator, TranslateError, Translation, project_schema};
