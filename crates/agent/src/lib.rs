//! Agent runtime: the concrete pieces plugged into the core router.
//!
//! - `conversation` - deterministic keyword classifier
//! - `remote` - HTTP classifier for an external recognizer
//! - `tasks` - built-in task handlers and default intent routing
//! - `runtime` - builds a ready `Router` from `AppConfig`
//!
//! The classifier only labels utterances. Which task runs, and what it asks
//! next, is always decided by the dialog engine and the task handlers.

pub mod conversation;
pub mod remote;
pub mod runtime;
pub mod tasks;

pub use conversation::KeywordIntentClassifier;
pub use remote::HttpIntentClassifier;
pub use runtime::{AgentRuntime, RuntimeError};
