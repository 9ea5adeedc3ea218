pub mod conversation;
pub mod intent;
pub mod message;

pub use conversation::{ConversationId, ConversationState};
pub use intent::{Entities, Intent, IntentResult, IntentScore, Recognition, UnknownIntent};
pub use message::{MessageKind, OutgoingMessage};
