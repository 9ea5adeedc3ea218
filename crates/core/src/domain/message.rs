use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Prompt,
    Confirmation,
    Cancellation,
    Restart,
}

/// One outbound reply handed to the channel adapter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub text: String,
    pub kind: MessageKind,
}

impl OutgoingMessage {
    pub fn prompt(text: impl Into<String>) -> Self {
        Self { text: text.into(), kind: MessageKind::Prompt }
    }

    pub fn confirmation(text: impl Into<String>) -> Self {
        Self { text: text.into(), kind: MessageKind::Confirmation }
    }

    pub fn cancellation(text: impl Into<String>) -> Self {
        Self { text: text.into(), kind: MessageKind::Cancellation }
    }

    pub fn restart(text: impl Into<String>) -> Self {
        Self { text: text.into(), kind: MessageKind::Restart }
    }
}
