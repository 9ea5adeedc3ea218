use serde::Serialize;

use crate::domain::conversation::ConversationId;
use crate::domain::message::OutgoingMessage;
use crate::errors::ApplicationError;
use crate::router::{Router, TurnReply};
use crate::tasks::TaskKind;

/// One utterance and everything the router said back.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TranscriptEntry {
    pub turn: u64,
    pub utterance: String,
    pub intent: Option<String>,
    pub replies: Vec<OutgoingMessage>,
    pub active_task: Option<TaskKind>,
    pub depth: usize,
}

impl TranscriptEntry {
    fn from_reply(utterance: &str, reply: TurnReply) -> Self {
        Self {
            turn: reply.turn,
            utterance: utterance.to_string(),
            intent: reply.intent.map(|intent| intent.intent.as_str().to_string()),
            replies: reply.messages,
            active_task: reply.active_task,
            depth: reply.depth,
        }
    }
}

/// Drives a router one utterance per turn against a single conversation.
pub struct TurnHarness<'a> {
    router: &'a Router,
    conversation_id: ConversationId,
    entries: Vec<TranscriptEntry>,
}

impl<'a> TurnHarness<'a> {
    pub fn new(router: &'a Router, conversation_id: ConversationId) -> Self {
        Self { router, conversation_id, entries: Vec::new() }
    }

    pub fn conversation_id(&self) -> &ConversationId {
        &self.conversation_id
    }

    pub async fn send(&mut self, utterance: &str) -> Result<&TranscriptEntry, ApplicationError> {
        let reply = self.router.handle_turn(&self.conversation_id, utterance).await?;
        self.entries.push(TranscriptEntry::from_reply(utterance, reply));
        let index = self.entries.len() - 1;
        Ok(&self.entries[index])
    }

    /// Every message emitted so far, in order.
    pub fn messages(&self) -> Vec<OutgoingMessage> {
        self.entries.iter().flat_map(|entry| entry.replies.iter().cloned()).collect()
    }

    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn into_transcript(self) -> Vec<TranscriptEntry> {
        self.entries
    }
}

/// Feeds `utterances` in order and returns every emitted message in order.
pub async fn run<I, S>(
    router: &Router,
    conversation_id: ConversationId,
    utterances: I,
) -> Result<Vec<OutgoingMessage>, ApplicationError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut harness = TurnHarness::new(router, conversation_id);
    for utterance in utterances {
        harness.send(utterance.as_ref()).await?;
    }
    Ok(harness.messages())
}

/// Like [`run`] but keeps the per-turn breakdown.
pub async fn transcript<I, S>(
    router: &Router,
    conversation_id: ConversationId,
    utterances: I,
) -> Result<Vec<TranscriptEntry>, ApplicationError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut harness = TurnHarness::new(router, conversation_id);
    for utterance in utterances {
        harness.send(utterance.as_ref()).await?;
    }
    Ok(harness.into_transcript())
}
