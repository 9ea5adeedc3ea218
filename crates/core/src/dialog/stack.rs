use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tasks::{SlotState, TaskKind};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameId(pub String);

impl FrameId {
    pub fn generate() -> Self {
        Self(format!("frame-{}", Uuid::new_v4()))
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One active or suspended task instance. The resume point is implied by
/// `slots` (the first missing declared slot); `last_prompt` records what the
/// user was last asked.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFrame {
    pub id: FrameId,
    pub task: TaskKind,
    pub slots: SlotState,
    pub last_prompt: Option<String>,
    pub pushed_at: DateTime<Utc>,
}

impl TaskFrame {
    pub fn new(task: TaskKind) -> Self {
        Self::with_slots(task, SlotState::new())
    }

    pub fn with_slots(task: TaskKind, slots: SlotState) -> Self {
        Self { id: FrameId::generate(), task, slots, last_prompt: None, pushed_at: Utc::now() }
    }
}

/// Ordered frames of one conversation; the last frame is the only active one.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogStack {
    frames: Vec<TaskFrame>,
}

impl DialogStack {
    pub fn push(&mut self, frame: TaskFrame) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) -> Option<TaskFrame> {
        self.frames.pop()
    }

    pub fn peek_active(&self) -> Option<&TaskFrame> {
        self.frames.last()
    }

    pub fn peek_active_mut(&mut self) -> Option<&mut TaskFrame> {
        self.frames.last_mut()
    }

    /// Swaps the active frame for `frame` and returns the discarded one. On an
    /// empty stack this is a push.
    pub fn replace_active(&mut self, frame: TaskFrame) -> Option<TaskFrame> {
        let discarded = self.frames.pop();
        self.frames.push(frame);
        discarded
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frames from the bottom (root) to the top (active).
    pub fn frames(&self) -> &[TaskFrame] {
        &self.frames
    }
}
