//! Interruptible dialog stack and the per-turn routing algorithm.

pub mod engine;
pub mod policy;
pub mod stack;

pub use engine::{
    pending_slot, DialogEngine, DialogSettings, PopReason, StackEvent, TurnOutcome,
    DEFAULT_CANCEL_NOTICE, DEFAULT_RESTART_PROMPT,
};
pub use policy::{InterruptPolicy, InterruptPolicyTable};
pub use stack::{DialogStack, FrameId, TaskFrame};
