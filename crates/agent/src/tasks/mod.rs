//! Built-in task handlers and the default intent routing.

pub mod booking;
pub mod help;
pub mod triage;

use corebot_core::domain::intent::Intent;
use corebot_core::tasks::{RegistryError, TaskKind, TaskRegistry};

pub use booking::BookFlightTask;
pub use help::HelpTask;
pub use triage::{EmergencyCareTask, SelfAssessmentTask, EMERGENCY_ADVICE, TRIAGE_QUESTION};

/// Registers every built-in task and routes each task intent to it. Cancel
/// and greeting intents stay unrouted; cancel phrases reach the active task.
pub fn default_registry(root: TaskKind) -> Result<TaskRegistry, RegistryError> {
    TaskRegistry::builder()
        .register(SelfAssessmentTask)
        .register(EmergencyCareTask)
        .register(BookFlightTask)
        .register(HelpTask)
        .route(Intent::SelfAssessment, TaskKind::SelfAssessment)
        .route(Intent::Emergency, TaskKind::EmergencyCare)
        .route(Intent::BookFlight, TaskKind::BookFlight)
        .route(Intent::Help, TaskKind::Help)
        .root(root)
        .build()
}
