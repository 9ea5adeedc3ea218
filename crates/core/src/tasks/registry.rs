use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use thiserror::Error;

use crate::dialog::policy::{InterruptPolicy, InterruptPolicyTable};
use crate::domain::intent::Intent;

use super::{TaskHandler, TaskKind};

/// Misconfiguration detected while wiring handlers. Always fatal at startup.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("task `{0}` is registered more than once")]
    DuplicateTask(TaskKind),
    #[error("task `{task}` declares slot `{slot}` more than once")]
    DuplicateSlot { task: TaskKind, slot: String },
    #[error("task `{task}` declares slot `{slot}` with an empty prompt")]
    EmptyPrompt { task: TaskKind, slot: String },
    #[error("task `{task}` has an invalid template: {message}")]
    InvalidTemplate { task: TaskKind, message: String },
    #[error("no root task configured")]
    MissingRootTask,
    #[error("root task `{0}` has no registered handler")]
    RootTaskNotRegistered(TaskKind),
    #[error("intent `{intent}` routes to unregistered task `{task}`")]
    RouteToUnregisteredTask { intent: Intent, task: TaskKind },
    #[error("intent `{intent}` has policy {policy:?} but no task route")]
    PolicyWithoutRoute { intent: Intent, policy: InterruptPolicy },
    #[error("the unclassified intent cannot be routed to a task")]
    UnclassifiedRoute,
}

/// Static mapping from intent to task handler, resolved once at startup.
pub struct TaskRegistry {
    handlers: HashMap<TaskKind, Arc<dyn TaskHandler>>,
    routes: BTreeMap<Intent, TaskKind>,
    root: TaskKind,
}

impl std::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut tasks = self.handlers.keys().collect::<Vec<_>>();
        tasks.sort();
        f.debug_struct("TaskRegistry")
            .field("tasks", &tasks)
            .field("routes", &self.routes)
            .field("root", &self.root)
            .finish()
    }
}

impl TaskRegistry {
    pub fn builder() -> TaskRegistryBuilder {
        TaskRegistryBuilder::default()
    }

    pub fn root(&self) -> TaskKind {
        self.root
    }

    pub fn handler(&self, task: TaskKind) -> Option<&Arc<dyn TaskHandler>> {
        self.handlers.get(&task)
    }

    pub fn task_for(&self, intent: Intent) -> Option<TaskKind> {
        self.routes.get(&intent).copied()
    }

    pub fn tasks(&self) -> Vec<TaskKind> {
        let mut tasks = self.handlers.keys().copied().collect::<Vec<_>>();
        tasks.sort();
        tasks
    }

    pub fn routes(&self) -> &BTreeMap<Intent, TaskKind> {
        &self.routes
    }

    /// Every intent that may interrupt must have a task to interrupt with.
    pub fn validate_policy(&self, policy: &InterruptPolicyTable) -> Result<(), RegistryError> {
        for intent in Intent::ALL {
            let rule = policy.policy_for(intent);
            if rule != InterruptPolicy::Ignore && !self.routes.contains_key(&intent) {
                return Err(RegistryError::PolicyWithoutRoute { intent, policy: rule });
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct TaskRegistryBuilder {
    handlers: Vec<Arc<dyn TaskHandler>>,
    routes: Vec<(Intent, TaskKind)>,
    root: Option<TaskKind>,
}

impl TaskRegistryBuilder {
    pub fn register<H>(mut self, handler: H) -> Self
    where
        H: TaskHandler + 'static,
    {
        self.handlers.push(Arc::new(handler));
        self
    }

    pub fn route(mut self, intent: Intent, task: TaskKind) -> Self {
        self.routes.push((intent, task));
        self
    }

    pub fn root(mut self, task: TaskKind) -> Self {
        self.root = Some(task);
        self
    }

    pub fn build(self) -> Result<TaskRegistry, RegistryError> {
        let mut handlers = HashMap::new();
        for handler in self.handlers {
            validate_handler(handler.as_ref())?;
            let kind = handler.kind();
            if handlers.insert(kind, handler).is_some() {
                return Err(RegistryError::DuplicateTask(kind));
            }
        }

        let mut routes = BTreeMap::new();
        for (intent, task) in self.routes {
            if intent.is_unclassified() {
                return Err(RegistryError::UnclassifiedRoute);
            }
            if !handlers.contains_key(&task) {
                return Err(RegistryError::RouteToUnregisteredTask { intent, task });
            }
            routes.insert(intent, task);
        }

        let root = self.root.ok_or(RegistryError::MissingRootTask)?;
        if !handlers.contains_key(&root) {
            return Err(RegistryError::RootTaskNotRegistered(root));
        }

        Ok(TaskRegistry { handlers, routes, root })
    }
}

fn validate_handler(handler: &dyn TaskHandler) -> Result<(), RegistryError> {
    let task = handler.kind();
    let mut seen = BTreeSet::new();

    for slot in handler.slots() {
        if !seen.insert(slot.name) {
            return Err(RegistryError::DuplicateSlot { task, slot: slot.name.to_string() });
        }
        let reprompt_empty = slot.reprompt.is_some_and(|text| text.trim().is_empty());
        if slot.prompt.trim().is_empty() || reprompt_empty {
            return Err(RegistryError::EmptyPrompt { task, slot: slot.name.to_string() });
        }
    }

    let declared = seen.into_iter().collect::<Vec<_>>();
    for template in handler.templates() {
        template
            .check(&declared)
            .map_err(|error| RegistryError::InvalidTemplate { task, message: error.to_string() })?;
    }

    Ok(())
}
