use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::intent::Intent;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterruptPolicy {
    /// Hand the utterance to the active frame.
    #[default]
    Ignore,
    /// Suspend the active frame and run the intent's task on top of it.
    InterruptAndPush,
    /// Discard the active frame and run the intent's task in its place.
    InterruptAndReplace,
}

impl InterruptPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ignore => "ignore",
            Self::InterruptAndPush => "interrupt_and_push",
            Self::InterruptAndReplace => "interrupt_and_replace",
        }
    }
}

impl FromStr for InterruptPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ignore" => Ok(Self::Ignore),
            "push" | "interrupt_and_push" => Ok(Self::InterruptAndPush),
            "replace" | "interrupt_and_replace" => Ok(Self::InterruptAndReplace),
            other => Err(format!(
                "unsupported interrupt policy `{other}` (expected ignore|interrupt_and_push|interrupt_and_replace)"
            )),
        }
    }
}

/// Per-deployment mapping from intent to interrupt behaviour. Unlisted intents
/// are ignored, and the unclassified intent is always ignored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterruptPolicyTable {
    rules: BTreeMap<Intent, InterruptPolicy>,
}

impl Default for InterruptPolicyTable {
    fn default() -> Self {
        Self::empty()
            .with_rule(Intent::Emergency, InterruptPolicy::InterruptAndReplace)
            .with_rule(Intent::Help, InterruptPolicy::InterruptAndPush)
            .with_rule(Intent::BookFlight, InterruptPolicy::InterruptAndPush)
            .with_rule(Intent::SelfAssessment, InterruptPolicy::InterruptAndPush)
    }
}

impl InterruptPolicyTable {
    pub fn empty() -> Self {
        Self { rules: BTreeMap::new() }
    }

    pub fn with_rule(mut self, intent: Intent, policy: InterruptPolicy) -> Self {
        self.set(intent, policy);
        self
    }

    pub fn set(&mut self, intent: Intent, policy: InterruptPolicy) {
        if policy == InterruptPolicy::Ignore {
            self.rules.remove(&intent);
        } else {
            self.rules.insert(intent, policy);
        }
    }

    pub fn policy_for(&self, intent: Intent) -> InterruptPolicy {
        if intent.is_unclassified() {
            return InterruptPolicy::Ignore;
        }
        self.rules.get(&intent).copied().unwrap_or_default()
    }

    /// Explicit rules only; the unclassified rule is reported even though it
    /// is never honoured, so configuration validation can reject it.
    pub fn rules(&self) -> impl Iterator<Item = (Intent, InterruptPolicy)> + '_ {
        self.rules.iter().map(|(intent, policy)| (*intent, *policy))
    }
}
