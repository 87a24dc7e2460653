use serde::{Deserialize, Serialize};

use crate::model::directive::Directive;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum RejectReason {
    /// A pool (spell slots, hit dice) is empty. Shown to the player as a notice.
    ResourceExhausted(String),
    NoActiveFoe,
    EncounterActive(String),
    Duplicate(String),
    Invalid(String),
}

impl RejectReason {
    pub fn is_resource_exhausted(&self) -> bool {
        matches!(self, RejectReason::ResourceExhausted(_))
    }

    pub fn message(&self) -> String {
        match self {
            RejectReason::ResourceExhausted(detail) => detail.clone(),
            RejectReason::NoActiveFoe => "no foe is engaged".to_string(),
            RejectReason::EncounterActive(name) => format!("already fighting {}", name),
            RejectReason::Duplicate(label) => format!("'{}' is already carried", label),
            RejectReason::Invalid(detail) => detail.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventResult {
    Applied,
    Rejected { reason: RejectReason },
}

/// A bracket token that could not be turned into a directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedDirective {
    pub token: String,
    pub reason: String,
}

/// What happened to every directive of one reply, in application order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrativeApplyReport {
    pub results: Vec<(Directive, EventResult)>,
    pub skipped: Vec<SkippedDirective>,
    pub levels_gained: Vec<u32>,
    /// Last scene description of the reply, to be illustrated.
    pub scene: Option<String>,
    pub foe_defeated: Option<String>,
}

impl NarrativeApplyReport {
    pub fn applied(&self) -> impl Iterator<Item = &Directive> {
        self.results
            .iter()
            .filter(|(_, r)| matches!(r, EventResult::Applied))
            .map(|(d, _)| d)
    }

    pub fn rejected(&self) -> impl Iterator<Item = (&Directive, &RejectReason)> {
        self.results.iter().filter_map(|(d, r)| match r {
            EventResult::Rejected { reason } => Some((d, reason)),
            EventResult::Applied => None,
        })
    }

    /// Player-facing notices for rejected directives.
    pub fn notices(&self) -> Vec<String> {
        self.rejected()
            .filter(|(_, reason)| reason.is_resource_exhausted())
            .map(|(_, reason)| reason.message())
            .collect()
    }
}
