//! Aggregate operator status document.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionType {
    Available,
    Progressing,
    Degraded,
    Upgradeable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: ConditionType,
    pub status: ConditionStatus,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    pub last_transition_ms: u64,
}

/// An object whose state contributes to the operator's health.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelatedObject {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub group: String,
    pub resource: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
}

/// Lifecycle phase of a reporting session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportPhase {
    Starting,
    Running,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorStatus {
    pub name: String,
    pub version: String,
    pub reporter: String,
    pub phase: ReportPhase,
    pub conditions: Vec<Condition>,
    pub related_objects: Vec<RelatedObject>,
    pub last_update_ms: u64,
}

impl OperatorStatus {
    pub fn condition(&self, condition_type: ConditionType) -> Option<&Condition> {
        self.conditions
            .iter()
            .find(|c| c.condition_type == condition_type)
    }
}

/// Conditions published for a phase.
pub fn conditions_for(phase: ReportPhase, since_ms: u64) -> Vec<Condition> {
    use ConditionStatus::{False, True};
    use ConditionType::*;

    let (available, progressing, reason, message) = match phase {
        ReportPhase::Starting => (False, True, "Starting", "Operator is starting"),
        ReportPhase::Running => (True, False, "AsExpected", "Operator is running"),
        ReportPhase::Stopped => (False, False, "LeadershipReleased", "Leadership released, operator stopped"),
    };

    let condition = |condition_type, status, reason: &str, message: &str| Condition {
        condition_type,
        status,
        reason: reason.to_string(),
        message: message.to_string(),
        last_transition_ms: since_ms,
    };

    vec![
        condition(Available, available, reason, message),
        condition(Progressing, progressing, reason, message),
        condition(Degraded, False, "", ""),
        condition(Upgradeable, True, "", ""),
    ]
}
