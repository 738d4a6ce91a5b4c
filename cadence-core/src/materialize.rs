//! Scheduling modes and the materialization action they resolve to.

use serde::{Deserialize, Serialize};

/// How a due occurrence turns into a real transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulingMode {
    /// Post the transaction without asking.
    #[serde(rename = "auto-post")]
    AutoPost,
    /// Hold the occurrence until an explicit approval arrives.
    #[serde(rename = "manual-approval")]
    ManualApproval,
    /// Create the transaction in a draft state for later review.
    #[serde(rename = "create-as-draft")]
    CreateAsDraft,
}

/// What the host should do for one due occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaterializeAction {
    #[serde(rename = "auto-post")]
    AutoPost,
    #[serde(rename = "request-approval")]
    RequestApproval,
    #[serde(rename = "create-draft")]
    CreateDraft,
}

impl SchedulingMode {
    pub fn label(&self) -> &'static str {
        match self {
            SchedulingMode::AutoPost => "auto-post",
            SchedulingMode::ManualApproval => "manual-approval",
            SchedulingMode::CreateAsDraft => "create-as-draft",
        }
    }
}

/// Total map from mode to action. No side effects: the host performs the
/// materialization and then calls `ScheduleState::mark_generated`.
pub fn resolve_action(mode: SchedulingMode) -> MaterializeAction {
    match mode {
        SchedulingMode::AutoPost => MaterializeAction::AutoPost,
        SchedulingMode::ManualApproval => MaterializeAction::RequestApproval,
        SchedulingMode::CreateAsDraft => MaterializeAction::CreateDraft,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_action_mapping_is_total() {
        assert_eq!(
            resolve_action(SchedulingMode::AutoPost),
            MaterializeAction::AutoPost
        );
        assert_eq!(
            resolve_action(SchedulingMode::ManualApproval),
            MaterializeAction::RequestApproval
        );
        assert_eq!(
            resolve_action(SchedulingMode::CreateAsDraft),
            MaterializeAction::CreateDraft
        );
    }
}
