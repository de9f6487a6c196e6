//! Review state machine for generated messages.
//!
//! ```text
//! pending ──approve──▶ approved
//!    │
//!    └────reject────▶ rejected
//! ```
//!
//! `approved` and `rejected` are terminal. Re-review means generating a new message.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::message::MessageStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewAction {
    Approve,
    Reject,
}

impl ReviewAction {
    /// The status a pending message lands in after this action.
    pub fn target(&self) -> MessageStatus {
        match self {
            ReviewAction::Approve => MessageStatus::Approved,
            ReviewAction::Reject => MessageStatus::Rejected,
        }
    }
}

impl fmt::Display for ReviewAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewAction::Approve => f.write_str("approve"),
            ReviewAction::Reject => f.write_str("reject"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot {action} a message that is already {from}")]
pub struct InvalidTransition {
    pub from: MessageStatus,
    pub action: ReviewAction,
}

impl MessageStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, MessageStatus::Pending)
    }

    /// Applies `action` to this status. Only `Pending` accepts a transition.
    pub fn transition(self, action: ReviewAction) -> Result<MessageStatus, InvalidTransition> {
        if self.is_terminal() {
            return Err(InvalidTransition { from: self, action });
        }
        Ok(action.target())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_accepts_both_actions() {
        assert_eq!(
            MessageStatus::Pending.transition(ReviewAction::Approve),
            Ok(MessageStatus::Approved)
        );
        assert_eq!(
            MessageStatus::Pending.transition(ReviewAction::Reject),
            Ok(MessageStatus::Rejected)
        );
    }

    #[test]
    fn test_terminal_states_reject_every_action() {
        for from in [MessageStatus::Approved, MessageStatus::Rejected] {
            assert!(from.is_terminal());
            for action in [ReviewAction::Approve, ReviewAction::Reject] {
                assert_eq!(
                    from.transition(action),
                    Err(InvalidTransition { from, action })
                );
            }
        }
        assert!(!MessageStatus::Pending.is_terminal());
    }

    #[test]
    fn test_invalid_transition_message() {
        let err = MessageStatus::Rejected
            .transition(ReviewAction::Approve)
            .unwrap_err();
        assert_eq!(err.to_string(), "cannot approve a message that is already rejected");
    }
}
