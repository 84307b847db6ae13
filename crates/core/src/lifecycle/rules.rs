//! Precondition checks shared by the lifecycle and distribution engines. All
//! of them run before any mutation.

use crate::domain::lead::{Lead, LeadStatus};
use crate::domain::user::User;
use crate::errors::LeadError;

pub fn ensure_not_terminal(lead: &Lead) -> Result<(), LeadError> {
    if lead.status.is_terminal() {
        return Err(LeadError::BusinessRuleViolation(format!(
            "lead {} is already {} and cannot change status",
            lead.id, lead.status
        )));
    }
    Ok(())
}

pub fn ensure_owner(lead: &Lead, actor: &User, verb: &str) -> Result<(), LeadError> {
    if !lead.is_owned_by(actor.id) {
        return Err(LeadError::Unauthorized(format!(
            "user {} is not authorized to {verb} lead {}",
            actor.username, lead.id
        )));
    }
    Ok(())
}

pub fn ensure_manager(actor: &User, verb: &str) -> Result<(), LeadError> {
    if !actor.is_manager() {
        return Err(LeadError::Unauthorized(format!(
            "only managers can {verb} lead conversions"
        )));
    }
    Ok(())
}

pub fn ensure_active(user: &User) -> Result<(), LeadError> {
    if !user.active {
        return Err(LeadError::BusinessRuleViolation(format!(
            "user {} is inactive and cannot own leads",
            user.username
        )));
    }
    Ok(())
}

pub fn escalation_status_allowed(status: LeadStatus) -> bool {
    matches!(status, LeadStatus::Assigned | LeadStatus::InProgress)
}

pub fn approval_status_allowed(status: LeadStatus) -> bool {
    matches!(status, LeadStatus::PreConversion | LeadStatus::InProgress)
}
