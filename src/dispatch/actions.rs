//! Auto-response collaborators.
//!
//! Account/identity store and compliance desk boundaries the dispatcher
//! calls into. The platform wires real implementations; the in-memory ones
//! here back tests and single-process embeddings.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::AuditResult;
use crate::storage::Violation;

/// Risk score floor applied by `flag_account`. Raised-to, never lowered.
pub const FLAGGED_RISK_FLOOR: u8 = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Active,
    Blocked,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Blocked => "blocked",
        }
    }
}

/// Account/identity store boundary.
pub trait AccountDirectory: Send + Sync {
    fn set_account_status(&self, user_id: &str, status: AccountStatus) -> AuditResult<()>;

    /// Raise the user's risk score to at least `floor`. Never lowers it.
    fn raise_risk_score(&self, user_id: &str, floor: u8) -> AuditResult<()>;
}

/// Compliance notification / ticketing boundary. Opaque calls; failures are
/// logged by the dispatcher, not retried.
pub trait ComplianceDesk: Send + Sync {
    fn notify_compliance(&self, violation: &Violation) -> AuditResult<()>;
    fn create_ticket(&self, violation: &Violation) -> AuditResult<()>;
}

// ============================================================================
// IN-MEMORY IMPLEMENTATIONS
// ============================================================================

#[derive(Default)]
pub struct MemoryAccountDirectory {
    statuses: RwLock<HashMap<String, AccountStatus>>,
    risk_scores: RwLock<HashMap<String, u8>>,
}

impl MemoryAccountDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status_of(&self, user_id: &str) -> Option<AccountStatus> {
        self.statuses.read().get(user_id).copied()
    }

    pub fn risk_score_of(&self, user_id: &str) -> Option<u8> {
        self.risk_scores.read().get(user_id).copied()
    }

    pub fn set_risk_score(&self, user_id: &str, score: u8) {
        self.risk_scores.write().insert(user_id.to_string(), score);
    }
}

impl AccountDirectory for MemoryAccountDirectory {
    fn set_account_status(&self, user_id: &str, status: AccountStatus) -> AuditResult<()> {
        self.statuses.write().insert(user_id.to_string(), status);
        Ok(())
    }

    fn raise_risk_score(&self, user_id: &str, floor: u8) -> AuditResult<()> {
        let mut scores = self.risk_scores.write();
        let entry = scores.entry(user_id.to_string()).or_insert(0);
        if *entry < floor {
            *entry = floor;
        }
        Ok(())
    }
}

/// Desk that records notifications/tickets, for tests; production wires the
/// platform's real desk behind the same trait.
#[derive(Default)]
pub struct MemoryComplianceDesk {
    notifications: RwLock<Vec<String>>,
    tickets: RwLock<Vec<String>>,
}

impl MemoryComplianceDesk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notification_count(&self) -> usize {
        self.notifications.read().len()
    }

    pub fn ticket_count(&self) -> usize {
        self.tickets.read().len()
    }
}

impl ComplianceDesk for MemoryComplianceDesk {
    fn notify_compliance(&self, violation: &Violation) -> AuditResult<()> {
        self.notifications.write().push(violation.rule_name.clone());
        Ok(())
    }

    fn create_ticket(&self, violation: &Violation) -> AuditResult<()> {
        self.tickets.write().push(violation.rule_name.clone());
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raise_risk_score_is_a_floor() {
        let directory = MemoryAccountDirectory::new();
        directory.raise_risk_score("u1", FLAGGED_RISK_FLOOR).unwrap();
        assert_eq!(directory.risk_score_of("u1"), Some(80));

        // never lowers an already higher score
        directory.set_risk_score("u2", 95);
        directory.raise_risk_score("u2", FLAGGED_RISK_FLOOR).unwrap();
        assert_eq!(directory.risk_score_of("u2"), Some(95));
    }

    #[test]
    fn test_set_account_status() {
        let directory = MemoryAccountDirectory::new();
        assert_eq!(directory.status_of("u1"), None);
        directory.set_account_status("u1", AccountStatus::Blocked).unwrap();
        assert_eq!(directory.status_of("u1"), Some(AccountStatus::Blocked));
    }
}
