//! Violation Dispatcher
//!
//! For each matched rule: send alerts on the configured channels, persist a
//! violation record, and execute the rule's automated response. Every
//! channel and every action is isolated; one failure never prevents the
//! rest from running.

pub mod actions;
pub mod alerts;

use std::sync::Arc;

use serde_json::json;

use crate::event::{event_types, AuditEvent, EventCategory, RawAuditEvent};
use crate::rules::{AutoResponseAction, ComplianceRule};
use crate::storage::{AuditStore, Violation};

pub use actions::{
    AccountDirectory, AccountStatus, ComplianceDesk, MemoryAccountDirectory,
    MemoryComplianceDesk, FLAGGED_RISK_FLOOR,
};
pub use alerts::{
    AlertChannel, AlertPayload, ChannelSet, EmailChannel, SlackChannel, SmsChannel,
    WebhookChannel,
};

// ============================================================================
// OUTCOME
// ============================================================================

/// Counts of what one dispatch call did; feeds the pipeline metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchOutcome {
    pub alerts_sent: usize,
    pub alerts_failed: usize,
    pub responses_executed: usize,
    pub responses_failed: usize,
    pub responses_skipped: usize,
    pub violations_recorded: usize,
    pub violations_failed: usize,
}

/// Dispatch outcome plus the follow-up events the pipeline must log through
/// its system path (never back through rule evaluation).
#[derive(Debug, Default)]
pub struct DispatchResult {
    pub outcome: DispatchOutcome,
    pub followups: Vec<RawAuditEvent>,
}

// ============================================================================
// DISPATCHER
// ============================================================================

pub struct ViolationDispatcher {
    channels: ChannelSet,
    accounts: Arc<dyn AccountDirectory>,
    desk: Arc<dyn ComplianceDesk>,
}

impl ViolationDispatcher {
    pub fn new(
        channels: ChannelSet,
        accounts: Arc<dyn AccountDirectory>,
        desk: Arc<dyn ComplianceDesk>,
    ) -> Self {
        Self {
            channels,
            accounts,
            desk,
        }
    }

    pub fn register_channel(&mut self, channel: Box<dyn AlertChannel>) {
        self.channels.insert(channel);
    }

    /// Handle every matched rule for one event.
    pub fn dispatch(
        &self,
        event: &AuditEvent,
        matched: &[ComplianceRule],
        store: &dyn AuditStore,
    ) -> DispatchResult {
        let mut result = DispatchResult::default();

        for rule in matched {
            let violation = Violation::new(rule, event);

            // Violation record first: evidence survives whatever the
            // channels and actions do next.
            match store.append_violation(&violation) {
                Ok(()) => result.outcome.violations_recorded += 1,
                Err(e) => {
                    result.outcome.violations_failed += 1;
                    log::error!("Failed to persist violation for rule '{}': {}", rule.name, e);
                }
            }

            let payload = AlertPayload::for_violation(rule, event);
            for kind in &rule.alert_channels {
                match self.channels.get(*kind) {
                    Some(channel) => match channel.deliver(&payload) {
                        Ok(()) => result.outcome.alerts_sent += 1,
                        Err(e) => {
                            result.outcome.alerts_failed += 1;
                            log::error!("Alert delivery failed for rule '{}': {}", rule.name, e);
                        }
                    },
                    None => {
                        result.outcome.alerts_failed += 1;
                        log::warn!(
                            "Rule '{}' names unconfigured alert channel '{}'",
                            rule.name,
                            kind.as_str()
                        );
                    }
                }
            }

            if let Some(response) = &rule.auto_response {
                self.execute_response(response.action, rule, event, &violation, &mut result);
            }
        }

        result
    }

    fn execute_response(
        &self,
        action: AutoResponseAction,
        rule: &ComplianceRule,
        event: &AuditEvent,
        violation: &Violation,
        result: &mut DispatchResult,
    ) {
        if action.needs_user() && event.user_id.is_none() {
            result.outcome.responses_skipped += 1;
            log::warn!(
                "Auto-response {} for rule '{}' skipped: event {} has no userId",
                action.as_str(),
                rule.name,
                event.request_id
            );
            return;
        }

        let executed = match action {
            AutoResponseAction::BlockUser => {
                let user_id = event.user_id.as_deref().unwrap_or_default();
                self.accounts
                    .set_account_status(user_id, AccountStatus::Blocked)
                    .map(|()| {
                        result.followups.push(block_followup(user_id, rule, event));
                    })
            }
            AutoResponseAction::FlagAccount => {
                let user_id = event.user_id.as_deref().unwrap_or_default();
                self.accounts
                    .raise_risk_score(user_id, FLAGGED_RISK_FLOOR)
                    .map(|()| {
                        result.followups.push(flag_followup(user_id, rule, event));
                    })
            }
            AutoResponseAction::NotifyCompliance => self.desk.notify_compliance(violation),
            AutoResponseAction::CreateTicket => self.desk.create_ticket(violation),
        };

        match executed {
            Ok(()) => {
                result.outcome.responses_executed += 1;
                log::info!(
                    "Auto-response {} executed for rule '{}' (event {})",
                    action.as_str(),
                    rule.name,
                    event.request_id
                );
            }
            Err(e) => {
                result.outcome.responses_failed += 1;
                log::error!(
                    "Auto-response {} failed for rule '{}': {}",
                    action.as_str(),
                    rule.name,
                    e
                );
            }
        }
    }
}

fn block_followup(user_id: &str, rule: &ComplianceRule, event: &AuditEvent) -> RawAuditEvent {
    RawAuditEvent::new(
        event_types::AUTO_ACCOUNT_BLOCK,
        EventCategory::Security,
        &format!("Account {} blocked automatically by rule '{}'", user_id, rule.name),
    )
    .with_user_id(user_id)
    .with_severity(rule.severity)
    .with_request_data(json!({
        "action": "block_user",
        "ruleId": rule.id,
        "sourceRequestId": event.request_id,
    }))
}

fn flag_followup(user_id: &str, rule: &ComplianceRule, event: &AuditEvent) -> RawAuditEvent {
    RawAuditEvent::new(
        event_types::AUTO_ACCOUNT_FLAG,
        EventCategory::Compliance,
        &format!(
            "Risk score for account {} raised to at least {} by rule '{}'",
            user_id, FLAGGED_RISK_FLOOR, rule.name
        ),
    )
    .with_user_id(user_id)
    .with_severity(rule.severity)
    .with_request_data(json!({
        "action": "flag_account",
        "ruleId": rule.id,
        "sourceRequestId": event.request_id,
    }))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AuditError, AuditResult};
    use crate::event::{enrich, Severity};
    use crate::rules::AlertChannelKind;
    use crate::storage::MemoryStore;

    struct RecordingChannel {
        kind: AlertChannelKind,
        delivered: parking_lot::Mutex<usize>,
        fail: bool,
    }

    impl RecordingChannel {
        fn new(kind: AlertChannelKind, fail: bool) -> Self {
            Self {
                kind,
                delivered: parking_lot::Mutex::new(0),
                fail,
            }
        }
    }

    impl AlertChannel for RecordingChannel {
        fn kind(&self) -> AlertChannelKind {
            self.kind
        }

        fn deliver(&self, _alert: &AlertPayload) -> AuditResult<()> {
            if self.fail {
                return Err(AuditError::ChannelDelivery {
                    channel: self.kind.as_str().to_string(),
                    message: "gateway down".to_string(),
                });
            }
            *self.delivered.lock() += 1;
            Ok(())
        }
    }

    fn dispatcher_with(
        channels: Vec<Box<dyn AlertChannel>>,
        accounts: Arc<MemoryAccountDirectory>,
        desk: Arc<MemoryComplianceDesk>,
    ) -> ViolationDispatcher {
        let mut set = ChannelSet::default();
        for c in channels {
            set.insert(c);
        }
        ViolationDispatcher::new(set, accounts, desk)
    }

    fn event_with_user() -> AuditEvent {
        enrich(
            RawAuditEvent::new("TRANSFER", EventCategory::FinancialTransaction, "wire")
                .with_user_id("u1"),
        )
        .unwrap()
    }

    #[test]
    fn test_channel_failure_does_not_abort_other_channels() {
        let accounts = Arc::new(MemoryAccountDirectory::new());
        let desk = Arc::new(MemoryComplianceDesk::new());
        let dispatcher = dispatcher_with(
            vec![
                Box::new(RecordingChannel::new(AlertChannelKind::Slack, true)),
                Box::new(RecordingChannel::new(AlertChannelKind::Webhook, false)),
            ],
            accounts,
            desk,
        );

        let rule = ComplianceRule::new("r", "watch", &["TRANSFER"])
            .with_channels(&[AlertChannelKind::Slack, AlertChannelKind::Webhook]);
        let store = MemoryStore::new();
        let result = dispatcher.dispatch(&event_with_user(), &[rule], &store);

        assert_eq!(result.outcome.alerts_failed, 1);
        assert_eq!(result.outcome.alerts_sent, 1);
        assert_eq!(result.outcome.violations_recorded, 1);
    }

    #[test]
    fn test_unconfigured_channel_counts_as_failure() {
        let dispatcher = dispatcher_with(
            vec![],
            Arc::new(MemoryAccountDirectory::new()),
            Arc::new(MemoryComplianceDesk::new()),
        );
        let rule =
            ComplianceRule::new("r", "watch", &["TRANSFER"]).with_channels(&[AlertChannelKind::Sms]);
        let result = dispatcher.dispatch(&event_with_user(), &[rule], &MemoryStore::new());
        assert_eq!(result.outcome.alerts_failed, 1);
        assert_eq!(result.outcome.alerts_sent, 0);
    }

    #[test]
    fn test_block_user_blocks_and_emits_followup() {
        let accounts = Arc::new(MemoryAccountDirectory::new());
        let dispatcher = dispatcher_with(
            vec![],
            accounts.clone(),
            Arc::new(MemoryComplianceDesk::new()),
        );
        let rule = ComplianceRule::new("r", "hard stop", &["TRANSFER"])
            .with_severity(Severity::Critical)
            .with_auto_response(AutoResponseAction::BlockUser);

        let result = dispatcher.dispatch(&event_with_user(), &[rule], &MemoryStore::new());

        assert_eq!(accounts.status_of("u1"), Some(AccountStatus::Blocked));
        assert_eq!(result.outcome.responses_executed, 1);
        assert_eq!(result.followups.len(), 1);
        let followup = &result.followups[0];
        assert_eq!(followup.event_type.as_deref(), Some(event_types::AUTO_ACCOUNT_BLOCK));
        assert_eq!(followup.event_category, Some(EventCategory::Security));
    }

    #[test]
    fn test_flag_account_raises_risk_floor() {
        let accounts = Arc::new(MemoryAccountDirectory::new());
        let dispatcher = dispatcher_with(
            vec![],
            accounts.clone(),
            Arc::new(MemoryComplianceDesk::new()),
        );
        let rule = ComplianceRule::new("r", "flag it", &["TRANSFER"])
            .with_auto_response(AutoResponseAction::FlagAccount);

        let result = dispatcher.dispatch(&event_with_user(), &[rule], &MemoryStore::new());

        assert!(accounts.risk_score_of("u1").unwrap() >= FLAGGED_RISK_FLOOR);
        assert_eq!(result.followups.len(), 1);
        assert_eq!(
            result.followups[0].event_category,
            Some(EventCategory::Compliance)
        );
    }

    #[test]
    fn test_user_actions_skipped_without_user_id() {
        let accounts = Arc::new(MemoryAccountDirectory::new());
        let dispatcher = dispatcher_with(
            vec![],
            accounts.clone(),
            Arc::new(MemoryComplianceDesk::new()),
        );
        let rule = ComplianceRule::new("r", "hard stop", &["PING"])
            .with_auto_response(AutoResponseAction::BlockUser);
        let event = enrich(RawAuditEvent::new("PING", EventCategory::Security, "anon")).unwrap();

        let result = dispatcher.dispatch(&event, &[rule], &MemoryStore::new());

        assert_eq!(result.outcome.responses_skipped, 1);
        assert_eq!(result.outcome.responses_executed, 0);
        assert!(result.followups.is_empty());
    }

    #[test]
    fn test_desk_actions_forwarded() {
        let desk = Arc::new(MemoryComplianceDesk::new());
        let dispatcher = dispatcher_with(
            vec![],
            Arc::new(MemoryAccountDirectory::new()),
            desk.clone(),
        );
        let rules = vec![
            ComplianceRule::new("r-1", "notify", &["TRANSFER"])
                .with_auto_response(AutoResponseAction::NotifyCompliance),
            ComplianceRule::new("r-2", "ticket", &["TRANSFER"])
                .with_auto_response(AutoResponseAction::CreateTicket),
        ];

        let result = dispatcher.dispatch(&event_with_user(), &rules, &MemoryStore::new());

        assert_eq!(desk.notification_count(), 1);
        assert_eq!(desk.ticket_count(), 1);
        assert_eq!(result.outcome.responses_executed, 2);
        assert_eq!(result.outcome.violations_recorded, 2);
    }

    #[test]
    fn test_one_violation_record_per_match() {
        let dispatcher = dispatcher_with(
            vec![],
            Arc::new(MemoryAccountDirectory::new()),
            Arc::new(MemoryComplianceDesk::new()),
        );
        let store = MemoryStore::new();
        let rules = vec![
            ComplianceRule::new("r-1", "first", &["TRANSFER"]),
            ComplianceRule::new("r-2", "second", &["TRANSFER"]),
        ];
        dispatcher.dispatch(&event_with_user(), &rules, &store);

        let violations = store.recent_violations(10).unwrap();
        assert_eq!(violations.len(), 2);
    }
}
