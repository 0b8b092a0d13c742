//! Rule Engine
//!
//! Evaluates enriched events against the loaded rule registry. Matching is
//! deterministic and side-effect free so violation handling can be retried
//! without re-deriving different matches.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use regex::Regex;
use serde_json::Value;

use crate::error::AuditResult;
use crate::event::AuditEvent;
use super::store::RuleStore;
use super::types::{ComplianceRule, ConditionOperator, RuleCondition};

/// Active-rule registry plus evaluation.
///
/// The registry is an `Arc` snapshot replaced wholesale on reload; readers
/// never observe a partially updated rule set.
pub struct RuleEngine {
    store: Arc<dyn RuleStore>,
    active: RwLock<Arc<Vec<ComplianceRule>>>,
    regex_cache: RwLock<HashMap<String, Regex>>,
}

impl RuleEngine {
    /// New engine with an empty registry; call `reload` to populate it.
    pub fn new(store: Arc<dyn RuleStore>) -> Self {
        Self {
            store,
            active: RwLock::new(Arc::new(Vec::new())),
            regex_cache: RwLock::new(HashMap::new()),
        }
    }

    /// Replace the registry with a fresh snapshot from the store.
    ///
    /// On error the cached set stays in effect; the caller decides how to
    /// report the failure.
    pub fn reload(&self) -> AuditResult<usize> {
        let rules = self.store.load_active()?;
        let count = rules.len();
        *self.active.write() = Arc::new(rules);
        Ok(count)
    }

    pub fn active_count(&self) -> usize {
        self.active.read().len()
    }

    pub fn active_rules(&self) -> Arc<Vec<ComplianceRule>> {
        self.active.read().clone()
    }

    /// All active rules matching the event. Order follows the registry.
    pub fn evaluate(&self, event: &AuditEvent) -> Vec<ComplianceRule> {
        let snapshot = self.active.read().clone();
        if snapshot.is_empty() {
            return Vec::new();
        }

        // Conditions resolve against the event's wire form.
        let doc = serde_json::to_value(event).unwrap_or(Value::Null);

        snapshot
            .iter()
            .filter(|rule| {
                rule.is_active
                    && rule.event_types.iter().any(|t| t == &event.event_type)
                    && rule.conditions.iter().all(|c| self.condition_holds(c, &doc))
            })
            .cloned()
            .collect()
    }

    fn condition_holds(&self, condition: &RuleCondition, doc: &Value) -> bool {
        let resolved = match lookup_path(doc, &condition.field) {
            Some(value) => value,
            // Missing path resolves to absent, never an error.
            None => return false,
        };

        match condition.operator {
            ConditionOperator::Equals => loose_eq(resolved, &condition.value),
            ConditionOperator::Contains => {
                stringify(resolved).contains(&stringify(&condition.value))
            }
            ConditionOperator::GreaterThan => match (as_f64(resolved), as_f64(&condition.value)) {
                (Some(actual), Some(limit)) => actual > limit,
                _ => false,
            },
            ConditionOperator::LessThan => match (as_f64(resolved), as_f64(&condition.value)) {
                (Some(actual), Some(limit)) => actual < limit,
                _ => false,
            },
            ConditionOperator::Regex => match self.regex_for(&stringify(&condition.value)) {
                Some(re) => re.is_match(&stringify(resolved)),
                None => false,
            },
        }
    }

    fn regex_for(&self, pattern: &str) -> Option<Regex> {
        if let Some(re) = self.regex_cache.read().get(pattern) {
            return Some(re.clone());
        }
        match Regex::new(pattern) {
            Ok(re) => {
                self.regex_cache
                    .write()
                    .insert(pattern.to_string(), re.clone());
                Some(re)
            }
            Err(e) => {
                log::warn!("Invalid regex in rule condition '{}': {}", pattern, e);
                None
            }
        }
    }
}

/// Dotted-path lookup, e.g. `requestData.amount`.
fn lookup_path<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |acc, segment| acc.get(segment))
}

/// Equality with numeric coercion and case-insensitive string comparison,
/// so `"CRITICAL"` in a rule matches the stored `"critical"`.
fn loose_eq(actual: &Value, expected: &Value) -> bool {
    if let (Some(a), Some(b)) = (as_f64(actual), as_f64(expected)) {
        return (a - b).abs() < f64::EPSILON;
    }
    stringify(actual).eq_ignore_ascii_case(&stringify(expected))
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ============================================================================
// TESTS
// ============================================================================
