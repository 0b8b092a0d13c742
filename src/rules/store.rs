//! Rule storage boundary.
//!
//! The pipeline treats a rule store response as a full-replacement snapshot,
//! never a delta. Load failures keep the previously cached set in effect.

use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use crate::error::{AuditError, AuditResult};
use super::types::ComplianceRule;

/// "List active rules" at any time.
pub trait RuleStore: Send + Sync {
    fn load_active(&self) -> AuditResult<Vec<ComplianceRule>>;
}

// ============================================================================
// JSON FILE STORE
// ============================================================================

/// Rule set kept as a JSON array on disk, re-read on every reload.
pub struct JsonFileRuleStore {
    path: PathBuf,
}

impl JsonFileRuleStore {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RuleStore for JsonFileRuleStore {
    fn load_active(&self) -> AuditResult<Vec<ComplianceRule>> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            AuditError::RuleLoad(format!("cannot read {}: {}", self.path.display(), e))
        })?;

        let rules: Vec<ComplianceRule> = serde_json::from_str(&content).map_err(|e| {
            AuditError::RuleLoad(format!("cannot parse {}: {}", self.path.display(), e))
        })?;

        log::info!("Loaded {} compliance rules from {}", rules.len(), self.path.display());
        Ok(rules.into_iter().filter(|r| r.is_active).collect())
    }
}

// ============================================================================
// MEMORY STORE
// ============================================================================

/// In-memory rule store for tests and embedded configuration.
#[derive(Default)]
pub struct MemoryRuleStore {
    rules: RwLock<Vec<ComplianceRule>>,
    fail_loads: RwLock<bool>,
}

impl MemoryRuleStore {
    pub fn new(rules: Vec<ComplianceRule>) -> Self {
        Self {
            rules: RwLock::new(rules),
            fail_loads: RwLock::new(false),
        }
    }

    pub fn set_rules(&self, rules: Vec<ComplianceRule>) {
        *self.rules.write() = rules;
    }

    /// Make subsequent loads fail, to exercise the keep-last-known-good path.
    pub fn set_unavailable(&self, unavailable: bool) {
        *self.fail_loads.write() = unavailable;
    }
}

impl RuleStore for MemoryRuleStore {
    fn load_active(&self) -> AuditResult<Vec<ComplianceRule>> {
        if *self.fail_loads.read() {
            return Err(AuditError::RuleLoad("rule store unavailable".to_string()));
        }
        Ok(self
            .rules
            .read()
            .iter()
            .filter(|r| r.is_active)
            .cloned()
            .collect())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::types::ComplianceRule;
    use tempfile::TempDir;

    #[test]
    fn test_json_file_store_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rules.json");
        let rules = vec![
            ComplianceRule::new("r-1", "First", &["A"]),
            ComplianceRule {
                is_active: false,
                ..ComplianceRule::new("r-2", "Disabled", &["B"])
            },
        ];
        std::fs::write(&path, serde_json::to_string_pretty(&rules).unwrap()).unwrap();

        let store = JsonFileRuleStore::new(&path);
        let loaded = store.load_active().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, "r-1");
    }

    #[test]
    fn test_json_file_store_missing_file_is_rule_load_error() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileRuleStore::new(&dir.path().join("absent.json"));
        assert!(matches!(store.load_active(), Err(AuditError::RuleLoad(_))));
    }

    #[test]
    fn test_json_file_store_bad_json_is_rule_load_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rules.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = JsonFileRuleStore::new(&path);
        assert!(matches!(store.load_active(), Err(AuditError::RuleLoad(_))));
    }

    #[test]
    fn test_memory_store_unavailable() {
        let store = MemoryRuleStore::new(vec![ComplianceRule::new("r", "n", &["X"])]);
        assert_eq!(store.load_active().unwrap().len(), 1);
        store.set_unavailable(true);
        assert!(store.load_active().is_err());
    }
}
