//! Compliance rules: model, storage boundary and evaluation engine.

pub mod engine;
pub mod store;
pub mod types;

pub use engine::RuleEngine;
pub use store::{JsonFileRuleStore, MemoryRuleStore, RuleStore};
pub use types::{
    AlertChannelKind, AutoResponse, AutoResponseAction, ComplianceRule, ConditionOperator,
    RuleCondition,
};
