//! Trigger rules: priority-ordered predicates that attach templates to
//! newly created entities

use crate::workflow::TemplateId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ulid::Ulid;

/// Unique identifier for trigger rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleId(Ulid);

impl RuleId {
    /// Create a new random rule ID
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Parse a RuleId from a string representation
    pub fn parse(s: &str) -> Result<Self, String> {
        Ulid::from_string(s)
            .map(Self)
            .map_err(|e| format!("Invalid rule ID '{}': {}", s, e))
    }
}

impl Default for RuleId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Attribute map describing the newly created entity
pub type EntityAttributes = Map<String, Value>;

/// Minimal predicate over entity attributes
///
/// Deliberately a closed enum rather than an expression language:
/// extending the grammar means adding a variant here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleCondition {
    /// Matches every entity
    Always,
    /// Numeric attribute is greater than or equal to the threshold
    NumberAtLeast {
        /// Attribute to read from the entity
        attribute: String,
        /// Inclusive lower bound
        threshold: f64,
    },
    /// Numeric attribute is strictly below the threshold
    NumberBelow {
        /// Attribute to read from the entity
        attribute: String,
        /// Exclusive upper bound
        threshold: f64,
    },
    /// String attribute equals the given value exactly
    StringEquals {
        /// Attribute to read from the entity
        attribute: String,
        /// Expected value
        value: String,
    },
}

impl RuleCondition {
    /// Evaluate the condition against an attribute map
    ///
    /// Pure and deterministic; a missing or wrongly-typed attribute
    /// simply fails to match rather than erroring.
    pub fn evaluate(&self, attributes: &EntityAttributes) -> bool {
        match self {
            RuleCondition::Always => true,
            RuleCondition::NumberAtLeast {
                attribute,
                threshold,
            } => attributes
                .get(attribute)
                .and_then(Value::as_f64)
                .map(|v| v >= *threshold)
                .unwrap_or(false),
            RuleCondition::NumberBelow {
                attribute,
                threshold,
            } => attributes
                .get(attribute)
                .and_then(Value::as_f64)
                .map(|v| v < *threshold)
                .unwrap_or(false),
            RuleCondition::StringEquals { attribute, value } => attributes
                .get(attribute)
                .and_then(Value::as_str)
                .map(|v| v == value)
                .unwrap_or(false),
        }
    }
}

/// A priority-ordered predicate that selects which template attaches to
/// a newly created entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerRule {
    /// Unique identifier
    pub id: RuleId,
    /// Module tag this rule applies to
    pub module: String,
    /// Predicate over the entity's attributes
    pub condition: RuleCondition,
    /// Template to attach when the condition matches
    pub template_id: TemplateId,
    /// Evaluation priority; lower values are evaluated first
    pub priority: i32,
    /// Inactive rules are skipped during matching
    pub is_active: bool,
}

impl TriggerRule {
    /// Create a new active rule
    pub fn new(
        module: impl Into<String>,
        condition: RuleCondition,
        template_id: TemplateId,
        priority: i32,
    ) -> Self {
        Self {
            id: RuleId::new(),
            module: module.into(),
            condition,
            template_id,
            priority,
            is_active: true,
        }
    }
}

/// Select the template to attach to a new entity, if any
///
/// Active rules for the entity's module are evaluated in ascending
/// priority order; the first whose condition matches wins. `None` means
/// the entity proceeds without a workflow.
pub fn resolve_template(
    rules: &[TriggerRule],
    module: &str,
    attributes: &EntityAttributes,
) -> Option<TemplateId> {
    matching_rules(rules, module, attributes)
        .into_iter()
        .next()
        .map(|r| r.template_id)
}

/// All rules whose condition matches the entity, in ascending priority
/// order
///
/// Callers that need to skip a matched rule (for example when its
/// template has since been deactivated) can fall through to the next
/// one.
pub fn matching_rules<'a>(
    rules: &'a [TriggerRule],
    module: &str,
    attributes: &EntityAttributes,
) -> Vec<&'a TriggerRule> {
    let mut candidates: Vec<&TriggerRule> = rules
        .iter()
        .filter(|r| r.is_active && r.module == module && r.condition.evaluate(attributes))
        .collect();
    candidates.sort_by_key(|r| r.priority);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(pairs: &[(&str, Value)]) -> EntityAttributes {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_always_condition_matches() {
        assert!(RuleCondition::Always.evaluate(&EntityAttributes::new()));
    }

    #[test]
    fn test_number_at_least() {
        let condition = RuleCondition::NumberAtLeast {
            attribute: "amount".to_string(),
            threshold: 100_000.0,
        };

        assert!(condition.evaluate(&attrs(&[("amount", json!(100_000))])));
        assert!(condition.evaluate(&attrs(&[("amount", json!(250_000.5))])));
        assert!(!condition.evaluate(&attrs(&[("amount", json!(99_999))])));
        assert!(!condition.evaluate(&attrs(&[("amount", json!("lots"))])));
        assert!(!condition.evaluate(&EntityAttributes::new()));
    }

    #[test]
    fn test_string_equals() {
        let condition = RuleCondition::StringEquals {
            attribute: "category".to_string(),
            value: "civil".to_string(),
        };

        assert!(condition.evaluate(&attrs(&[("category", json!("civil"))])));
        assert!(!condition.evaluate(&attrs(&[("category", json!("electrical"))])));
    }

    #[test]
    fn test_resolution_respects_priority_order() {
        let high_value = TemplateId::new();
        let standard = TemplateId::new();

        let rules = vec![
            TriggerRule::new("RA_BILL", RuleCondition::Always, standard, 20),
            TriggerRule::new(
                "RA_BILL",
                RuleCondition::NumberAtLeast {
                    attribute: "amount".to_string(),
                    threshold: 500_000.0,
                },
                high_value,
                10,
            ),
        ];

        // Big bill hits the priority-10 rule first.
        let matched = resolve_template(&rules, "RA_BILL", &attrs(&[("amount", json!(750_000))]));
        assert_eq!(matched, Some(high_value));

        // Small bill falls through to the catch-all.
        let matched = resolve_template(&rules, "RA_BILL", &attrs(&[("amount", json!(10_000))]));
        assert_eq!(matched, Some(standard));
    }

    #[test]
    fn test_resolution_skips_inactive_and_other_modules() {
        let template = TemplateId::new();
        let mut rule = TriggerRule::new("TENDER", RuleCondition::Always, template, 1);
        rule.is_active = false;

        let rules = vec![rule];
        assert_eq!(
            resolve_template(&rules, "TENDER", &EntityAttributes::new()),
            None
        );
        assert_eq!(
            resolve_template(&rules, "RA_BILL", &EntityAttributes::new()),
            None
        );
    }

    #[test]
    fn test_resolution_is_repeatable() {
        let template = TemplateId::new();
        let rules = vec![TriggerRule::new("RISK", RuleCondition::Always, template, 1)];
        let attributes = EntityAttributes::new();

        let first = resolve_template(&rules, "RISK", &attributes);
        let second = resolve_template(&rules, "RISK", &attributes);
        assert_eq!(first, second);
    }
}
