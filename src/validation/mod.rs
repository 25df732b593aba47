//! Request validation.
//!
//! # Data Flow
//! ```text
//! Route declaration (ValidatorConfig: rules + messages)
//!     → compile() at route compile time (RuleSet, immutable)
//!     → validate stage: RuleSet::check(params | query | body)
//!     → FieldErrors {field: [message, ...]}
//! ```
//!
//! # Design Decisions
//! - Rule strings follow the validatorjs vocabulary (`required|min:3`)
//! - Rules are parsed once; a bad rule fails route compilation
//! - Checking is a pure function of (rules, value)
//! - All fields are checked; failures are collected, never short-circuited

pub mod rules;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::pipeline::HttpError;
pub use rules::{Rule, RuleError};

/// Per-field failure messages.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// A rule expression: either `"required|min:3"` or `["required", "min:3"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleExpr {
    Pipe(String),
    List(Vec<String>),
}

impl RuleExpr {
    fn tokens(&self) -> Vec<&str> {
        match self {
            RuleExpr::Pipe(s) => s.split('|').map(str::trim).filter(|t| !t.is_empty()).collect(),
            RuleExpr::List(items) => items.iter().map(|t| t.trim()).filter(|t| !t.is_empty()).collect(),
        }
    }
}

impl From<&str> for RuleExpr {
    fn from(s: &str) -> Self {
        RuleExpr::Pipe(s.to_string())
    }
}

/// Rules and optional message templates for one request part.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    pub rules: BTreeMap<String, RuleExpr>,
    /// Templates keyed by rule name (`min`) or `rule.field` (`min.name`).
    pub messages: BTreeMap<String, String>,
}

impl ValidatorConfig {
    /// Start an empty config; add fields with [`ValidatorConfig::rule`].
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule(mut self, field: impl Into<String>, expr: impl Into<RuleExpr>) -> Self {
        self.rules.insert(field.into(), expr.into());
        self
    }

    pub fn message(mut self, key: impl Into<String>, template: impl Into<String>) -> Self {
        self.messages.insert(key.into(), template.into());
        self
    }

    fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Parse every rule expression.
    pub fn compile(&self) -> Result<RuleSet, RuleError> {
        let mut fields = Vec::with_capacity(self.rules.len());
        for (field, expr) in &self.rules {
            let mut parsed = Vec::new();
            for token in expr.tokens() {
                parsed.push(Rule::parse(field, token)?);
            }
            fields.push((field.clone(), parsed));
        }
        Ok(RuleSet {
            fields,
            messages: self.messages.clone(),
        })
    }
}

/// Validators for the three request parts a route can constrain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Validators {
    pub params: Option<ValidatorConfig>,
    pub query: Option<ValidatorConfig>,
    pub body: Option<ValidatorConfig>,
}

impl Validators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn params(mut self, config: ValidatorConfig) -> Self {
        self.params = Some(config);
        self
    }

    pub fn query(mut self, config: ValidatorConfig) -> Self {
        self.query = Some(config);
        self
    }

    pub fn body(mut self, config: ValidatorConfig) -> Self {
        self.body = Some(config);
        self
    }

    /// Compile the non-empty parts. Empty configs are treated as absent.
    pub fn compile(&self) -> Result<CompiledValidators, RuleError> {
        let compile_part = |part: &Option<ValidatorConfig>| -> Result<Option<RuleSet>, RuleError> {
            match part {
                Some(config) if !config.is_empty() => config.compile().map(Some),
                _ => Ok(None),
            }
        };
        Ok(CompiledValidators {
            params: compile_part(&self.params)?,
            query: compile_part(&self.query)?,
            body: compile_part(&self.body)?,
            source: self.clone(),
        })
    }
}

/// Parsed validators attached to a route record.
#[derive(Debug, Clone)]
pub struct CompiledValidators {
    pub params: Option<RuleSet>,
    pub query: Option<RuleSet>,
    pub body: Option<RuleSet>,
    source: Validators,
}

impl CompiledValidators {
    /// The declaration this was compiled from.
    pub fn source(&self) -> &Validators {
        &self.source
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_none() && self.query.is_none() && self.body.is_none()
    }
}

/// A compiled rule set for one request part.
#[derive(Debug, Clone)]
pub struct RuleSet {
    fields: Vec<(String, Vec<Rule>)>,
    messages: BTreeMap<String, String>,
}

impl RuleSet {
    /// Check `data` against every field; returns all failures.
    pub fn check(&self, data: &Value) -> FieldErrors {
        let mut errors = FieldErrors::new();
        for (field, field_rules) in &self.fields {
            let value = lookup(data, field);
            let numeric = field_rules.iter().any(Rule::is_numeric_type);
            let present = rules::is_present(value);
            for rule in field_rules {
                if !present && !rule.is_implicit() {
                    continue;
                }
                if !rule.passes(value, numeric) {
                    let message = rule.message(field, value, numeric, &self.messages);
                    errors.entry(field.clone()).or_default().push(message);
                }
            }
        }
        errors
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(f, _)| f.as_str())
    }
}

/// Validate a standalone value, failing with the first message as a 400.
pub fn validate_model(data: &Value, rules: &RuleSet) -> Result<(), HttpError> {
    let errors = rules.check(data);
    match errors.values().flatten().next() {
        Some(first) => Err(HttpError::new(400, first.clone())),
        None => Ok(()),
    }
}

/// Resolve a dotted field name against an object.
fn lookup<'a>(data: &'a Value, field: &str) -> Option<&'a Value> {
    if let Some(v) = data.get(field) {
        return Some(v);
    }
    let mut current = data;
    for part in field.split('.') {
        current = match current {
            Value::Object(map) => map.get(part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rules(pairs: &[(&str, &str)]) -> RuleSet {
        let mut config = ValidatorConfig::new();
        for (field, expr) in pairs {
            config = config.rule(*field, *expr);
        }
        config.compile().unwrap()
    }

    #[test]
    fn collects_every_failing_field() {
        let set = rules(&[("name", "required|string"), ("age", "required|integer|min:18")]);
        let errors = set.check(&json!({ "age": "12" }));

        assert_eq!(errors["name"], vec!["The name field is required."]);
        assert_eq!(errors["age"], vec!["The age must be at least 18."]);
    }

    #[test]
    fn optional_fields_skip_when_absent() {
        let set = rules(&[("nickname", "string|min:3")]);
        assert!(set.check(&json!({})).is_empty());
        assert!(set.check(&json!({ "nickname": "" })).is_empty());
        assert_eq!(set.check(&json!({ "nickname": "ab" })).len(), 1);
    }

    #[test]
    fn custom_messages_take_precedence() {
        let set = ValidatorConfig::new()
            .rule("user_name", "required")
            .rule("email", "required|email")
            .message("required", ":attribute is mandatory")
            .message("email.email", "bad address")
            .compile()
            .unwrap();

        let errors = set.check(&json!({ "email": "nope" }));
        assert_eq!(errors["user_name"], vec!["user name is mandatory"]);
        assert_eq!(errors["email"], vec!["bad address"]);
    }

    #[test]
    fn dotted_fields_reach_nested_values() {
        let set = rules(&[("user.id", "required|numeric")]);
        assert!(set.check(&json!({ "user": { "id": 7 } })).is_empty());
        assert!(!set.check(&json!({ "user": {} })).is_empty());
    }

    #[test]
    fn list_expressions_are_accepted() {
        let config: ValidatorConfig = serde_json::from_value(json!({
            "rules": { "tags": ["required", "array", "min:2"] }
        }))
        .unwrap();
        let set = config.compile().unwrap();
        assert!(set.check(&json!({ "tags": ["a", "b"] })).is_empty());
        assert_eq!(
            set.check(&json!({ "tags": ["a"] }))["tags"],
            vec!["The tags must be at least 2."]
        );
    }

    #[test]
    fn checking_is_repeatable() {
        let set = rules(&[("id", "required|integer")]);
        let input = json!({ "id": "abc" });
        assert_eq!(set.check(&input), set.check(&input));
    }

    #[test]
    fn validate_model_reports_first_failure() {
        let set = rules(&[("a", "required"), ("b", "required")]);
        let err = validate_model(&json!({}), &set).unwrap_err();
        assert_eq!(err.status, 400);
        assert_eq!(err.message, "The a field is required.");
    }

    #[test]
    fn unknown_rule_fails_compilation() {
        let err = ValidatorConfig::new().rule("a", "required|shiny").compile().unwrap_err();
        assert!(matches!(err, RuleError::Unknown { .. }));
    }
}
