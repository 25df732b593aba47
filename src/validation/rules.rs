//! Individual validation rules.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap()
});

static URL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://[^\s/$.?#].[^\s]*$").unwrap()
});

static INTEGER_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?\d+$").unwrap());

/// Errors raised while parsing a rule expression.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("unknown rule `{rule}` on field `{field}`")]
    Unknown { field: String, rule: String },

    #[error("rule `{rule}` on field `{field}`: {reason}")]
    Invalid {
        field: String,
        rule: String,
        reason: String,
    },
}

impl RuleError {
    pub fn field(&self) -> &str {
        match self {
            RuleError::Unknown { field, .. } | RuleError::Invalid { field, .. } => field,
        }
    }

    pub fn rule(&self) -> &str {
        match self {
            RuleError::Unknown { rule, .. } | RuleError::Invalid { rule, .. } => rule,
        }
    }
}

/// A single parsed rule.
#[derive(Debug, Clone)]
pub enum Rule {
    Required,
    Accepted,
    String,
    Integer,
    Numeric,
    Boolean,
    Array,
    Email,
    Url,
    Alpha,
    AlphaNum,
    AlphaDash,
    Min(f64),
    Max(f64),
    Between(f64, f64),
    Size(f64),
    Digits(usize),
    In(Vec<String>),
    NotIn(Vec<String>),
    Regex(Regex),
}

/// How a sized rule measures its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Measure {
    Numeric,
    Items,
    Characters,
}

impl Rule {
    /// Parse one token such as `min:3` for `field`.
    pub fn parse(field: &str, token: &str) -> Result<Self, RuleError> {
        let (name, arg) = match token.split_once(':') {
            Some((n, a)) => (n.trim(), Some(a)),
            None => (token.trim(), None),
        };
        let invalid = |reason: &str| RuleError::Invalid {
            field: field.to_string(),
            rule: token.to_string(),
            reason: reason.to_string(),
        };
        let number = |raw: Option<&str>| -> Result<f64, RuleError> {
            raw.and_then(|a| a.trim().parse::<f64>().ok())
                .ok_or_else(|| invalid("expected a numeric argument"))
        };
        let list = |raw: Option<&str>| -> Result<Vec<String>, RuleError> {
            raw.map(|a| a.split(',').map(|v| v.trim().to_string()).collect())
                .ok_or_else(|| invalid("expected a comma separated list"))
        };

        let rule = match name {
            "required" => Rule::Required,
            "accepted" => Rule::Accepted,
            "string" => Rule::String,
            "integer" => Rule::Integer,
            "numeric" => Rule::Numeric,
            "boolean" => Rule::Boolean,
            "array" => Rule::Array,
            "email" => Rule::Email,
            "url" => Rule::Url,
            "alpha" => Rule::Alpha,
            "alpha_num" => Rule::AlphaNum,
            "alpha_dash" => Rule::AlphaDash,
            "min" => Rule::Min(number(arg)?),
            "max" => Rule::Max(number(arg)?),
            "size" => Rule::Size(number(arg)?),
            "between" => {
                let bounds = list(arg)?;
                match bounds.as_slice() {
                    [lo, hi] => {
                        let lo = number(Some(lo))?;
                        let hi = number(Some(hi))?;
                        Rule::Between(lo, hi)
                    }
                    _ => return Err(invalid("expected two bounds")),
                }
            }
            "digits" => Rule::Digits(
                arg.and_then(|a| a.trim().parse::<usize>().ok())
                    .ok_or_else(|| invalid("expected a digit count"))?,
            ),
            "in" => Rule::In(list(arg)?),
            "not_in" => Rule::NotIn(list(arg)?),
            "regex" => {
                let raw = arg.ok_or_else(|| invalid("expected a pattern"))?;
                Rule::Regex(compile_pattern(raw).map_err(|e| invalid(&e.to_string()))?)
            }
            _ => {
                return Err(RuleError::Unknown {
                    field: field.to_string(),
                    rule: name.to_string(),
                })
            }
        };
        Ok(rule)
    }

    /// The rule name used for message lookup.
    pub fn name(&self) -> &'static str {
        match self {
            Rule::Required => "required",
            Rule::Accepted => "accepted",
            Rule::String => "string",
            Rule::Integer => "integer",
            Rule::Numeric => "numeric",
            Rule::Boolean => "boolean",
            Rule::Array => "array",
            Rule::Email => "email",
            Rule::Url => "url",
            Rule::Alpha => "alpha",
            Rule::AlphaNum => "alpha_num",
            Rule::AlphaDash => "alpha_dash",
            Rule::Min(_) => "min",
            Rule::Max(_) => "max",
            Rule::Between(..) => "between",
            Rule::Size(_) => "size",
            Rule::Digits(_) => "digits",
            Rule::In(_) => "in",
            Rule::NotIn(_) => "not_in",
            Rule::Regex(_) => "regex",
        }
    }

    /// Implicit rules run even when the value is absent.
    pub fn is_implicit(&self) -> bool {
        matches!(self, Rule::Required | Rule::Accepted)
    }

    /// Rules that make sized rules compare numerically.
    pub fn is_numeric_type(&self) -> bool {
        matches!(self, Rule::Integer | Rule::Numeric)
    }

    pub fn passes(&self, value: Option<&Value>, numeric: bool) -> bool {
        match self {
            Rule::Required => is_present(value),
            Rule::Accepted => matches!(
                scalar(value).as_deref(),
                Some("yes" | "on" | "1" | "true")
            ),
            Rule::String => matches!(value, Some(Value::String(_))),
            Rule::Integer => match value {
                Some(Value::Number(n)) => n.is_i64() || n.is_u64(),
                Some(Value::String(s)) => INTEGER_REGEX.is_match(s),
                _ => false,
            },
            Rule::Numeric => as_number(value).is_some(),
            Rule::Boolean => match value {
                Some(Value::Bool(_)) => true,
                _ => matches!(scalar(value).as_deref(), Some("true" | "false" | "0" | "1")),
            },
            Rule::Array => matches!(value, Some(Value::Array(_))),
            Rule::Email => text(value).is_some_and(|s| EMAIL_REGEX.is_match(s)),
            Rule::Url => text(value).is_some_and(|s| URL_REGEX.is_match(s)),
            Rule::Alpha => text(value)
                .is_some_and(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphabetic())),
            Rule::AlphaNum => scalar(value)
                .is_some_and(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric())),
            Rule::AlphaDash => scalar(value).is_some_and(|s| {
                !s.is_empty()
                    && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            }),
            Rule::Min(min) => size_of(value, numeric).is_some_and(|(n, _)| n >= *min),
            Rule::Max(max) => size_of(value, numeric).is_some_and(|(n, _)| n <= *max),
            Rule::Between(lo, hi) => {
                size_of(value, numeric).is_some_and(|(n, _)| n >= *lo && n <= *hi)
            }
            Rule::Size(size) => size_of(value, numeric).is_some_and(|(n, _)| n == *size),
            Rule::Digits(count) => scalar(value).is_some_and(|s| {
                s.len() == *count && s.chars().all(|c| c.is_ascii_digit())
            }),
            Rule::In(allowed) => scalar(value).is_some_and(|s| allowed.iter().any(|a| *a == s)),
            Rule::NotIn(denied) => scalar(value).is_some_and(|s| !denied.iter().any(|d| *d == s)),
            Rule::Regex(re) => scalar(value).is_some_and(|s| re.is_match(&s)),
        }
    }

    /// Render the failure message for `field`.
    pub fn message(
        &self,
        field: &str,
        value: Option<&Value>,
        numeric: bool,
        custom: &BTreeMap<String, String>,
    ) -> String {
        let measure = size_of(value, numeric).map(|(_, m)| m).unwrap_or(Measure::Characters);
        let template = custom
            .get(&format!("{}.{}", self.name(), field))
            .or_else(|| custom.get(self.name()))
            .cloned()
            .unwrap_or_else(|| self.default_template(measure).to_string());

        let mut message = template.replace(":attribute", &attribute_name(field));
        match self {
            Rule::Min(n) => message = message.replace(":min", &fmt_number(*n)),
            Rule::Max(n) => message = message.replace(":max", &fmt_number(*n)),
            Rule::Size(n) => message = message.replace(":size", &fmt_number(*n)),
            Rule::Between(lo, hi) => {
                message = message
                    .replace(":min", &fmt_number(*lo))
                    .replace(":max", &fmt_number(*hi))
            }
            Rule::Digits(n) => message = message.replace(":digits", &n.to_string()),
            _ => {}
        }
        message
    }

    fn default_template(&self, measure: Measure) -> &'static str {
        let chars = measure == Measure::Characters;
        match self {
            Rule::Required => "The :attribute field is required.",
            Rule::Accepted => "The :attribute must be accepted.",
            Rule::String => "The :attribute must be a string.",
            Rule::Integer => "The :attribute must be an integer.",
            Rule::Numeric => "The :attribute must be a number.",
            Rule::Boolean => "The :attribute attribute has to be either true or false.",
            Rule::Array => "The :attribute must be an array.",
            Rule::Email | Rule::Url | Rule::Regex(_) => "The :attribute format is invalid.",
            Rule::Alpha => "The :attribute field must contain only alphabetic characters.",
            Rule::AlphaNum => "The :attribute field must be alphanumeric.",
            Rule::AlphaDash => {
                "The :attribute field may only contain alpha-numeric characters, as well as dashes and underscores."
            }
            Rule::Min(_) if chars => "The :attribute must be at least :min characters.",
            Rule::Min(_) => "The :attribute must be at least :min.",
            Rule::Max(_) if chars => "The :attribute may not be greater than :max characters.",
            Rule::Max(_) => "The :attribute may not be greater than :max.",
            Rule::Between(..) if chars => {
                "The :attribute field must be between :min and :max characters."
            }
            Rule::Between(..) => "The :attribute field must be between :min and :max.",
            Rule::Size(_) if chars => "The :attribute must be :size characters.",
            Rule::Size(_) => "The :attribute must be :size.",
            Rule::Digits(_) => "The :attribute must be :digits digits.",
            Rule::In(_) | Rule::NotIn(_) => "The selected :attribute is invalid.",
        }
    }
}

/// Absent, null, blank strings and empty arrays count as "not present".
pub(crate) fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(_) => true,
    }
}

fn text(value: Option<&Value>) -> Option<&str> {
    match value {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}

/// String form of a scalar value.
fn scalar(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    }
}

fn as_number(value: Option<&Value>) -> Option<f64> {
    match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

fn size_of(value: Option<&Value>, numeric: bool) -> Option<(f64, Measure)> {
    match value {
        Some(Value::Number(n)) => n.as_f64().map(|n| (n, Measure::Numeric)),
        Some(Value::Array(items)) => Some((items.len() as f64, Measure::Items)),
        Some(Value::String(s)) if numeric => as_number(value)
            .map(|n| (n, Measure::Numeric))
            .or(Some((s.chars().count() as f64, Measure::Characters))),
        Some(Value::String(s)) => Some((s.chars().count() as f64, Measure::Characters)),
        _ => None,
    }
}

fn compile_pattern(raw: &str) -> Result<Regex, regex::Error> {
    // `/pattern/flags` form; only the `i` flag is meaningful here.
    if let Some(rest) = raw.strip_prefix('/') {
        if let Some(end) = rest.rfind('/') {
            let (pattern, flags) = (&rest[..end], &rest[end + 1..]);
            let prefix = if flags.contains('i') { "(?i)" } else { "" };
            return Regex::new(&format!("{prefix}{pattern}"));
        }
    }
    Regex::new(raw)
}

fn attribute_name(field: &str) -> String {
    field.replace(['_', '['], " ").replace(']', "")
}

fn fmt_number(n: f64) -> String {
    if n.fract() == 0.0 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}
