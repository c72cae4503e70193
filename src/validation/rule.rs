use std::cmp::Ordering;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use super::{FieldType, FieldValue, SchemaError, Violation};

/// Conservative address shape: local part, `@`, dot-separated alphanumeric
/// domain labels that neither start nor end with a hyphen.
static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .expect("valid email regex")
});

/// One declarative constraint attached to a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Required,
    Email,
    Min(i64),
    Max(i64),
}

/// Rule name without its argument, as reported in violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    Required,
    Email,
    Min,
    Max,
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RuleKind::Required => "required",
            RuleKind::Email => "email",
            RuleKind::Min => "min",
            RuleKind::Max => "max",
        };
        f.write_str(name)
    }
}

impl Rule {
    pub fn kind(&self) -> RuleKind {
        match self {
            Rule::Required => RuleKind::Required,
            Rule::Email => RuleKind::Email,
            Rule::Min(_) => RuleKind::Min,
            Rule::Max(_) => RuleKind::Max,
        }
    }

    /// Parse a tag string such as `"required;min=8;max=30"` declared for `field`.
    ///
    /// Entries are separated by `;` and trimmed; empty entries are skipped so a
    /// trailing separator is harmless.
    pub fn parse_tags(field: &str, tags: &str) -> Result<Vec<Rule>, SchemaError> {
        tags.split(';')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| Rule::parse(field, entry))
            .collect()
    }

    /// Parse a single `ruleName[=ruleArgument]` entry.
    pub fn parse(field: &str, entry: &str) -> Result<Rule, SchemaError> {
        let (name, argument) = match entry.split_once('=') {
            Some((name, argument)) => (name.trim(), Some(argument.trim())),
            None => (entry.trim(), None),
        };

        match (name, argument) {
            ("required", None) => Ok(Rule::Required),
            ("email", None) => Ok(Rule::Email),
            ("required", Some(_)) => Err(SchemaError::UnexpectedArgument {
                field: field.to_string(),
                rule: RuleKind::Required,
            }),
            ("email", Some(_)) => Err(SchemaError::UnexpectedArgument {
                field: field.to_string(),
                rule: RuleKind::Email,
            }),
            ("min", argument) => parse_bound(field, RuleKind::Min, argument).map(Rule::Min),
            ("max", argument) => parse_bound(field, RuleKind::Max, argument).map(Rule::Max),
            (other, _) => Err(SchemaError::UnknownRule {
                field: field.to_string(),
                rule: other.to_string(),
            }),
        }
    }

    /// Whether this rule has a meaning for fields of `field_type`.
    pub fn applies_to(&self, field_type: FieldType) -> bool {
        match self {
            Rule::Required => true,
            Rule::Email => field_type == FieldType::Text,
            Rule::Min(_) | Rule::Max(_) => field_type != FieldType::Boolean,
        }
    }

    /// Evaluate the rule against one field value, returning the violation if it fails.
    pub fn check(&self, field: &str, value: FieldValue<'_>) -> Option<Violation> {
        let message = match *self {
            Rule::Required if value.is_unset() => format!("'{}' is required", field),
            Rule::Email => match value {
                FieldValue::Text(text) if !EMAIL_PATTERN.is_match(text) => {
                    format!("'{}' is not a valid email address", field)
                }
                _ => return None,
            },
            Rule::Min(bound) if compare(value, bound) == Some(Ordering::Less) => {
                format!("'{}' must be at least {}{}", field, bound, unit(value))
            }
            Rule::Max(bound) if compare(value, bound) == Some(Ordering::Greater) => {
                format!("'{}' must be at most {}{}", field, bound, unit(value))
            }
            _ => return None,
        };

        Some(Violation {
            field: field.to_string(),
            rule: self.kind(),
            message,
        })
    }
}

fn parse_bound(field: &str, rule: RuleKind, argument: Option<&str>) -> Result<i64, SchemaError> {
    let argument = match argument {
        Some(argument) if !argument.is_empty() => argument,
        _ => {
            return Err(SchemaError::MissingArgument {
                field: field.to_string(),
                rule,
            })
        }
    };

    argument.parse::<i64>().map_err(|_| SchemaError::InvalidArgument {
        field: field.to_string(),
        rule,
        value: argument.to_string(),
    })
}

/// Text is measured in characters, numbers by value. Booleans have no magnitude.
fn compare(value: FieldValue<'_>, bound: i64) -> Option<Ordering> {
    match value {
        FieldValue::Text(text) => {
            let length = i64::try_from(text.chars().count()).unwrap_or(i64::MAX);
            Some(length.cmp(&bound))
        }
        FieldValue::Integer(number) => Some(number.cmp(&bound)),
        FieldValue::Float(number) => number.partial_cmp(&(bound as f64)),
        FieldValue::Boolean(_) => None,
    }
}

fn unit(value: FieldValue<'_>) -> &'static str {
    match value {
        FieldValue::Text(_) => " characters long",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_tags_in_declaration_order() {
        let rules = Rule::parse_tags("password", "required;min=8;max=30").unwrap();
        assert_eq!(rules, vec![Rule::Required, Rule::Min(8), Rule::Max(30)]);
    }

    #[test]
    fn parse_tags_skips_blank_entries() {
        assert!(Rule::parse_tags("title", "").unwrap().is_empty());
        let rules = Rule::parse_tags("email", " required ; email ;").unwrap();
        assert_eq!(rules, vec![Rule::Required, Rule::Email]);
    }

    #[test]
    fn unknown_rule_is_rejected() {
        let err = Rule::parse("username", "unique").unwrap_err();
        assert_eq!(
            err,
            SchemaError::UnknownRule {
                field: "username".to_string(),
                rule: "unique".to_string()
            }
        );
    }

    #[test]
    fn bound_must_be_an_integer() {
        let err = Rule::parse("age", "min=eighteen").unwrap_err();
        assert!(matches!(err, SchemaError::InvalidArgument { rule: RuleKind::Min, .. }));

        let err = Rule::parse("age", "max=1.5").unwrap_err();
        assert!(matches!(err, SchemaError::InvalidArgument { rule: RuleKind::Max, .. }));
    }

    #[test]
    fn bound_without_value_is_rejected() {
        assert!(matches!(
            Rule::parse("age", "min=").unwrap_err(),
            SchemaError::MissingArgument { rule: RuleKind::Min, .. }
        ));
        assert!(matches!(
            Rule::parse("age", "max").unwrap_err(),
            SchemaError::MissingArgument { rule: RuleKind::Max, .. }
        ));
    }

    #[test]
    fn flag_rules_take_no_argument() {
        assert!(matches!(
            Rule::parse("username", "required=true").unwrap_err(),
            SchemaError::UnexpectedArgument { rule: RuleKind::Required, .. }
        ));
    }

    #[test]
    fn email_shapes() {
        let check = |text: &str| Rule::Email.check("email", FieldValue::Text(text));
        assert!(check("user@example.com").is_none());
        assert!(check("first.last+tag@mail.example-domain.co").is_none());
        assert!(check("not-an-email").is_some());
        assert!(check("user@").is_some());
        assert!(check("@domain.com").is_some());
        assert!(check("user@-example.com").is_some());
        assert!(check("user@example-.com").is_some());
    }

    #[test]
    fn text_length_counts_characters() {
        // 7 characters, 14 bytes
        let violation = Rule::Min(8).check("password", FieldValue::Text("ñññññññ"));
        assert!(violation.is_some());
        assert!(Rule::Max(7).check("password", FieldValue::Text("ñññññññ")).is_none());
    }

    #[test]
    fn required_semantics_per_type() {
        assert!(Rule::Required.check("f", FieldValue::Text("   ")).is_some());
        assert!(Rule::Required.check("f", FieldValue::Text(" x ")).is_none());
        assert!(Rule::Required.check("f", FieldValue::Integer(0)).is_some());
        assert!(Rule::Required.check("f", FieldValue::Integer(-1)).is_none());
        assert!(Rule::Required.check("f", FieldValue::Float(0.0)).is_some());
        assert!(Rule::Required.check("f", FieldValue::Boolean(false)).is_some());
        assert!(Rule::Required.check("f", FieldValue::Boolean(true)).is_none());
    }

    #[test]
    fn violation_messages_do_not_echo_values() {
        let violation = Rule::Min(8).check("password", FieldValue::Text("hunter2")).unwrap();
        assert_eq!(violation.rule, RuleKind::Min);
        assert_eq!(violation.message, "'password' must be at least 8 characters long");
        assert!(!violation.message.contains("hunter2"));
    }
}
