use serde_json::Value;

/// Parsed form of a workflow condition string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition<'a> {
    Equals { field: &'a str, value: &'a str },
    NotEquals { field: &'a str, value: &'a str },
    Exists { field: &'a str },
}

fn unquote(raw: &str) -> &str {
    let raw = raw.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = raw
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    raw
}

fn valid_field(field: &str) -> Option<&str> {
    let field = field.trim();
    if field.is_empty() || field.contains(char::is_whitespace) {
        None
    } else {
        Some(field)
    }
}

/// Accepts `field == value`, `field != value` and `field exists`.
pub fn parse(expr: &str) -> Option<Condition<'_>> {
    let expr = expr.trim();
    if let Some((field, value)) = expr.split_once("!=") {
        return Some(Condition::NotEquals {
            field: valid_field(field)?,
            value: unquote(value),
        });
    }
    if let Some((field, value)) = expr.split_once("==") {
        return Some(Condition::Equals {
            field: valid_field(field)?,
            value: unquote(value),
        });
    }
    if let Some(field) = expr.strip_suffix("exists") {
        return Some(Condition::Exists {
            field: valid_field(field)?,
        });
    }
    None
}

/// Resolves a dotted path such as `appointment.status` inside the payload.
pub fn lookup<'a>(payload: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(payload, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|idx| items.get(idx)),
        _ => None,
    })
}

pub fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

impl Condition<'_> {
    pub fn is_satisfied(&self, payload: &Value) -> bool {
        match self {
            Condition::Equals { field, value } => {
                lookup(payload, field).is_some_and(|found| value_as_text(found) == *value)
            }
            Condition::NotEquals { field, value } => {
                lookup(payload, field).is_none_or(|found| value_as_text(found) != *value)
            }
            Condition::Exists { field } => {
                lookup(payload, field).is_some_and(|found| !found.is_null())
            }
        }
    }
}

/// Returns the reason the first failing condition blocks the run, if any.
pub fn first_unsatisfied(conditions: &[String], payload: &Value) -> Option<String> {
    conditions.iter().find_map(|raw| match parse(raw) {
        Some(condition) if condition.is_satisfied(payload) => None,
        Some(_) => Some(format!("Condition not met: {}", raw.trim())),
        None => Some(format!("Unsupported condition: {}", raw.trim())),
    })
}
