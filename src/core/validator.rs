// src/core/validator.rs

use crate::{
    core::value_resolver::RawValues,
    models::{ArgType, ArgumentDeclaration},
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Number, Value};
use std::{collections::BTreeMap, fmt};
use thiserror::Error;

/// One argument that failed coercion or a constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Argument name, or `name[i]` for an element of a `multiple` argument.
    pub path: String,
    pub reason: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.reason)
    }
}

/// Every failing argument of an invocation, collected in a single pass.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid arguments:\n{}", describe_issues(.issues))]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

fn describe_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|issue| format!("  - {}", issue))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The validated, typed arguments of a command.
///
/// Values are stored as JSON values whose shape is guaranteed by the declaration:
/// strings, numbers, booleans, or arrays of those for `multiple` arguments.
/// Optional arguments that resolved to nothing have no entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    values: BTreeMap<String, Value>,
}

impl Args {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    /// Absent booleans read as `false`.
    pub fn get_bool(&self, name: &str) -> bool {
        self.get(name).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn get_list(&self, name: &str) -> Option<&[Value]> {
        self.get(name).and_then(Value::as_array).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// The arguments as a JSON object.
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect::<Map<_, _>>(),
        )
    }

    /// Deserializes the arguments into a command-specific struct.
    ///
    /// ```ignore
    /// #[derive(serde::Deserialize)]
    /// struct ServeArgs { port: u16, host: String, verbose: bool }
    /// let args: ServeArgs = ctx.args.deserialize()?;
    /// ```
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.to_value())
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Parses numeric text, keeping integers as integers.
fn parse_number(text: &str) -> Option<Number> {
    let trimmed = text.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return Some(Number::from(i));
    }
    if let Ok(u) = trimmed.parse::<u64>() {
        return Some(Number::from(u));
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .and_then(Number::from_f64)
        .map(integral)
}

/// Stores a whole float (`8080.0`, `1e3`) as an integer when it fits one.
fn integral(n: Number) -> Number {
    let Some(f) = n.as_f64().filter(|f| n.is_f64() && f.fract() == 0.0) else {
        return n;
    };
    let text = format!("{:.0}", f);
    if let Ok(i) = text.parse::<i64>() {
        return Number::from(i);
    }
    text.parse::<u64>().map(Number::from).unwrap_or(n)
}

/// Converts a raw value to the declared type.
///
/// Text (everything from the command line or the environment) is coerced; values that
/// are already typed, e.g. from a configuration document, must match as they are.
fn coerce(kind: ArgType, value: &Value) -> Result<Value, String> {
    match (kind, value) {
        (ArgType::String, Value::String(_)) | (ArgType::Boolean, Value::Bool(_)) => {
            Ok(value.clone())
        }
        (ArgType::Number, Value::Number(n)) => Ok(Value::Number(integral(n.clone()))),
        (ArgType::Boolean, Value::String(text)) => Ok(Value::Bool(text == "true" || text == "1")),
        (ArgType::Number, Value::String(text)) => parse_number(text)
            .map(Value::Number)
            .ok_or_else(|| format!("expected number, received '{}'", text)),
        (kind, other) => Err(format!(
            "expected {}, received {}",
            kind.as_str(),
            type_name(other)
        )),
    }
}

fn check_constraints(decl: &ArgumentDeclaration, value: &Value) -> Result<(), String> {
    match value {
        Value::Number(n) => {
            let n = n.as_f64().unwrap_or(f64::NAN);
            if decl.integer && n.fract() != 0.0 {
                return Err(format!("expected integer, received {}", n));
            }
            if let Some(min) = decl.min
                && n < min
            {
                return Err(format!("must be greater than or equal to {}", min));
            }
            if let Some(max) = decl.max
                && n > max
            {
                return Err(format!("must be less than or equal to {}", max));
            }
        }
        Value::String(s) => {
            let len = s.chars().count() as f64;
            if let Some(min) = decl.min
                && len < min
            {
                return Err(format!("must contain at least {} character(s)", min));
            }
            if let Some(max) = decl.max
                && len > max
            {
                return Err(format!("must contain at most {} character(s)", max));
            }
            if let Some(choices) = &decl.choices
                && !choices.iter().any(|c| c == s)
            {
                return Err(format!(
                    "expected one of {}, received '{}'",
                    choices.join(" | "),
                    s
                ));
            }
        }
        _ => {}
    }
    Ok(())
}

fn coerce_and_check(decl: &ArgumentDeclaration, value: &Value) -> Result<Value, String> {
    let coerced = coerce(decl.kind, value)?;
    check_constraints(decl, &coerced)?;
    Ok(coerced)
}

/// Coerces and checks one resolved value against its declaration.
pub fn validate_value(
    decl: &ArgumentDeclaration,
    value: &Value,
) -> Result<Value, Vec<ValidationIssue>> {
    let issue = |path: String, reason: String| ValidationIssue { path, reason };

    if !decl.multiple {
        return coerce_and_check(decl, value).map_err(|reason| vec![issue(decl.name.clone(), reason)]);
    }

    let Value::Array(items) = value else {
        return Err(vec![issue(
            decl.name.clone(),
            format!("expected array, received {}", type_name(value)),
        )]);
    };

    let mut coerced = Vec::with_capacity(items.len());
    let mut issues = Vec::new();
    for (i, item) in items.iter().enumerate() {
        match coerce_and_check(decl, item) {
            Ok(v) => coerced.push(v),
            Err(reason) => issues.push(issue(format!("{}[{}]", decl.name, i), reason)),
        }
    }

    if issues.is_empty() {
        Ok(Value::Array(coerced))
    } else {
        Err(issues)
    }
}

/// Validates every declared argument. All-or-nothing: either every argument is valid
/// and typed `Args` are returned, or every failure is reported together.
pub fn validate_args(
    declarations: &[ArgumentDeclaration],
    raw_values: &RawValues,
) -> Result<Args, ValidationError> {
    let mut values = BTreeMap::new();
    let mut issues = Vec::new();

    for decl in declarations {
        match raw_values.get(&decl.name) {
            Some(raw) => match validate_value(decl, raw) {
                Ok(value) => {
                    values.insert(decl.name.clone(), value);
                }
                Err(mut arg_issues) => issues.append(&mut arg_issues),
            },
            None if decl.optional => {}
            None => issues.push(ValidationIssue {
                path: decl.name.clone(),
                reason: "required argument is missing".to_string(),
            }),
        }
    }

    if issues.is_empty() {
        Ok(Args { values })
    } else {
        log::debug!("Validation failed with {} issue(s)", issues.len());
        Err(ValidationError { issues })
    }
}
